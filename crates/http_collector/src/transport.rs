//! Transports - deliver one encoded payload per flush.

use crate::error::{ConfigError, ExportError};
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// One encoded batch, ready to send.
#[derive(Debug, Clone)]
pub struct Payload {
    /// Encoded spans
    pub body: Bytes,
    /// Content type reported by the encoder
    pub content_type: &'static str,
    /// Number of spans in the body
    pub span_count: usize,
}

/// Delivers payloads to the remote endpoint.
///
/// A single call is one request/response exchange. Implementations enforce
/// their own timeout; the collector only sees success or an [`ExportError`].
pub trait Transport: Send + Sync + 'static {
    /// Sends a payload.
    fn send(&self, payload: Payload) -> impl Future<Output = Result<(), ExportError>> + Send;

    /// Returns the transport name for diagnostics.
    fn name(&self) -> &str;
}

/// Transport that POSTs each payload to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: Url,
}

impl HttpTransport {
    /// Builds a transport for `url` whose requests time out after `timeout`.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let url = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        info!(url = %url, ?timeout, "http span transport initialized");

        Ok(Self { client, url })
    }

    /// Returns the destination URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Transport for HttpTransport {
    async fn send(&self, payload: Payload) -> Result<(), ExportError> {
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, payload.content_type)
            .body(payload.body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        debug!(status = status.as_u16(), spans = payload.span_count, "span batch posted");

        if status.is_success() {
            Ok(())
        } else {
            Err(ExportError::Status {
                status: status.as_u16(),
            })
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ExportError {
    if err.is_timeout() {
        ExportError::Timeout
    } else {
        ExportError::Transport(err.to_string())
    }
}
