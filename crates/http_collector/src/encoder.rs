//! Span encoders - turn an ordered batch into a request body.
//!
//! The collector never looks inside a span. An encoder receives the batch in
//! delivery order and returns the payload plus the content type that
//! identifies it on the wire.
//!
//! Two encoders are provided:
//!
//! - [`JsonEncoder`]: a JSON array via `serde_json`, for any `Serialize` span.
//! - [`ThriftListEncoder`]: Thrift binary-protocol list framing (element type
//!   plus big-endian length prefix), with each element written by the span's
//!   own [`ThriftStruct`] implementation.

use crate::error::ExportError;
use bytes::{Bytes, BytesMut};
use serde::Serialize;
use std::marker::PhantomData;

/// Converts a batch of spans into a transmittable payload.
pub trait SpanEncoder: Send + Sync + 'static {
    /// The span type this encoder understands.
    type Span: Send + Sync + 'static;

    /// Value of the `Content-Type` header for payloads from this encoder.
    fn content_type(&self) -> &'static str;

    /// Encodes the batch, preserving order.
    fn encode(&self, spans: &[Self::Span]) -> Result<Bytes, ExportError>;
}

/// JSON array encoder.
pub struct JsonEncoder<S> {
    _span: PhantomData<fn(&S)>,
}

impl<S> JsonEncoder<S> {
    /// Creates an encoder for `S`.
    pub fn new() -> Self {
        Self { _span: PhantomData }
    }
}

impl<S> Default for JsonEncoder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for JsonEncoder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonEncoder")
    }
}

impl<S: Serialize + Send + Sync + 'static> SpanEncoder for JsonEncoder<S> {
    type Span = S;

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(&self, spans: &[S]) -> Result<Bytes, ExportError> {
        serde_json::to_vec(spans)
            .map(Bytes::from)
            .map_err(|e| ExportError::Serialization(e.to_string()))
    }
}

/// A span that knows how to write itself as a Thrift binary-protocol struct.
pub trait ThriftStruct {
    fn write_thrift(&self, out: &mut BytesMut) -> Result<(), ExportError>;
}

/// Thrift binary-protocol list encoder.
pub struct ThriftListEncoder<S> {
    _span: PhantomData<fn(&S)>,
}

impl<S> ThriftListEncoder<S> {
    /// Creates an encoder that writes each batch as a `list<struct>`.
    pub fn new() -> Self {
        Self { _span: PhantomData }
    }
}

impl<S> Default for ThriftListEncoder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for ThriftListEncoder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ThriftListEncoder")
    }
}

impl<S: ThriftStruct + Send + Sync + 'static> SpanEncoder for ThriftListEncoder<S> {
    type Span = S;

    fn content_type(&self) -> &'static str {
        "application/x-thrift"
    }

    fn encode(&self, spans: &[S]) -> Result<Bytes, ExportError> {
        let mut out = BytesMut::new();
        thrift::write_list_begin(&mut out, thrift::TYPE_STRUCT, spans.len())?;
        for span in spans {
            span.write_thrift(&mut out)?;
        }
        // The binary protocol has no list terminator.
        Ok(out.freeze())
    }
}

/// Thrift binary-protocol primitives for [`ThriftStruct`] implementations.
pub mod thrift {
    use crate::error::ExportError;
    use bytes::{BufMut, BytesMut};

    pub const TYPE_STOP: u8 = 0;
    pub const TYPE_I64: u8 = 10;
    pub const TYPE_STRING: u8 = 11;
    pub const TYPE_STRUCT: u8 = 12;

    fn len_prefix(len: usize) -> Result<i32, ExportError> {
        i32::try_from(len).map_err(|_| {
            ExportError::Serialization(format!("length {} exceeds thrift i32 range", len))
        })
    }

    /// Writes a list header: element type then element count.
    pub fn write_list_begin(out: &mut BytesMut, elem_type: u8, len: usize) -> Result<(), ExportError> {
        let len = len_prefix(len)?;
        out.put_u8(elem_type);
        out.put_i32(len);
        Ok(())
    }

    /// Writes a field header: type then field id.
    pub fn write_field_begin(out: &mut BytesMut, field_type: u8, id: i16) {
        out.put_u8(field_type);
        out.put_i16(id);
    }

    /// Terminates a struct.
    pub fn write_field_stop(out: &mut BytesMut) {
        out.put_u8(TYPE_STOP);
    }

    pub fn write_i64(out: &mut BytesMut, value: i64) {
        out.put_i64(value);
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_string(out: &mut BytesMut, value: &str) -> Result<(), ExportError> {
        let len = len_prefix(value.len())?;
        out.put_i32(len);
        out.put_slice(value.as_bytes());
        Ok(())
    }
}
