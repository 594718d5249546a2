//! Request bodies.

use crate::error::HttpResult;
use crate::transport::{RawResponse, TransportRequest};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

type JsonEncoder = Arc<dyn Fn() -> serde_json::Result<Vec<u8>> + Send + Sync>;

/// A multipart form that knows how to submit itself.
///
/// The dispatcher hands the prepared request target to the form and takes
/// whatever response it produces; no body is written on the form's behalf.
#[async_trait]
pub trait MultipartForm: Send + Sync {
    async fn submit(&self, request: TransportRequest) -> HttpResult<RawResponse>;
}

/// The payload of an outgoing request.
#[derive(Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Raw bytes or text, sent as `text/plain` unless told otherwise.
    Bytes(Bytes),
    /// A value serialized to JSON when the request is sent.
    Structured(JsonEncoder),
    Multipart(Arc<dyn MultipartForm>),
}

impl RequestBody {
    /// Wrap a serializable value. Serialization is deferred until dispatch.
    pub fn json<T>(value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        RequestBody::Structured(Arc::new(move || serde_json::to_vec(&value)))
    }

    pub fn multipart(form: impl MultipartForm + 'static) -> Self {
        RequestBody::Multipart(Arc::new(form))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Bytes(b) => b.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            RequestBody::Structured(_) => f.write_str("Structured"),
            RequestBody::Multipart(_) => f.write_str("Multipart"),
        }
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Bytes(b)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::Bytes(v.into())
    }
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Bytes(s.into())
    }
}

impl From<&'static str> for RequestBody {
    fn from(s: &'static str) -> Self {
        RequestBody::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        RequestBody::json(value)
    }
}
