//! Declarative HTTP requests over a pluggable transport.
//!
//! This crate handles:
//! - Building requests from a [`RequestDescriptor`]
//! - Query string serialization
//! - JSON and text request bodies, multipart pass-through
//! - Bounded redirect following
//! - Lazy, memoized, content-type aware response decoding

pub mod body;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod headers;
pub mod logger;
pub mod query;
pub mod request;
pub mod response;
pub mod transport;

pub use body::{MultipartForm, RequestBody};
pub use client::{join_url, ClientConfig, HttpClient, HttpClientBuilder};
pub use dispatch::RequestDispatcher;
pub use error::{HttpError, HttpResult};
pub use headers::{HeaderMap, HeaderValue};
pub use logger::{Logger, NoopLogger, SharedLogger, TracingLogger};
pub use query::{serialize_query, Query, QuerySerializer, QueryValue};
pub use request::{RequestBuilder, RequestDescriptor};
pub use response::{BodyParser, DecodedBody, Response};
pub use transport::{RawResponse, ReqwestTransport, Scheme, Transport, TransportRequest};

pub use http::Method;
