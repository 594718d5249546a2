//! HTTP request handling.

use crate::body::{MultipartForm, RequestBody};
use crate::client::HttpClient;
use crate::error::HttpResult;
use crate::headers::{HeaderMap, HeaderValue};
use crate::query::{default_serializer, Query, QuerySerializer, QueryValue};
use crate::response::{BodyParser, Response};
use http::Method;
use serde::Serialize;
use std::fmt;

/// Redirects followed when a request does not say otherwise.
pub const DEFAULT_REDIRECTS: u32 = 1;

/// Everything needed to issue one HTTP request.
///
/// A descriptor is not modified once dispatched. Following a redirect
/// produces a copy with only the URL replaced.
#[derive(Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub query: Option<Query>,
    pub body: RequestBody,
    /// Maximum number of redirects to follow. Zero never follows.
    pub redirects: u32,
    pub body_parser: BodyParser,
    pub query_serializer: QuerySerializer,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            query: None,
            body: RequestBody::Empty,
            redirects: DEFAULT_REDIRECTS,
            body_parser: BodyParser::default(),
            query_serializer: default_serializer(),
        }
    }

    /// The same request aimed at a different URL.
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..self.clone()
        }
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("body", &self.body)
            .field("redirects", &self.redirects)
            .field("body_parser", &self.body_parser)
            .finish_non_exhaustive()
    }
}

/// Request builder for constructing HTTP requests.
pub struct RequestBuilder<'a> {
    client: &'a HttpClient,
    descriptor: RequestDescriptor,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(client: &'a HttpClient, descriptor: RequestDescriptor) -> Self {
        Self { client, descriptor }
    }

    /// Add a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<HeaderValue>) -> Self {
        self.descriptor.headers.set(name, value);
        self
    }

    /// Add multiple headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.descriptor.headers.set(name, value.clone());
        }
        self
    }

    /// Add one query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.descriptor
            .query
            .get_or_insert_with(Query::new)
            .insert(key.into(), value.into());
        self
    }

    /// Replace the query mapping.
    pub fn query_map(mut self, query: Query) -> Self {
        self.descriptor.query = Some(query);
        self
    }

    /// Set the request body.
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.descriptor.body = body.into();
        self
    }

    /// Set a JSON body. Serialization happens at dispatch.
    pub fn json<T>(mut self, json: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.descriptor.body = RequestBody::json(json);
        self
    }

    /// Submit a multipart form instead of writing a body.
    pub fn multipart(mut self, form: impl MultipartForm + 'static) -> Self {
        self.descriptor.body = RequestBody::multipart(form);
        self
    }

    pub fn redirects(mut self, max: u32) -> Self {
        self.descriptor.redirects = max;
        self
    }

    pub fn body_parser(mut self, parser: BodyParser) -> Self {
        self.descriptor.body_parser = parser;
        self
    }

    pub fn query_serializer(mut self, serializer: QuerySerializer) -> Self {
        self.descriptor.query_serializer = serializer;
        self
    }

    /// Build the request.
    pub fn build(self) -> RequestDescriptor {
        self.descriptor
    }

    /// Send the request.
    pub async fn send(self) -> HttpResult<Response> {
        self.client.request(self.descriptor).await
    }
}

impl fmt::Debug for RequestBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
