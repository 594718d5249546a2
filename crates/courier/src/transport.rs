//! Transport abstraction.
//!
//! The dispatcher never touches sockets. It hands a [`TransportRequest`] and
//! an optional encoded body to a [`Transport`] and gets back a
//! [`RawResponse`] whose body is still an unread stream.

use crate::error::{HttpError, HttpResult};
use crate::headers::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use http::{Method, StatusCode};
use hyper::ext::ReasonPhrase;
use std::fmt;
use std::pin::Pin;

/// Response body chunks as they arrive from the network.
pub type ByteStream = Pin<Box<dyn Stream<Item = HttpResult<Bytes>> + Send>>;

/// Plain or encrypted transport selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Everything a transport needs to put one request on the wire.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Path plus query string.
    pub path: String,
    pub headers: HeaderMap,
}

impl TransportRequest {
    /// Absolute URL of the target, port always included.
    pub fn url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme.as_str(),
            self.host,
            self.port,
            self.path
        )
    }
}

/// A response whose status line and headers have arrived.
pub struct RawResponse {
    pub status_code: u16,
    pub status_message: String,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

impl RawResponse {
    pub fn new(status_code: u16, headers: HeaderMap, body: ByteStream) -> Self {
        let status_message = http::StatusCode::from_u16(status_code)
            .map(|status| reason_phrase(status, &http::Extensions::new()))
            .unwrap_or_default();
        Self {
            status_code,
            status_message,
            headers,
            body,
        }
    }

    /// A response with a fully buffered body.
    pub fn from_bytes(status_code: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        let chunks = if body.is_empty() { vec![] } else { vec![Ok(body)] };
        Self::new(status_code, headers, Box::pin(futures::stream::iter(chunks)))
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status_code", &self.status_code)
            .field("status_message", &self.status_message)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// The reason phrase the server sent, or the canonical one for the status.
pub(crate) fn reason_phrase(status: StatusCode, extensions: &http::Extensions) -> String {
    match extensions.get::<ReasonPhrase>() {
        Some(phrase) => String::from_utf8_lossy(phrase.as_bytes()).into_owned(),
        None => status.canonical_reason().unwrap_or_default().to_string(),
    }
}

/// Performs one HTTP round trip. Redirects must not be followed here.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: TransportRequest,
        body: Option<Bytes>,
    ) -> HttpResult<RawResponse>;
}

/// The default transport, backed by `reqwest` with redirects disabled.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> HttpResult<Self> {
        let inner = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { inner })
    }

    /// Use a preconfigured client. Its redirect policy should be `none`.
    pub fn with_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: TransportRequest,
        body: Option<Bytes>,
    ) -> HttpResult<RawResponse> {
        let mut req_builder = self.inner.request(request.method.clone(), request.url());

        for (name, value) in request.headers.iter() {
            for line in value.to_wire_values() {
                req_builder = req_builder.header(name.as_str(), line);
            }
        }

        if let Some(body) = body {
            req_builder = req_builder.body(body);
        }

        let response = req_builder.send().await?;

        let mut headers = HeaderMap::new();
        for (name, value) in response.headers() {
            headers.append(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }

        let status = response.status();
        let status_message = reason_phrase(status, response.extensions());
        let stream = response.bytes_stream().map(|chunk| chunk.map_err(HttpError::from));

        Ok(RawResponse {
            status_code: status.as_u16(),
            status_message,
            headers,
            body: Box::pin(stream),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport for exercising the dispatcher.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    enum Reply {
        Respond {
            status: u16,
            headers: Vec<(String, String)>,
            body: Bytes,
        },
        Fail(HttpError),
    }

    /// Routes by [`TransportRequest::url`] and records every request sent.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        routes: Mutex<HashMap<String, Reply>>,
        pub(crate) sent: Mutex<Vec<(TransportRequest, Option<Bytes>)>>,
    }

    impl MockTransport {
        pub(crate) fn route(
            self,
            url: &str,
            status: u16,
            headers: &[(&str, &str)],
            body: &'static str,
        ) -> Self {
            let headers = headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.routes.lock().insert(
                url.to_string(),
                Reply::Respond {
                    status,
                    headers,
                    body: Bytes::from_static(body.as_bytes()),
                },
            );
            self
        }

        pub(crate) fn fail(self, url: &str, err: HttpError) -> Self {
            self.routes.lock().insert(url.to_string(), Reply::Fail(err));
            self
        }

        pub(crate) fn sent_urls(&self) -> Vec<String> {
            self.sent.lock().iter().map(|(r, _)| r.url()).collect()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(
            &self,
            request: TransportRequest,
            body: Option<Bytes>,
        ) -> HttpResult<RawResponse> {
            let url = request.url();
            self.sent.lock().push((request, body));

            let routes = self.routes.lock();
            match routes.get(&url) {
                Some(Reply::Respond {
                    status,
                    headers,
                    body,
                }) => {
                    let headers: HeaderMap = headers.iter().map(|(k, v)| (k, v.as_str())).collect();
                    Ok(RawResponse::from_bytes(*status, headers, body.clone()))
                }
                Some(Reply::Fail(err)) => Err(err.clone()),
                None => Err(HttpError::transport(format!("connection refused: {}", url))),
            }
        }
    }
}
