//! HTTP client implementation.

use crate::dispatch::RequestDispatcher;
use crate::error::HttpResult;
use crate::headers::{HeaderMap, HeaderValue};
use crate::logger::{tracing_logger, SharedLogger};
use crate::request::{RequestBuilder, RequestDescriptor, DEFAULT_REDIRECTS};
use crate::response::{BodyParser, Response};
use crate::transport::{ReqwestTransport, Transport};
use http::Method;
use std::sync::Arc;

/// Client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL that request paths are joined onto.
    pub base_url: Option<String>,
    /// Maximum redirects per request.
    pub redirects: u32,
    /// Body parser mode for responses.
    pub body_parser: BodyParser,
    /// Headers added to every request.
    pub default_headers: HeaderMap,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            redirects: DEFAULT_REDIRECTS,
            body_parser: BodyParser::Auto,
            default_headers: HeaderMap::new(),
        }
    }
}

/// Join a base URL and a path with exactly one `/` between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// HTTP client for making requests.
///
/// Binds an optional base URL and a logger; every verb goes through the
/// same [`RequestDispatcher`].
pub struct HttpClient {
    config: ClientConfig,
    dispatcher: RequestDispatcher,
    logger: SharedLogger,
}

impl HttpClient {
    /// Create a client over the default transport.
    pub fn new() -> HttpResult<Self> {
        Self::builder().build()
    }

    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Set the base URL used by [`resolve_url`](Self::resolve_url).
    pub fn set_url(&mut self, base_url: impl Into<String>) {
        let base_url = base_url.into();
        self.logger
            .debug(format_args!("Set base url. BaseUrl = {}", base_url));
        self.config.base_url = Some(base_url);
    }

    /// Join `path` onto the base URL, or return it unchanged if none is set.
    pub fn resolve_url(&self, path: &str) -> String {
        match &self.config.base_url {
            Some(base) => join_url(base, path),
            None => path.to_string(),
        }
    }

    /// Start a request with an arbitrary method.
    pub fn request_with(&self, method: Method, path: &str) -> RequestBuilder<'_> {
        let mut descriptor = RequestDescriptor::new(method, self.resolve_url(path));
        descriptor.headers = self.config.default_headers.clone();
        descriptor.redirects = self.config.redirects;
        descriptor.body_parser = self.config.body_parser;
        RequestBuilder::new(self, descriptor)
    }

    /// Create a GET request builder.
    pub fn get(&self, path: &str) -> RequestBuilder<'_> {
        self.request_with(Method::GET, path)
    }

    /// Create a HEAD request builder.
    pub fn head(&self, path: &str) -> RequestBuilder<'_> {
        self.request_with(Method::HEAD, path)
    }

    /// Create a POST request builder.
    pub fn post(&self, path: &str) -> RequestBuilder<'_> {
        self.request_with(Method::POST, path)
    }

    /// Create a PUT request builder.
    pub fn put(&self, path: &str) -> RequestBuilder<'_> {
        self.request_with(Method::PUT, path)
    }

    /// Create a PATCH request builder.
    pub fn patch(&self, path: &str) -> RequestBuilder<'_> {
        self.request_with(Method::PATCH, path)
    }

    /// Create a DELETE request builder.
    pub fn delete(&self, path: &str) -> RequestBuilder<'_> {
        self.request_with(Method::DELETE, path)
    }

    /// Create a TRACE request builder.
    pub fn trace(&self, path: &str) -> RequestBuilder<'_> {
        self.request_with(Method::TRACE, path)
    }

    /// Dispatch a prepared descriptor as-is.
    pub async fn request(&self, descriptor: RequestDescriptor) -> HttpResult<Response> {
        self.dispatcher.send(descriptor).await
    }

    /// Get client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

/// HTTP client builder.
pub struct HttpClientBuilder {
    config: ClientConfig,
    logger: Option<SharedLogger>,
    transport: Option<Arc<dyn Transport>>,
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            logger: None,
            transport: None,
        }
    }

    /// Set the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = Some(base_url.into());
        self
    }

    /// Set the logger. Defaults to [`TracingLogger`](crate::TracingLogger).
    pub fn logger(mut self, logger: SharedLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set the transport. Defaults to [`ReqwestTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set maximum redirects.
    pub fn redirects(mut self, max: u32) -> Self {
        self.config.redirects = max;
        self
    }

    /// Set the body parser mode.
    pub fn body_parser(mut self, parser: BodyParser) -> Self {
        self.config.body_parser = parser;
        self
    }

    /// Add a header sent with every request.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl Into<HeaderValue>) -> Self {
        self.config.default_headers.set(name, value);
        self
    }

    /// Use a complete configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the client.
    pub fn build(self) -> HttpResult<HttpClient> {
        let logger = self.logger.unwrap_or_else(tracing_logger);
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        if let Some(base_url) = &self.config.base_url {
            logger.debug(format_args!("Set base url. BaseUrl = {}", base_url));
        }

        Ok(HttpClient {
            config: self.config,
            dispatcher: RequestDispatcher::new(transport, logger.clone()),
            logger,
        })
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::testing::RecordingLogger;
    use crate::response::DecodedBody;
    use crate::transport::testing::MockTransport;

    fn client_with(transport: Arc<MockTransport>) -> HttpClient {
        HttpClient::builder().transport(transport).build().unwrap()
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.redirects, 1);
        assert_eq!(config.body_parser, BodyParser::Auto);
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://a.test/api/", "/items"), "http://a.test/api/items");
        assert_eq!(join_url("http://a.test/api//", "items"), "http://a.test/api/items");
        assert_eq!(join_url("http://a.test", ""), "http://a.test/");
    }

    #[test]
    fn test_resolve_url() {
        let logger = Arc::new(RecordingLogger::default());
        let mut client = HttpClient::builder()
            .transport(Arc::new(MockTransport::default()))
            .logger(logger.clone())
            .build()
            .unwrap();

        assert_eq!(client.resolve_url("http://x.test/raw"), "http://x.test/raw");

        client.set_url("http://a.test/v1/");
        assert_eq!(client.resolve_url("/users"), "http://a.test/v1/users");
        assert!(logger.contains("Set base url. BaseUrl = http://a.test/v1/"));
    }

    #[test]
    fn test_verbs_fix_method() {
        let client = client_with(Arc::new(MockTransport::default()));
        let cases = [
            (client.get("http://a.test/").build(), Method::GET),
            (client.head("http://a.test/").build(), Method::HEAD),
            (client.post("http://a.test/").build(), Method::POST),
            (client.put("http://a.test/").build(), Method::PUT),
            (client.patch("http://a.test/").build(), Method::PATCH),
            (client.delete("http://a.test/").build(), Method::DELETE),
            (client.trace("http://a.test/").build(), Method::TRACE),
        ];

        for (descriptor, method) in cases {
            assert_eq!(descriptor.method, method);
        }
    }

    #[test]
    fn test_builder_defaults_flow_into_descriptors() {
        let client = HttpClient::builder()
            .transport(Arc::new(MockTransport::default()))
            .base_url("http://a.test")
            .redirects(5)
            .body_parser(BodyParser::Text)
            .default_header("User-Agent", "courier-test")
            .build()
            .unwrap();

        let descriptor = client.get("status").header("Accept", "text/plain").build();

        assert_eq!(descriptor.url, "http://a.test/status");
        assert_eq!(descriptor.redirects, 5);
        assert_eq!(descriptor.body_parser, BodyParser::Text);
        assert!(descriptor.headers.has("user-agent"));
        assert!(descriptor.headers.has("accept"));
        assert!(!client.config().default_headers.has("accept"));
    }

    #[tokio::test]
    async fn test_get_round_trip() {
        let transport = Arc::new(MockTransport::default().route(
            "http://a.test:80/api/items?limit=10",
            200,
            &[("Content-Type", "application/json")],
            r#"[{"id":1}]"#,
        ));
        let client = HttpClient::builder()
            .transport(transport.clone())
            .base_url("http://a.test/api")
            .build()
            .unwrap();

        let response = client.get("/items").query("limit", 10).send().await.unwrap();

        assert_eq!(response.url(), "http://a.test/api/items");
        assert_eq!(*response.method(), Method::GET);
        assert_eq!(
            response.body().await,
            Ok(DecodedBody::Json(serde_json::json!([{ "id": 1 }])))
        );
    }

    #[tokio::test]
    async fn test_get_ignores_body() {
        let transport = Arc::new(MockTransport::default().route("http://a.test:80/", 204, &[], ""));
        let client = client_with(transport.clone());

        let response = client.get("http://a.test/").body("ignored").send().await.unwrap();

        assert_eq!(response.status_code(), 204);
        assert_eq!(response.body().await, Ok(DecodedBody::Null));
        let sent = transport.sent.lock();
        assert!(sent[0].1.is_none());
        assert!(!sent[0].0.headers.has("content-length"));
    }
}
