//! HTTP response handling.

use crate::error::{HttpError, HttpResult};
use crate::headers::{content_type, HeaderMap};
use crate::logger::SharedLogger;
use crate::transport::{ByteStream, RawResponse};
use bytes::{Bytes, BytesMut};
use encoding_rs::Encoding;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::StreamExt;
use http::Method;
use mime::Mime;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// How raw response bytes become a [`DecodedBody`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BodyParser {
    /// JSON when the response declares `application/json`, raw bytes otherwise.
    #[default]
    Auto,
    Json,
    Text,
    Raw,
}

impl FromStr for BodyParser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(BodyParser::Auto),
            "json" => Ok(BodyParser::Json),
            "text" => Ok(BodyParser::Text),
            "raw" => Ok(BodyParser::Raw),
            other => Err(format!("unknown body parser: {}", other)),
        }
    }
}

impl fmt::Display for BodyParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BodyParser::Auto => "auto",
            BodyParser::Json => "json",
            BodyParser::Text => "text",
            BodyParser::Raw => "raw",
        })
    }
}

/// A decoded response body.
#[derive(Clone, Debug, PartialEq)]
pub enum DecodedBody {
    /// No content-type and no bytes.
    Null,
    Json(serde_json::Value),
    Text(String),
    Raw(Bytes),
}

type SharedRead = Shared<BoxFuture<'static, HttpResult<DecodedBody>>>;

/// Lazily collected, memoized response body.
///
/// The read is a single shared future that owns the byte stream. Callers
/// only poll it, so dropping one caller mid-read never loses the stream;
/// the next caller resumes where it stopped and every caller sees the same
/// result.
pub struct ResponseBody {
    stream: Arc<Mutex<Option<ByteStream>>>,
    read: SharedRead,
    destroyed: Arc<watch::Sender<bool>>,
    completed: Arc<AtomicBool>,
}

impl ResponseBody {
    pub(crate) fn new(
        stream: ByteStream,
        parser: BodyParser,
        content_type: Option<String>,
        url: String,
        logger: SharedLogger,
    ) -> Self {
        let (destroyed, _) = watch::channel(false);
        let stream = Arc::new(Mutex::new(Some(stream)));
        let destroyed = Arc::new(destroyed);
        let completed = Arc::new(AtomicBool::new(false));

        let collector = Collector {
            stream: stream.clone(),
            destroyed: destroyed.clone(),
            completed: completed.clone(),
            parser,
            content_type,
            url,
            logger,
        };

        Self {
            stream,
            read: collector.run().boxed().shared(),
            destroyed,
            completed,
        }
    }

    /// Collect and decode the body, at most once.
    pub async fn read(&self) -> HttpResult<DecodedBody> {
        self.read.clone().await
    }

    pub fn completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub fn destroyed(&self) -> bool {
        *self.destroyed.borrow()
    }

    /// Drop the connection. A pending or future read fails fast.
    pub fn close(&self) {
        self.destroyed.send_replace(true);
        let stream = self.stream.lock().take();
        drop(stream);
    }
}

/// State owned by the shared read.
struct Collector {
    stream: Arc<Mutex<Option<ByteStream>>>,
    destroyed: Arc<watch::Sender<bool>>,
    completed: Arc<AtomicBool>,
    parser: BodyParser,
    content_type: Option<String>,
    url: String,
    logger: SharedLogger,
}

impl Collector {
    async fn run(self) -> HttpResult<DecodedBody> {
        let mut destroyed = self.destroyed.subscribe();
        if *destroyed.borrow_and_update() {
            return Err(HttpError::DestroyedConnection);
        }

        // Only close() empties the slot before the first poll.
        let taken = self.stream.lock().take();
        let Some(mut stream) = taken else {
            return Err(HttpError::DestroyedConnection);
        };

        let mut chunks = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = destroyed.wait_for(|d| *d) => {
                    return Err(HttpError::DestroyedConnection);
                }
                chunk = stream.next() => match chunk {
                    Some(Ok(chunk)) => chunks.push(chunk),
                    Some(Err(err)) => {
                        self.destroyed.send_replace(true);
                        return Err(err);
                    }
                    None => break,
                },
            }
        }

        self.completed.store(true, Ordering::Release);
        self.logger.debug(format_args!(
            "{} body end with {} chunks",
            self.url,
            chunks.len()
        ));

        let mut buf = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in &chunks {
            buf.extend_from_slice(chunk);
        }
        decode(self.parser, self.content_type.as_deref(), buf.freeze())
    }
}

/// Turn collected bytes into a value according to the parser mode.
pub(crate) fn decode(
    parser: BodyParser,
    header: Option<&str>,
    bytes: Bytes,
) -> HttpResult<DecodedBody> {
    if header.is_none() && bytes.is_empty() {
        return Ok(DecodedBody::Null);
    }

    // An unparsable header counts as no declared type.
    let declared: Option<Mime> = header.and_then(|ct| ct.parse().ok());
    let charset = declared
        .as_ref()
        .and_then(|m| m.get_param(mime::CHARSET))
        .map(|c| c.as_str().to_string())
        .unwrap_or_else(|| content_type::DEFAULT_CHARSET.to_string());
    let is_json = declared
        .as_ref()
        .is_some_and(|m| m.essence_str() == content_type::JSON);

    match parser {
        BodyParser::Json => parse_json(&bytes, &charset),
        BodyParser::Auto if is_json => parse_json(&bytes, &charset),
        BodyParser::Text => decode_text(&bytes, &charset).map(DecodedBody::Text),
        BodyParser::Auto | BodyParser::Raw => Ok(DecodedBody::Raw(bytes)),
    }
}

fn decode_text(bytes: &[u8], charset: &str) -> HttpResult<String> {
    let encoding = Encoding::for_label(charset.as_bytes())
        .ok_or_else(|| HttpError::parse(format!("unknown charset: {}", charset)))?;
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    Ok(text.into_owned())
}

fn parse_json(bytes: &[u8], charset: &str) -> HttpResult<DecodedBody> {
    let text = decode_text(bytes, charset)?;
    serde_json::from_str(&text)
        .map(DecodedBody::Json)
        .map_err(|e| HttpError::parse(e.to_string()))
}

/// An HTTP response.
pub struct Response {
    url: String,
    method: Method,
    status_code: u16,
    status_message: String,
    headers: HeaderMap,
    redirect_from: Option<Arc<Response>>,
    body: ResponseBody,
}

impl Response {
    pub(crate) fn new(
        raw: RawResponse,
        url: String,
        method: Method,
        parser: BodyParser,
        logger: SharedLogger,
        redirect_from: Option<Arc<Response>>,
    ) -> Self {
        let content_type = raw.headers.content_type().map(str::to_string);
        let body = ResponseBody::new(raw.body, parser, content_type, url.clone(), logger);
        Self {
            url,
            method,
            status_code: raw.status_code,
            status_message: raw.status_message,
            headers: raw.headers,
            redirect_from,
            body,
        }
    }

    /// The URL this response was requested from.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the response status code.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a specific header as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.as_str())
    }

    /// Check if the response was successful (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Check if the response was a redirect (3xx).
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status_code)
    }

    /// Check if the response was a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code)
    }

    /// Check if the response was a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status_code)
    }

    /// The response this one was redirected from, if any.
    pub fn redirect_from(&self) -> Option<&Arc<Response>> {
        self.redirect_from.as_ref()
    }

    /// Earlier responses in the redirect chain, oldest first.
    pub fn redirects(&self) -> Vec<Arc<Response>> {
        let mut chain = Vec::new();
        let mut current = self.redirect_from.clone();
        while let Some(previous) = current {
            current = previous.redirect_from.clone();
            chain.push(previous);
        }
        chain.reverse();
        chain
    }

    /// Number of redirects that led to this response.
    pub fn redirect_count(&self) -> usize {
        let mut count = 0;
        let mut current = self.redirect_from.as_deref();
        while let Some(previous) = current {
            count += 1;
            current = previous.redirect_from.as_deref();
        }
        count
    }

    /// Whether the body stream has been read to the end.
    pub fn completed(&self) -> bool {
        self.body.completed()
    }

    pub fn destroyed(&self) -> bool {
        self.body.destroyed()
    }

    /// The decoded body. Computed once; later calls return the same value.
    pub async fn body(&self) -> HttpResult<DecodedBody> {
        self.body.read().await
    }

    /// Deserialize the decoded body.
    pub async fn json<T: DeserializeOwned>(&self) -> HttpResult<T> {
        let parsed = match self.body().await? {
            DecodedBody::Null => serde_json::from_value(serde_json::Value::Null),
            DecodedBody::Json(value) => serde_json::from_value(value),
            DecodedBody::Text(text) => serde_json::from_str(&text),
            DecodedBody::Raw(bytes) => serde_json::from_slice(&bytes),
        };
        parsed.map_err(|e| HttpError::parse(e.to_string()))
    }

    /// Get the decoded body as text.
    pub async fn text(&self) -> HttpResult<String> {
        Ok(match self.body().await? {
            DecodedBody::Null => String::new(),
            DecodedBody::Json(value) => value.to_string(),
            DecodedBody::Text(text) => text,
            DecodedBody::Raw(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// Get the decoded body as bytes.
    pub async fn bytes(&self) -> HttpResult<Bytes> {
        Ok(match self.body().await? {
            DecodedBody::Null => Bytes::new(),
            DecodedBody::Json(value) => Bytes::from(value.to_string()),
            DecodedBody::Text(text) => Bytes::from(text),
            DecodedBody::Raw(bytes) => bytes,
        })
    }

    /// Forcibly drop the underlying connection.
    pub fn close(&self) {
        self.body.close();
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("status_code", &self.status_code)
            .field("status_message", &self.status_message)
            .field("headers", &self.headers)
            .field("redirects", &self.redirect_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NoopLogger;
    use futures::stream;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn response_from_stream(
        content_type: Option<&str>,
        body: ByteStream,
        parser: BodyParser,
    ) -> Response {
        let mut headers = HeaderMap::new();
        if let Some(ct) = content_type {
            headers.set("Content-Type", ct);
        }
        let raw = RawResponse::new(200, headers, body);
        Response::new(
            raw,
            "http://example.com/".to_string(),
            Method::GET,
            parser,
            Arc::new(NoopLogger),
            None,
        )
    }

    fn response(content_type: Option<&str>, body: &'static [u8], parser: BodyParser) -> Response {
        let chunks: Vec<HttpResult<Bytes>> = body
            .chunks(4)
            .map(|c| Ok(Bytes::from_static(c)))
            .collect();
        response_from_stream(content_type, Box::pin(stream::iter(chunks)), parser)
    }

    #[test]
    fn test_body_parser_from_str() {
        assert_eq!("JSON".parse::<BodyParser>(), Ok(BodyParser::Json));
        assert_eq!("raw".parse::<BodyParser>(), Ok(BodyParser::Raw));
        assert!("xml".parse::<BodyParser>().is_err());
        assert_eq!(BodyParser::default().to_string(), "auto");
    }

    #[test]
    fn test_decode_no_body() {
        assert_eq!(decode(BodyParser::Auto, None, Bytes::new()), Ok(DecodedBody::Null));
        assert_eq!(decode(BodyParser::Json, None, Bytes::new()), Ok(DecodedBody::Null));
    }

    #[test]
    fn test_decode_auto_json() {
        let decoded = decode(
            BodyParser::Auto,
            Some("application/json; charset=utf-8"),
            Bytes::from_static(br#"{"ok":true}"#),
        );
        assert_eq!(decoded, Ok(DecodedBody::Json(serde_json::json!({ "ok": true }))));
    }

    #[test]
    fn test_decode_auto_non_json_is_raw() {
        let decoded = decode(BodyParser::Auto, Some("text/html"), Bytes::from_static(b"<p>"));
        assert_eq!(decoded, Ok(DecodedBody::Raw(Bytes::from_static(b"<p>"))));

        let decoded = decode(BodyParser::Auto, None, Bytes::from_static(b"\x00\x01"));
        assert_eq!(decoded, Ok(DecodedBody::Raw(Bytes::from_static(b"\x00\x01"))));
    }

    #[test]
    fn test_decode_forced_json_ignores_type() {
        let decoded = decode(BodyParser::Json, Some("text/plain"), Bytes::from_static(b"[1,2]"));
        assert_eq!(decoded, Ok(DecodedBody::Json(serde_json::json!([1, 2]))));
    }

    #[test]
    fn test_decode_text_with_charset() {
        let decoded = decode(
            BodyParser::Text,
            Some("text/plain; charset=iso-8859-1"),
            Bytes::from_static(b"caf\xe9"),
        );
        assert_eq!(decoded, Ok(DecodedBody::Text("café".to_string())));
    }

    #[test]
    fn test_decode_json_parse_error() {
        let decoded = decode(
            BodyParser::Auto,
            Some("application/json"),
            Bytes::from_static(b"{not json"),
        );
        assert!(matches!(decoded, Err(HttpError::Parse(_))));
    }

    #[test]
    fn test_decode_unknown_charset() {
        let decoded = decode(
            BodyParser::Text,
            Some("text/plain; charset=klingon"),
            Bytes::from_static(b"qapla"),
        );
        assert!(matches!(decoded, Err(HttpError::Parse(_))));
    }

    #[test]
    fn test_decode_unparsable_content_type() {
        let decoded = decode(BodyParser::Text, Some("not a type"), Bytes::from_static(b"hi"));
        assert_eq!(decoded, Ok(DecodedBody::Text("hi".to_string())));
    }

    #[tokio::test]
    async fn test_body_is_memoized() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let chunks = stream::iter(vec![Ok::<_, HttpError>(Bytes::from_static(b"\"once\""))])
            .inspect(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let res =
            response_from_stream(Some("application/json"), Box::pin(chunks), BodyParser::Auto);

        let (first, second) = tokio::join!(res.body(), res.body());
        let third = res.body().await;

        assert_eq!(first, Ok(DecodedBody::Json(serde_json::json!("once"))));
        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(polls.load(Ordering::SeqCst), 1);
        assert!(res.completed());
    }

    #[tokio::test]
    async fn test_body_after_close() {
        let res = response(Some("text/plain"), b"unread", BodyParser::Text);
        res.close();

        assert!(res.destroyed());
        assert_eq!(res.body().await, Err(HttpError::DestroyedConnection));
        assert_eq!(res.status_code(), 200);
    }

    #[tokio::test]
    async fn test_close_interrupts_pending_read() {
        let res = Arc::new(response_from_stream(
            Some("text/plain"),
            Box::pin(stream::pending::<HttpResult<Bytes>>()),
            BodyParser::Text,
        ));

        let reader = {
            let res = res.clone();
            tokio::spawn(async move { res.body().await })
        };
        tokio::task::yield_now().await;
        res.close();

        assert_eq!(reader.await.unwrap(), Err(HttpError::DestroyedConnection));
    }

    #[tokio::test]
    async fn test_aborted_reader_does_not_lose_body() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<HttpResult<Bytes>>();
        let res = Arc::new(response_from_stream(
            Some("text/plain"),
            Box::pin(rx),
            BodyParser::Text,
        ));

        let first = {
            let res = res.clone();
            tokio::spawn(async move { res.body().await })
        };
        tokio::task::yield_now().await;
        let second = {
            let res = res.clone();
            tokio::spawn(async move { res.body().await })
        };
        tokio::task::yield_now().await;

        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());

        tx.unbounded_send(Ok(Bytes::from_static(b"hello"))).unwrap();
        drop(tx);

        let expected = Ok(DecodedBody::Text("hello".to_string()));
        assert_eq!(second.await.unwrap(), expected);
        assert_eq!(res.body().await, expected);
        assert!(res.completed());
    }

    #[tokio::test]
    async fn test_read_resumes_after_timeout() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<HttpResult<Bytes>>();
        let res = response_from_stream(Some("application/json"), Box::pin(rx), BodyParser::Auto);

        tx.unbounded_send(Ok(Bytes::from_static(b"[1,"))).unwrap();
        let timed_out = tokio::time::timeout(Duration::from_millis(20), res.body()).await;
        assert!(timed_out.is_err());
        assert!(!res.completed());

        tx.unbounded_send(Ok(Bytes::from_static(b"2]"))).unwrap();
        drop(tx);

        assert_eq!(res.body().await, Ok(DecodedBody::Json(serde_json::json!([1, 2]))));
    }

    #[tokio::test]
    async fn test_stream_error_rejects_body() {
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(HttpError::transport("connection reset")),
        ]);
        let res = response_from_stream(Some("text/plain"), Box::pin(chunks), BodyParser::Text);

        assert_eq!(res.body().await, Err(HttpError::transport("connection reset")));
        assert!(!res.completed());
        assert_eq!(res.status_code(), 200);
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Item {
            id: u32,
        }

        let res = response(Some("application/json"), br#"{"id":7}"#, BodyParser::Auto);
        assert_eq!(res.json::<Item>().await, Ok(Item { id: 7 }));
        assert_eq!(res.text().await, Ok(r#"{"id":7}"#.to_string()));

        let res = response(None, b"raw bytes", BodyParser::Raw);
        assert_eq!(res.bytes().await, Ok(Bytes::from_static(b"raw bytes")));
    }
}
