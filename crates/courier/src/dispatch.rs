//! Request dispatch and redirect handling.

use crate::body::RequestBody;
use crate::error::{HttpError, HttpResult};
use crate::headers::{content_type, names, HeaderMap};
use crate::logger::SharedLogger;
use crate::request::RequestDescriptor;
use crate::response::Response;
use crate::transport::{RawResponse, Scheme, Transport, TransportRequest};
use bytes::Bytes;
use http::Method;
use std::sync::Arc;
use url::Url;

/// Sends descriptors over a [`Transport`] and follows redirects.
///
/// Each hop is a full round trip that must succeed at the transport level
/// before a redirect decision is made. A 3xx with a `location` header is
/// followed while fewer than `descriptor.redirects` hops have been taken;
/// every other response, 4xx and 5xx included, is returned to the caller.
#[derive(Clone)]
pub struct RequestDispatcher {
    transport: Arc<dyn Transport>,
    logger: SharedLogger,
}

impl RequestDispatcher {
    pub fn new(transport: Arc<dyn Transport>, logger: SharedLogger) -> Self {
        Self { transport, logger }
    }

    /// Dispatch a request, following redirects up to its limit.
    pub async fn send(&self, descriptor: RequestDescriptor) -> HttpResult<Response> {
        let mut descriptor = descriptor;
        let mut redirect_from: Option<Arc<Response>> = None;

        loop {
            let response = self.round_trip(&descriptor, redirect_from.take()).await?;

            match redirect_target(&descriptor, &response)? {
                Some(next) => {
                    descriptor = descriptor.with_url(next);
                    redirect_from = Some(Arc::new(response));
                }
                None => return Ok(response),
            }
        }
    }

    async fn round_trip(
        &self,
        descriptor: &RequestDescriptor,
        redirect_from: Option<Arc<Response>>,
    ) -> HttpResult<Response> {
        self.logger.debug(format_args!(
            "Creating {} request. Url = {}",
            descriptor.method, descriptor.url
        ));

        let mut request = build_target(descriptor)?;

        let result = match &descriptor.body {
            RequestBody::Multipart(form) => {
                self.logger.debug(format_args!("Submitting multipart form."));
                form.submit(request).await
            }
            body => {
                let payload = encode_body(&descriptor.method, body, &mut request.headers)?;
                self.transport.send(request, payload).await
            }
        };

        let raw: RawResponse = match result {
            Ok(raw) => {
                self.logger
                    .debug(format_args!("Request finish. Url = {}.", descriptor.url));
                raw
            }
            Err(err) => {
                self.logger.debug(format_args!(
                    "Request error. Url = {}, error = {}.",
                    descriptor.url, err
                ));
                return Err(err);
            }
        };

        Ok(Response::new(
            raw,
            descriptor.url.clone(),
            descriptor.method.clone(),
            descriptor.body_parser,
            self.logger.clone(),
            redirect_from,
        ))
    }
}

/// Where to go next, if this response should be followed.
fn redirect_target(
    descriptor: &RequestDescriptor,
    response: &Response,
) -> HttpResult<Option<String>> {
    if !response.is_redirect() {
        return Ok(None);
    }
    let Some(location) = response.headers().location() else {
        return Ok(None);
    };
    if response.redirect_count() >= descriptor.redirects as usize {
        return Ok(None);
    }

    let next = Url::parse(&descriptor.url)?.join(location)?;
    Ok(Some(next.to_string()))
}

/// Resolve the descriptor's URL and query into a transport target.
pub(crate) fn build_target(descriptor: &RequestDescriptor) -> HttpResult<TransportRequest> {
    let url = Url::parse(&descriptor.url)?;

    let scheme = match url.scheme() {
        "http" => Scheme::Http,
        "https" => Scheme::Https,
        other => {
            return Err(HttpError::invalid_url(format!(
                "unsupported scheme: {}",
                other
            )))
        }
    };
    let host = url
        .host_str()
        .ok_or_else(|| HttpError::invalid_url(format!("missing host: {}", descriptor.url)))?
        .to_string();
    let port = url.port().unwrap_or_else(|| scheme.default_port());

    let search = (descriptor.query_serializer)(descriptor.query.as_ref());
    let query = match search.strip_prefix('?').unwrap_or(&search) {
        "" => url.query().map(str::to_string),
        serialized => Some(serialized.to_string()),
    };

    let mut path = url.path().to_string();
    if let Some(query) = query {
        path.push('?');
        path.push_str(&query);
    }

    Ok(TransportRequest {
        method: descriptor.method.clone(),
        scheme,
        host,
        port,
        path,
        headers: descriptor.headers.clone(),
    })
}

/// Encode the body and fill in content headers the caller left unset.
///
/// GET and TRACE never carry a body.
pub(crate) fn encode_body(
    method: &Method,
    body: &RequestBody,
    headers: &mut HeaderMap,
) -> HttpResult<Option<Bytes>> {
    if body.is_empty() || *method == Method::GET || *method == Method::TRACE {
        return Ok(None);
    }

    let (payload, default_type) = match body {
        RequestBody::Structured(encode) => {
            let json = encode().map_err(|e| HttpError::serialization(e.to_string()))?;
            (Bytes::from(json), content_type::JSON_UTF8)
        }
        RequestBody::Bytes(bytes) => (bytes.clone(), content_type::PLAIN_UTF8),
        RequestBody::Empty | RequestBody::Multipart(_) => return Ok(None),
    };

    if !headers.has(names::CONTENT_TYPE) {
        headers.set(names::CONTENT_TYPE, default_type);
    }
    if !headers.has(names::CONTENT_LENGTH) {
        headers.set(names::CONTENT_LENGTH, payload.len());
    }

    Ok(Some(payload))
}
