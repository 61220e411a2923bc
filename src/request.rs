//! Incoming HTTP request type.
//!
//! A request arrives with its body still on the wire. Guards run against the
//! head alone, so an over-budget client is answered before a single body
//! byte is read. The body is pulled into memory, up to [`MAX_BODY_SIZE`],
//! right before a route handler runs.

use std::collections::HashMap;

use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Uri};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, LengthLimitError, Limited};

use crate::error::Error;
use crate::query::Query;

/// Largest request body a route handler will be given.
pub const MAX_BODY_SIZE: usize = 1_048_576;

/// Peer address used by [`Request::builder`] when none is given.
const DEFAULT_REMOTE_ADDR: &str = "192.0.2.1:1234";

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ── Body ─────────────────────────────────────────────────────────────────────

pub(crate) enum Body {
    /// In memory.
    Buffered(Bytes),
    /// Not read yet.
    Streaming(BoxBody<Bytes, BoxError>),
}

// ── Request ──────────────────────────────────────────────────────────────────

/// An incoming HTTP request.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Body,
    pub(crate) params: HashMap<String, String>,
    pub(crate) remote_addr: String,
}

impl Request {
    pub(crate) fn new(parts: http::request::Parts, body: Body, remote_addr: String) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: HashMap::new(),
            remote_addr,
        }
    }

    /// Builds a request by hand, for tests and for invoking handlers directly.
    pub fn builder() -> RequestBuilder {
        RequestBuilder {
            method: Method::GET,
            uri: Uri::from_static("/"),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            remote_addr: DEFAULT_REMOTE_ADDR.to_owned(),
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    /// The buffered body.
    ///
    /// Route handlers always see the whole body here. Code running in front
    /// of the router (guards, custom [`ErasedHandler`](crate::ErasedHandler)s)
    /// sees an empty slice until [`buffer_body`](Self::buffer_body) has run.
    pub fn body(&self) -> &[u8] {
        match &self.body {
            Body::Buffered(bytes) => &bytes[..],
            Body::Streaming(_) => &[],
        }
    }

    /// The declared `content-length`, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.header(CONTENT_LENGTH.as_str())?.trim().parse().ok()
    }

    /// Reads a body still on the wire into memory, refusing anything past
    /// `limit` bytes. A declared `content-length` over the limit is refused
    /// before reading. Does nothing once the body is buffered.
    pub async fn buffer_body(&mut self, limit: usize) -> Result<(), Error> {
        if matches!(self.body, Body::Buffered(_)) {
            return Ok(());
        }
        if self.content_length().is_some_and(|len| len > limit as u64) {
            return Err(Error::BodyTooLarge(limit));
        }

        let Body::Streaming(stream) =
            std::mem::replace(&mut self.body, Body::Buffered(Bytes::new()))
        else {
            return Ok(());
        };

        let collect: std::pin::Pin<
            Box<
                dyn std::future::Future<
                        Output = Result<http_body_util::Collected<Bytes>, BoxError>,
                    > + Send,
            >,
        > = Box::pin(Limited::new(stream, limit).collect());
        match collect.await {
            Ok(collected) => {
                self.body = Body::Buffered(collected.to_bytes());
                Ok(())
            }
            Err(e) if e.is::<LengthLimitError>() => Err(Error::BodyTooLarge(limit)),
            Err(e) => Err(Error::BodyRead(e.to_string())),
        }
    }

    /// Transport-level peer address as reported by the serving runtime,
    /// normally `host:port`.
    pub fn remote_addr(&self) -> &str { &self.remote_addr }

    /// Header lookup. Names are case-insensitive; non-UTF-8 values yield `None`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/v1/users/{id}`, `req.param("id")` on `/v1/users/42`
    /// returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Parses the query string.
    pub fn query(&self) -> Query {
        Query::parse(self.uri.query().unwrap_or(""))
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }
}

#[cfg(test)]
impl Request {
    /// Puts `body` back "on the wire", as the server delivers it.
    pub(crate) fn into_streaming(mut self, body: impl Into<Bytes>) -> Self {
        use http_body_util::Full;
        self.body = Body::Streaming(
            Full::new(body.into())
                .map_err(|never: std::convert::Infallible| -> BoxError { match never {} })
                .boxed(),
        );
        self
    }
}

// ── RequestBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Request`]. Defaults to `GET /` from `192.0.2.1:1234`
/// with an empty, already buffered body.
pub struct RequestBuilder {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    remote_addr: String,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the request target. An unparsable target falls back to `/`.
    pub fn uri(mut self, uri: &str) -> Self {
        self.uri = uri.parse().unwrap_or_else(|_| Uri::from_static("/"));
        self
    }

    /// Appends a header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = addr.into();
        self
    }

    pub fn build(self) -> Request {
        Request {
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            body: Body::Buffered(self.body),
            params: HashMap::new(),
            remote_addr: self.remote_addr,
        }
    }
}
