//! Canned `{"error": ...}` responses.
//!
//! All of them go through [`write_json`]. The message payloads are plain
//! strings or string maps, so encoding cannot fail in practice; if it ever
//! does, the failure is logged and a bodiless 500 is sent instead.

use std::collections::BTreeMap;

use http::header::{CONNECTION, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;

use crate::envelope::{Envelope, write_json};
use crate::request::Request;
use crate::response::Response;

/// Body of every 500 response. Internal details are logged, never sent.
pub const INTERNAL_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

pub const RATE_LIMIT_MESSAGE: &str = "rate limit exceeded";

/// Writes `{"error": message}` with `status`.
pub fn error_response(status: StatusCode, message: impl Into<Value>) -> Response {
    error_response_with_headers(status, message, HeaderMap::new())
}

fn error_response_with_headers(
    status: StatusCode,
    message: impl Into<Value>,
    headers: HeaderMap,
) -> Response {
    let env = Envelope::new().with("error", message);
    match write_json(status, &env, headers) {
        Ok(res) => res,
        Err(e) => {
            tracing::error!(error = %e, %status, "failed to encode error response");
            Response::status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Generic 500, no logging. Callers log with whatever context they have.
pub(crate) fn internal_error() -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
}

/// Generic 500 that also asks the transport to drop the connection.
pub(crate) fn internal_error_closing() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CONNECTION, HeaderValue::from_static("close"));
    error_response_with_headers(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE, headers)
}

/// Logs `err` with the request's method and target, then answers with the
/// generic 500.
pub fn server_error(req: &Request, err: &dyn std::error::Error) -> Response {
    tracing::error!(
        method = %req.method(),
        uri = %req.uri(),
        error = %err,
        "request failed"
    );
    internal_error()
}

pub fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "the requested resource could not be found")
}

pub fn method_not_allowed(method: &Method) -> Response {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        format!("the {method} method is not supported for this resource"),
    )
}

pub fn bad_request(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, message.into())
}

/// 413 for a request body over `limit` bytes.
pub fn payload_too_large(limit: usize) -> Response {
    error_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("body must not be larger than {limit} bytes"),
    )
}

/// 422 with one message per invalid field.
pub fn failed_validation(errors: &BTreeMap<String, String>) -> Response {
    let map = errors
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect::<serde_json::Map<_, _>>();
    error_response(StatusCode::UNPROCESSABLE_ENTITY, Value::Object(map))
}

pub fn rate_limit_exceeded() -> Response {
    error_response(StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE)
}
