//! JSON envelope codec.
//!
//! Every JSON body leaves the server wrapped in a labelled top-level object,
//! `{"movie": {...}}` or `{"error": "..."}`, tab-indented and terminated by
//! a newline. Handlers and middleware write through the same function so
//! clients see one shape.

use std::collections::BTreeMap;

use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;

/// Largest request body [`read_json`] will decode. Bodies are already capped
/// at this size before a handler runs.
pub const MAX_JSON_BODY: usize = crate::request::MAX_BODY_SIZE;

/// A labelled response body. Keys serialize in sorted order.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Envelope(BTreeMap<String, Value>);

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` under `label`, replacing any earlier value.
    pub fn with(mut self, label: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(label.into(), value.into());
        self
    }

    /// Serializes `value` and adds it under `label`.
    pub fn with_serialized<T: Serialize + ?Sized>(
        mut self,
        label: impl Into<String>,
        value: &T,
    ) -> Result<Self, Error> {
        self.0.insert(label.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn get(&self, label: &str) -> Option<&Value> {
        self.0.get(label)
    }
}

/// Encodes `data` as tab-indented JSON with a trailing newline and builds a
/// response with `status`, `content-type: application/json` and `headers`.
///
/// Fails only when `data` cannot be represented as JSON, which is a bug in
/// the caller rather than something a client can trigger.
pub fn write_json<T: Serialize + ?Sized>(
    status: StatusCode,
    data: &T,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let mut body = Vec::with_capacity(128);
    let mut ser = Serializer::with_formatter(&mut body, PrettyFormatter::with_indent(b"\t"));
    data.serialize(&mut ser)?;
    body.push(b'\n');

    Ok(Response::builder().status(status).headers(headers).json(body))
}

/// Decodes the request body as a single JSON value.
///
/// The error string is written for the client: it names the offending
/// position or field but never echoes the body back.
pub fn read_json<T: DeserializeOwned>(req: &Request) -> Result<T, String> {
    let body = req.body();
    if body.is_empty() {
        return Err("body must not be empty".to_owned());
    }
    if body.len() > MAX_JSON_BODY {
        return Err(format!("body must not be larger than {MAX_JSON_BODY} bytes"));
    }

    let mut de = serde_json::Deserializer::from_slice(body);
    let value = T::deserialize(&mut de).map_err(describe)?;
    de.end()
        .map_err(|_| "body must only contain a single JSON value".to_owned())?;
    Ok(value)
}

fn describe(e: serde_json::Error) -> String {
    use serde_json::error::Category;

    match e.classify() {
        Category::Eof => "body contains badly-formed JSON".to_owned(),
        Category::Syntax => format!(
            "body contains badly-formed JSON (at line {}, column {})",
            e.line(),
            e.column()
        ),
        Category::Data => {
            let msg = e.to_string();
            match msg.find(" at line ") {
                Some(idx) => format!("body contains invalid data: {}", &msg[..idx]),
                None => format!("body contains invalid data: {msg}"),
            }
        }
        Category::Io => "body could not be read".to_owned(),
    }
}
