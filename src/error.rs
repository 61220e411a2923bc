//! Unified error type.

use thiserror::Error;

/// The error type returned by tollgate's fallible operations.
///
/// Client-visible outcomes (404, 422, 429, ...) are [`Response`](crate::Response)
/// values, not `Error`s. This type surfaces infrastructure and programming
/// failures: binding a port, loading configuration, encoding a body, a
/// request body that breaks the size cap or the connection, or a transport
/// that hands us a peer address we cannot read.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("json encode: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("malformed remote address `{0}`")]
    MalformedRemoteAddr(String),

    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("request body could not be read: {0}")]
    BodyRead(String),
}
