//! Per-client rate-limit guard.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::limiter::RateLimiter;
use crate::reply;
use crate::request::Request;

/// Wraps `next` so each request first spends a token from its client's
/// bucket. Over-budget clients get an immediate 429; `next` never runs.
///
/// The client is identified by the host part of the transport peer
/// address. A peer address that cannot be split into host and port is a
/// deployment problem, so it is logged and answered with a 500.
///
/// With the limiter disabled, requests go straight to `next` without the
/// address being inspected.
pub fn rate_limit(limiter: RateLimiter, next: BoxedHandler) -> BoxedHandler {
    Arc::new(RateLimit { limiter, next })
}

struct RateLimit {
    limiter: RateLimiter,
    next: BoxedHandler,
}

impl ErasedHandler for RateLimit {
    fn call(&self, req: Request) -> BoxFuture {
        if !self.limiter.is_enabled() {
            return self.next.call(req);
        }

        let identity = match client_identity(req.remote_addr()) {
            Ok(identity) => identity,
            Err(e) => {
                let res = reply::server_error(&req, &e);
                return Box::pin(async move { res });
            }
        };

        if self.limiter.check(&identity) {
            self.next.call(req)
        } else {
            tracing::debug!(client = %identity, uri = %req.uri(), "rate limit exceeded");
            Box::pin(async { reply::rate_limit_exceeded() })
        }
    }
}

/// Host portion of a `host:port` peer address, port stripped. IPv6 hosts
/// may be bracketed (`[::1]:8080`); the brackets are removed.
pub fn client_identity(remote_addr: &str) -> Result<String, Error> {
    if let Ok(addr) = remote_addr.parse::<SocketAddr>() {
        return Ok(addr.ip().to_string());
    }

    let malformed = || Error::MalformedRemoteAddr(remote_addr.to_owned());

    let host = if let Some(rest) = remote_addr.strip_prefix('[') {
        let (host, port) = rest.split_once("]:").ok_or_else(malformed)?;
        if port.contains(':') {
            return Err(malformed());
        }
        host
    } else {
        let (host, _port) = remote_addr.rsplit_once(':').ok_or_else(malformed)?;
        if host.contains(':') || host.contains('[') || host.contains(']') {
            return Err(malformed());
        }
        host
    };

    if host.is_empty() {
        return Err(malformed());
    }
    Ok(host.to_owned())
}
