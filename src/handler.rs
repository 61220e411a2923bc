//! Handler trait and type erasure.
//!
//! Route handlers, the router itself and every middleware guard share one
//! runtime shape: a [`BoxedHandler`], an `Arc` around something that turns a
//! [`Request`] into a boxed future of [`Response`]. Because guards take and
//! return that same shape, they nest freely:
//!
//! ```text
//! async fn show(req: Request) -> Response { … }     ← user writes this
//!        ↓ .into_boxed_handler()
//! Arc<FnHandler(show)>                              ← BoxedHandler
//!        ↓ Router::on(...).into_handler()
//! Arc<Router>                                       ← BoxedHandler
//!        ↓ middleware::rate_limit(limiter, _)
//! Arc<RateLimit { next }>                           ← BoxedHandler
//!        ↓ middleware::recover(_)
//! Arc<Recover { next }>                             ← what the server runs
//! ```
//!
//! Per request that is one `Arc` clone and one virtual call per layer.
//!
//! # Request bodies
//!
//! The server hands requests down with the body still unread, and guards
//! decide on the head alone. `FnHandler` is the last layer before user
//! code; it buffers the body, capped at [`MAX_BODY_SIZE`](crate::MAX_BODY_SIZE),
//! so a request turned away by a guard never costs an upload. An oversized
//! body is answered with 413, a broken one with 400.
//!
//! The handler future runs inside a `request` span carrying the method and
//! target, so anything the handler logs, including an `Err` it returns, is
//! tied to its request.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::Instrument;

use crate::error::Error;
use crate::reply;
use crate::request::{MAX_BODY_SIZE, Request};
use crate::response::{IntoResponse, Response};

// ── Erased types ──────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to a [`Response`].
///
/// `Send + 'static` so tokio can move it across worker threads and so the
/// recovery guard can run it on its own task.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Dispatch interface implemented by handlers, the router and the guards.
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Satisfied automatically by any function or closure of the shape
///
/// ```text
/// Fn(Request) -> impl Future<Output = impl IntoResponse>
/// ```
///
/// Sealed: the blanket impl below is the only one.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(Arc::new(self)))
    }
}

// ── FnHandler ─────────────────────────────────────────────────────────────────

// The inner `Arc` lets the returned future own the function: the user's
// handler is only called after the body has been buffered.
struct FnHandler<F>(Arc<F>);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, mut req: Request) -> BoxFuture {
        let f = Arc::clone(&self.0);
        let span = tracing::info_span!("request", method = %req.method(), uri = %req.uri());

        Box::pin(
            async move {
                match req.buffer_body(MAX_BODY_SIZE).await {
                    Ok(()) => {}
                    Err(Error::BodyTooLarge(limit)) => return reply::payload_too_large(limit),
                    Err(e) => {
                        tracing::warn!(
                            peer = %req.remote_addr(),
                            error = %e,
                            "failed to read request body"
                        );
                        return reply::bad_request("the request body could not be read");
                    }
                }
                f(req).await.into_response()
            }
            .instrument(span),
        )
    }
}
