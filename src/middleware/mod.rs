//! Middleware guards.
//!
//! A guard is an ordinary [`BoxedHandler`] that owns the handler it wraps.
//! Two ship with tollgate:
//!
//! - [`recover`] turns a panicking handler into a JSON 500 and keeps the
//!   process alive.
//! - [`rate_limit`] charges every request against a per-client token bucket
//!   and answers 429 when the bucket is empty.
//!
//! [`compose`] stacks them in the order the server expects, recovery on the
//! outside so a panic anywhere below, including inside the limiter, is
//! still caught:
//!
//! ```text
//! recover → rate_limit → router → handler
//! ```

mod rate_limit;
mod recover;

pub use rate_limit::{client_identity, rate_limit};
pub use recover::recover;

use crate::handler::BoxedHandler;
use crate::limiter::RateLimiter;

/// Wraps `app` in the standard pipeline.
pub fn compose(app: BoxedHandler, limiter: RateLimiter) -> BoxedHandler {
    recover(rate_limit(limiter, app))
}
