//! # tollgate
//!
//! A small JSON HTTP framework on hyper and tokio whose request pipeline
//! comes with two guards already wired:
//!
//! - **Panic recovery.** A handler that panics yields a JSON 500 with a
//!   generic message and `connection: close`; the process keeps serving.
//! - **Per-client rate limiting.** A token bucket per client address,
//!   refilled at `rps` up to `burst`. Over-budget requests get an immediate
//!   429. Idle clients are swept by a background task.
//!
//! Guards see only the request head. A body is read, up to
//! [`MAX_BODY_SIZE`], once a request has passed them and reached its route
//! handler.
//!
//! Routing is a radix tree via [`matchit`]; responses are written through
//! one envelope codec ([`write_json`]) so handlers and guards answer in the
//! same shape.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tollgate::{Config, RateLimiter, Request, Response, Router, Server, health, middleware};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tollgate::Error> {
//!     let config = Config::load("tollgate.yaml")?;
//!
//!     let limiter = RateLimiter::new(config.limiter.clone());
//!     limiter.spawn_sweeper();
//!
//!     let app = Router::new()
//!         .get("/v1/healthcheck", health::healthcheck(config.server.env.clone()))
//!         .get("/v1/users/{id}", show_user)
//!         .into_handler();
//!
//!     Server::bind(config.server.addr.as_str())
//!         .await?
//!         .serve(middleware::compose(app, limiter))
//!         .await
//! }
//!
//! async fn show_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"user":{{"id":"{id}"}}}}"#))
//! }
//! ```

mod config;
mod envelope;
mod error;
mod handler;
mod query;
mod request;
mod response;
mod router;
mod server;
mod validator;

pub mod health;
pub mod limiter;
pub mod middleware;
pub mod reply;

pub use config::{Config, LimiterConfig, ServerConfig};
pub use envelope::{Envelope, MAX_JSON_BODY, read_json, write_json};
pub use error::Error;
pub use handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
pub use limiter::RateLimiter;
pub use query::Query;
pub use request::{MAX_BODY_SIZE, Request, RequestBuilder};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use validator::{Validator, permitted_value, unique};
