//! Built-in healthcheck handler.
//!
//! ```rust,no_run
//! use tollgate::{Router, health};
//!
//! let app = Router::new().get("/v1/healthcheck", health::healthcheck("production"));
//! ```
//!
//! Answers `200` with
//!
//! ```json
//! {
//! 	"status": "available",
//! 	"system_info": {
//! 		"environment": "production",
//! 		"version": "0.1.0"
//! 	}
//! }
//! ```
//!
//! The handler has no dependencies: if the process can answer at all, it is
//! available.

use http::{HeaderMap, StatusCode};
use serde_json::json;

use crate::envelope::{Envelope, write_json};
use crate::error::Error;
use crate::handler::Handler;
use crate::request::Request;
use crate::response::Response;

/// Crate version reported in `system_info.version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Healthcheck handler reporting `environment`.
pub fn healthcheck(environment: impl Into<String>) -> impl Handler {
    let environment = environment.into();
    move |_req: Request| {
        let res = report(&environment);
        async move { res }
    }
}

fn report(environment: &str) -> Result<Response, Error> {
    let env = Envelope::new().with("status", "available").with(
        "system_info",
        json!({ "environment": environment, "version": VERSION }),
    );
    write_json(StatusCode::OK, &env, HeaderMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_available_with_environment_and_version() {
        let handler = healthcheck("").into_boxed_handler();
        let res = handler
            .call(Request::builder().uri("/v1/healthcheck").build())
            .await;

        assert_eq!(res.status_code(), StatusCode::OK);
        let expected = format!(
            "{{\n\t\"status\": \"available\",\n\t\"system_info\": {{\n\t\t\"environment\": \"\",\n\t\t\"version\": \"{VERSION}\"\n\t}}\n}}"
        );
        assert_eq!(String::from_utf8_lossy(res.body()).trim(), expected);
    }
}
