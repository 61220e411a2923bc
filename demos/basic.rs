//! Minimal tollgate service: healthcheck plus a few user endpoints behind
//! the standard recovery + rate-limit pipeline.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:4000/v1/healthcheck
//!   curl http://localhost:4000/v1/users/42
//!   curl 'http://localhost:4000/v1/users?page=2&page_size=10'
//!   curl -X POST http://localhost:4000/v1/users -d '{"name":"alice","email":"alice@example.com"}'
//!   curl http://localhost:4000/v1/panic
//!   for i in $(seq 1 10); do curl -s -o /dev/null -w '%{http_code}\n' http://localhost:4000/v1/healthcheck; done

use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use tollgate::{
    Config, Envelope, Error, RateLimiter, Request, Response, Router, Server, Validator, health,
    middleware, read_json, reply, write_json,
};

const CONFIG: &str = r#"
server:
  addr: "0.0.0.0:4000"
  env: development
limiter:
  rps: 2.0
  burst: 4
  enabled: true
  sweep_interval_secs: 60
  idle_timeout_secs: 180
"#;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::from_yaml(CONFIG)?,
    };

    let limiter = RateLimiter::new(config.limiter.clone());
    limiter.spawn_sweeper();

    let app = Router::new()
        .get("/v1/healthcheck", health::healthcheck(config.server.env.clone()))
        .get("/v1/users", list_users)
        .post("/v1/users", create_user)
        .get("/v1/users/{id}", show_user)
        .delete("/v1/users/{id}", delete_user)
        .get("/v1/panic", always_panics)
        .into_handler();

    Server::bind(config.server.addr.as_str())
        .await?
        .serve(middleware::compose(app, limiter))
        .await
}

#[derive(Debug, Serialize)]
struct User {
    id: i64,
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
    email: String,
}

async fn show_user(req: Request) -> Result<Response, Error> {
    let Some(id) = req.param("id").and_then(|s| s.parse::<i64>().ok()).filter(|id| *id > 0) else {
        return Ok(reply::not_found());
    };

    let user = User { id, name: "alice".into(), email: "alice@example.com".into() };
    let env = Envelope::new().with_serialized("user", &user)?;
    write_json(StatusCode::OK, &env, HeaderMap::new())
}

async fn list_users(req: Request) -> Result<Response, Error> {
    let query = req.query();
    let mut v = Validator::new();
    let page = query.read_int("page", 1, &mut v);
    let page_size = query.read_int("page_size", 20, &mut v);
    v.check(page > 0, "page", "must be greater than zero");
    v.check(page_size > 0 && page_size <= 100, "page_size", "must be between 1 and 100");
    if v.has_errors() {
        return Ok(reply::failed_validation(v.errors()));
    }

    let users: Vec<User> = Vec::new();
    let env = Envelope::new()
        .with_serialized("users", &users)?
        .with("metadata", serde_json::json!({ "page": page, "page_size": page_size }));
    write_json(StatusCode::OK, &env, HeaderMap::new())
}

async fn create_user(req: Request) -> Result<Response, Error> {
    let input: NewUser = match read_json(&req) {
        Ok(input) => input,
        Err(msg) => return Ok(reply::bad_request(msg)),
    };

    let mut v = Validator::new();
    v.check(!input.name.is_empty(), "name", "must be provided");
    v.check(input.email.contains('@'), "email", "must be a valid email address");
    if v.has_errors() {
        return Ok(reply::failed_validation(v.errors()));
    }

    let user = User { id: 99, name: input.name, email: input.email };
    let mut headers = HeaderMap::new();
    headers.insert(http::header::LOCATION, http::HeaderValue::from_static("/v1/users/99"));
    let env = Envelope::new().with_serialized("user", &user)?;
    write_json(StatusCode::CREATED, &env, headers)
}

async fn delete_user(_req: Request) -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn always_panics(_req: Request) -> Response {
    panic!("handler bug: index out of range");
}
