use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use tollgate::{
    BoxedHandler, Handler, LimiterConfig, RateLimiter, Request, Response, Router, Server, health,
    middleware,
};

const GENERIC_500: &str = "the server encountered a problem and could not process your request";

fn limiter(rps: f64, burst: u32, enabled: bool) -> RateLimiter {
    RateLimiter::new(LimiterConfig {
        rps,
        burst,
        enabled,
        sweep_interval_secs: 60,
        idle_timeout_secs: 300,
    })
}

struct TestServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<Result<(), tollgate::Error>>,
}

impl TestServer {
    async fn start(app: BoxedHandler) -> Self {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_with_shutdown(app, async {
            let _ = rx.await;
        }));
        Self { addr, shutdown, handle }
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        self.handle.await.unwrap().unwrap();
    }
}

struct RawResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// One-shot HTTP/1.1 GET over a fresh connection.
async fn get(addr: SocketAddr, path: &str) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let req = format!("GET {path} HTTP/1.1\r\nhost: {addr}\r\nconnection: close\r\n\r\n");
    stream.write_all(req.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let mut lines = head.lines();
    let status = lines.next().unwrap().split_whitespace().nth(1).unwrap().parse().unwrap();
    let headers = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
        .collect();

    RawResponse { status, headers, body: body.to_owned() }
}

/// Sends a request head plus `partial_body`, leaving the rest of the declared
/// body unsent, and reads just the status line. Gives up after `wait`.
async fn send_partial(
    addr: SocketAddr,
    path: &str,
    content_length: usize,
    partial_body: &[u8],
    wait: Duration,
) -> Option<u16> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let head = format!(
        "POST {path} HTTP/1.1\r\nhost: {addr}\r\ncontent-type: application/json\r\n\
         content-length: {content_length}\r\nconnection: close\r\n\r\n"
    );
    stream.write_all(head.as_bytes()).await.unwrap();
    stream.write_all(partial_body).await.unwrap();

    let read_status = async {
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        while !raw.windows(2).any(|w| w == b"\r\n") {
            let n = stream.read(&mut buf).await.ok()?;
            if n == 0 {
                return None;
            }
            raw.extend_from_slice(&buf[..n]);
        }
        let line = String::from_utf8_lossy(&raw).into_owned();
        line.split_whitespace().nth(1)?.parse().ok()
    };
    tokio::time::timeout(wait, read_status).await.ok().flatten()
}

/// One-shot HTTP/1.1 POST with a complete body.
async fn post(addr: SocketAddr, path: &str, body: &str) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let req = format!(
        "POST {path} HTTP/1.1\r\nhost: {addr}\r\ncontent-length: {}\r\n\
         connection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(req.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();
    let (head, body) = raw.split_once("\r\n\r\n").unwrap();
    let status = head.split_whitespace().nth(1).unwrap().parse().unwrap();
    RawResponse { status, headers: Vec::new(), body: body.to_owned() }
}

fn ok_handler() -> BoxedHandler {
    (|_req: Request| async { StatusCode::OK }).into_boxed_handler()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_burst_from_one_client_admits_exactly_burst() {
    let app = middleware::rate_limit(limiter(1.0, 5, true), ok_handler());
    let server = TestServer::start(app).await;

    let requests: Vec<_> = (0..10)
        .map(|_| {
            let addr = server.addr;
            tokio::spawn(async move { get(addr, "/").await.status })
        })
        .collect();

    let mut ok = 0;
    let mut limited = 0;
    for r in requests {
        match r.await.unwrap() {
            200 => ok += 1,
            429 => limited += 1,
            other => panic!("unexpected status {other}"),
        }
    }

    assert_eq!(ok, 5, "exactly burst requests should be admitted");
    assert_eq!(limited, 5);
    server.stop().await;
}

#[tokio::test]
async fn rejection_is_json_429() {
    let app = middleware::rate_limit(limiter(0.5, 1, true), ok_handler());
    let server = TestServer::start(app).await;

    assert_eq!(get(server.addr, "/").await.status, 200);
    let res = get(server.addr, "/").await;

    assert_eq!(res.status, 429);
    assert_eq!(res.header("content-type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_str(&res.body).unwrap();
    assert_eq!(body, serde_json::json!({ "error": "rate limit exceeded" }));
    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disabled_limiter_lets_everything_through() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let app = (move |_req: Request| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { StatusCode::OK }
    })
    .into_boxed_handler();

    let server = TestServer::start(middleware::rate_limit(limiter(1.0, 1, false), app)).await;

    let requests: Vec<_> = (0..25)
        .map(|_| {
            let addr = server.addr;
            tokio::spawn(async move { get(addr, "/").await.status })
        })
        .collect();
    for r in requests {
        assert_eq!(r.await.unwrap(), 200);
    }

    assert_eq!(hits.load(Ordering::SeqCst), 25);
    server.stop().await;
}

#[tokio::test]
async fn panicking_handler_yields_generic_500_and_server_survives() {
    let app = Router::new()
        .get("/boom", |_req: Request| async {
            if true {
                panic!("secret internal state");
            }
            Response::text("unreachable")
        })
        .get("/v1/healthcheck", health::healthcheck("test"))
        .into_handler();
    let server = TestServer::start(middleware::compose(app, limiter(100.0, 100, true))).await;

    let res = get(server.addr, "/boom").await;
    assert_eq!(res.status, 500);
    assert_eq!(res.header("content-type"), Some("application/json"));
    assert_eq!(res.header("connection"), Some("close"));
    let body: serde_json::Value = serde_json::from_str(&res.body).unwrap();
    assert_eq!(body, serde_json::json!({ "error": GENERIC_500 }));
    assert!(!res.body.contains("secret"));

    let res = get(server.addr, "/v1/healthcheck").await;
    assert_eq!(res.status, 200);
    let body: serde_json::Value = serde_json::from_str(&res.body).unwrap();
    assert_eq!(body["status"], "available");
    assert_eq!(body["system_info"]["environment"], "test");

    server.stop().await;
}

#[tokio::test]
async fn composed_pipeline_routes_and_404s() {
    let app = Router::new()
        .get("/v1/users/{id}", |req: Request| async move {
            Response::json(format!(r#"{{"id":"{}"}}"#, req.param("id").unwrap_or("")))
        })
        .into_handler();
    let server = TestServer::start(middleware::compose(app, limiter(100.0, 100, true))).await;

    let res = get(server.addr, "/v1/users/7").await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, r#"{"id":"7"}"#);

    let res = get(server.addr, "/v1/missing").await;
    assert_eq!(res.status, 404);
    let body: serde_json::Value = serde_json::from_str(&res.body).unwrap();
    assert_eq!(body, serde_json::json!({ "error": "the requested resource could not be found" }));

    server.stop().await;
}

#[tokio::test]
async fn over_budget_upload_is_rejected_before_its_body_arrives() {
    let reads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reads);
    let app = Router::new()
        .get("/", |_req: Request| async { StatusCode::OK })
        .post("/v1/upload", move |req: Request| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { req.body().len().to_string() }
        })
        .into_handler();
    let server = TestServer::start(middleware::compose(app, limiter(0.01, 1, true))).await;

    assert_eq!(get(server.addr, "/").await.status, 200);

    let status = send_partial(
        server.addr,
        "/v1/upload",
        500_000_000,
        b"{\"data\": ",
        Duration::from_secs(3),
    )
    .await;

    assert_eq!(status, Some(429), "over-budget upload must be answered at once");
    assert_eq!(reads.load(Ordering::SeqCst), 0);
    server.stop().await;
}

#[tokio::test]
async fn oversized_upload_within_budget_is_413() {
    let app = Router::new()
        .post("/v1/upload", |req: Request| async move { req.body().len().to_string() })
        .into_handler();
    let server = TestServer::start(middleware::compose(app, limiter(100.0, 100, true))).await;

    let status = send_partial(
        server.addr,
        "/v1/upload",
        tollgate::MAX_BODY_SIZE + 1,
        b"{}",
        Duration::from_secs(3),
    )
    .await;
    assert_eq!(status, Some(413));

    let res = post(server.addr, "/v1/upload", r#"{"title":"Moana"}"#).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body, "17");

    server.stop().await;
}
