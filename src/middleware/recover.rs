//! Panic-recovery guard.

use std::any::Any;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::reply;
use crate::request::Request;

/// Wraps `next` in a fault boundary.
///
/// `next` runs on its own tokio task. If it panics, synchronously while
/// building its future or later while polling it, the panic is logged
/// together with the request method and target and the client receives the
/// generic 500 envelope with `connection: close`. The panic payload never
/// reaches the response.
///
/// Panics outside request handling (background tasks, the server loop) are
/// not caught here.
pub fn recover(next: BoxedHandler) -> BoxedHandler {
    Arc::new(Recover { next })
}

struct Recover {
    next: BoxedHandler,
}

impl ErasedHandler for Recover {
    fn call(&self, req: Request) -> BoxFuture {
        let method = req.method().clone();
        let uri = req.uri().clone();
        let next = Arc::clone(&self.next);

        Box::pin(async move {
            match tokio::spawn(async move { next.call(req).await }).await {
                Ok(res) => res,
                Err(e) if e.is_panic() => {
                    let payload = e.into_panic();
                    tracing::error!(
                        %method,
                        %uri,
                        panic = %panic_message(payload.as_ref()),
                        "recovered from panic in request handler"
                    );
                    reply::internal_error_closing()
                }
                Err(e) => {
                    tracing::error!(%method, %uri, error = %e, "request handler task cancelled");
                    reply::internal_error_closing()
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use serde_json::{Value, json};

    use super::*;
    use crate::handler::Handler;
    use crate::reply::INTERNAL_ERROR_MESSAGE;
    use crate::response::Response;

    fn assert_generic_500(res: &Response) {
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.header("connection"), Some("close"));
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body, json!({ "error": INTERNAL_ERROR_MESSAGE }));
    }

    #[tokio::test]
    async fn panic_inside_future_becomes_500() {
        let next = (|_req: Request| async {
            if true {
                panic!("something went wrong");
            }
            Response::text("unreachable")
        })
        .into_boxed_handler();

        let res = recover(next).call(Request::builder().build()).await;
        assert_generic_500(&res);
        assert!(!String::from_utf8_lossy(res.body()).contains("something went wrong"));
    }

    #[tokio::test]
    async fn panic_before_future_is_built_becomes_500() {
        let next = (|req: Request| {
            if req.param("id").is_none() {
                panic!("missing id");
            }
            async { Response::text("unreachable") }
        })
        .into_boxed_handler();

        let res = recover(next).call(Request::builder().build()).await;
        assert_generic_500(&res);
    }

    #[tokio::test]
    async fn non_string_payload_is_still_caught() {
        let next = (|_req: Request| async {
            if true {
                std::panic::panic_any(42_u32);
            }
            Response::text("unreachable")
        })
        .into_boxed_handler();

        let res = recover(next).call(Request::builder().build()).await;
        assert_generic_500(&res);
    }

    #[tokio::test]
    async fn normal_response_passes_through_untouched() {
        let next = (|_req: Request| async {
            Response::builder()
                .status(StatusCode::CREATED)
                .header("location", "/v1/users/1")
                .json("{}")
        })
        .into_boxed_handler();

        let res = recover(next).call(Request::builder().build()).await;
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.header("location"), Some("/v1/users/1"));
        assert!(res.header("connection").is_none());
    }

    #[test]
    fn panic_message_extraction() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn Any + Send> = Box::new(7_i32);
        assert_eq!(panic_message(s.as_ref()), "<non-string panic payload>");
    }
}
