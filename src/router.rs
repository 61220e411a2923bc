//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. Misses are answered with
//! the JSON 404 / 405 envelopes so they look like every other error.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::reply;
use crate::request::Request;

/// The application router.
///
/// Build it once at startup, turn it into a handler with
/// [`into_handler`](Router::into_handler), and wrap it in middleware.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

pub(crate) enum Lookup {
    Found(BoxedHandler, HashMap<String, String>),
    MethodNotAllowed,
    NotFound,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Registers `handler` for `method` + `path`. Path parameters use
    /// `{name}` syntax and are read back with
    /// [`Request::param`](crate::Request::param).
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for the same method. Routes are fixed at startup, so this
    /// is a programming error.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PATCH, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    pub fn into_handler(self) -> BoxedHandler {
        Arc::new(self)
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Lookup {
        if let Some(matched) = self.routes.get(method).and_then(|tree| tree.at(path).ok()) {
            let params = matched
                .params
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            return Lookup::Found(Arc::clone(matched.value), params);
        }

        let other_method_matches = self
            .routes
            .iter()
            .any(|(m, tree)| m != method && tree.at(path).is_ok());
        if other_method_matches {
            Lookup::MethodNotAllowed
        } else {
            Lookup::NotFound
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl ErasedHandler for Router {
    fn call(&self, mut req: Request) -> BoxFuture {
        match self.lookup(req.method(), req.path()) {
            Lookup::Found(handler, params) => {
                req.set_params(params);
                handler.call(req)
            }
            Lookup::MethodNotAllowed => {
                let res = reply::method_not_allowed(req.method());
                Box::pin(async move { res })
            }
            Lookup::NotFound => Box::pin(async { reply::not_found() }),
        }
    }
}
