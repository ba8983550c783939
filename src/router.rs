//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. Every route handler is
//! wrapped once, at registration time: first by the route's own middleware
//! stack, then by the application stack the router was built with.
//!
//! [`Router::dispatch`] is the single entry point for a request. The server
//! calls it for every request it reads, and tests call it directly to drive
//! the whole pipeline in-process.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ALLOW, HeaderValue};
use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;
use tracing::{Instrument as _, error, info_span};

use crate::error::{Error, RequestError, ShutdownError};
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::middleware::Stack;
use crate::request::Request;
use crate::response::Response;
use crate::values::Values;

/// The application router.
///
/// Build it once at startup and hand it to [`Server::serve`](crate::Server::serve).
/// Registrations return `self`, so they chain.
///
/// ```rust,no_run
/// use garagesale::{Error, Request, Router};
/// use garagesale::middleware::{Errors, Logger, Stack};
/// use http::{Method, StatusCode};
///
/// async fn health(_req: Request) -> Result<StatusCode, Error> {
///     Ok(StatusCode::OK)
/// }
///
/// let app = Router::with_middleware(Stack::new().with(Logger).with(Errors))
///     .on(Method::GET, "/v1/health", health);
/// ```
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    middleware: Stack,
}

impl Router {
    /// A router without application middleware.
    pub fn new() -> Self {
        Self::with_middleware(Stack::new())
    }

    /// A router whose every route, and the not-found answer, is wrapped by
    /// `middleware`, outermost first.
    pub fn with_middleware(middleware: Stack) -> Self {
        Self { routes: HashMap::new(), middleware }
    }

    /// Registers `handler` for `method` and `path`.
    ///
    /// Path parameters use `{name}` syntax and are read with
    /// [`Request::param`].
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.on_with(method, path, handler, Stack::new())
    }

    /// Like [`on`](Router::on), with middleware that applies to this route
    /// only. It runs inward of the application middleware.
    pub fn on_with(mut self, method: Method, path: &str, handler: impl Handler, route: Stack) -> Self {
        let handler = self.middleware.wrap(route.wrap(handler.into_boxed_handler()));
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let matched = self.routes.get(method)?.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((Arc::clone(matched.value), params))
    }

    /// Methods that do have a route for `path`, for the `Allow` header.
    fn allowed(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = self
            .routes
            .iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(method, _)| method.clone())
            .collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }

    /// Runs one request through its route and every middleware around it.
    ///
    /// Returns the response to send. A [`ShutdownError`] that escapes the
    /// handler chain comes back as `Err`: the caller answers it with a generic
    /// `500` and must stop the service.
    pub async fn dispatch(
        &self,
        req: http::Request<Bytes>,
        remote_addr: SocketAddr,
    ) -> Result<Response, ShutdownError> {
        let values = Arc::new(Values::from_headers(req.headers()));
        let span = info_span!(
            "request",
            trace_id = %values.trace_id(),
            method = %req.method(),
            path = %req.uri().path(),
        );

        let (handler, params) = match self.lookup(req.method(), req.uri().path()) {
            Some(found) => found,
            None => {
                let fallback = Fallback { allowed: self.allowed(req.uri().path()) };
                (self.middleware.wrap(Arc::new(fallback)), HashMap::new())
            }
        };

        let request = Request::new(req, params, remote_addr, Arc::clone(&values));
        match handler.call(request).instrument(span).await {
            Ok(res) => Ok(res),
            Err(Error::Shutdown(e)) => Err(e),
            Err(err) => {
                // Only reached when the application stack has no error
                // translation of its own.
                error!(trace_id = %values.trace_id(), error = %err, "unhandled error");
                Ok(Response::from_error(&err).finish(&values))
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Answers requests no route matched: `405` with an `Allow` header when the
/// path exists under other methods, `404` otherwise.
struct Fallback {
    allowed: Vec<Method>,
}

impl ErasedHandler for Fallback {
    fn call(&self, req: Request) -> BoxFuture {
        let res = if self.allowed.is_empty() {
            Response::from_error(&RequestError::not_found("route not found").into())
        } else {
            let allow = self.allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
            let res = Response::from_error(
                &RequestError::new("method not allowed", StatusCode::METHOD_NOT_ALLOWED).into(),
            );
            match HeaderValue::from_str(&allow) {
                Ok(value) => res.with_header(ALLOW, value),
                Err(_) => res,
            }
        };
        let res = res.finish(req.values());
        Box::pin(async move { Ok(res) })
    }
}
