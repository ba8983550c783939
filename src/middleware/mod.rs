//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: access logs, metrics, panic recovery, error
//! translation and authentication.
//!
//! # Composition
//!
//! A [`Stack`] is an ordered list of middlewares. Wrapping a handler with
//! `[m0, m1, m2]` produces the classic onion:
//!
//! ```text
//! m0 pre → m1 pre → m2 pre → handler → m2 post → m1 post → m0 post
//! ```
//!
//! The router wraps each route handler with the route's own stack first and
//! then with the application stack, so application middlewares are always the
//! outermost layers. The logger relies on that: by the time its post-logic
//! runs, the response status is final.
//!
//! # Writing one
//!
//! Implement [`Middleware`] on a struct, or pass a closure:
//!
//! ```rust
//! use garagesale::middleware::{Next, Stack};
//! use garagesale::Request;
//!
//! let stack = Stack::new().with(|req: Request, next: Next| async move {
//!     tracing::debug!(path = req.path(), "before");
//!     let outcome = next.run(req).await;
//!     tracing::debug!("after");
//!     outcome
//! });
//! ```

mod auth;
mod errors;
mod logger;
mod metrics;
mod panics;

use std::future::Future;
use std::sync::Arc;

pub use auth::{Authenticate, HasRole};
pub use errors::Errors;
pub use logger::Logger;
pub use metrics::{Metrics, MetricsSnapshot, Registry};
pub use panics::Panics;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Outcome};
use crate::request::Request;

// ── Middleware trait ──────────────────────────────────────────────────────────

/// Code that runs before and after the rest of a handler chain.
///
/// `handle` receives the request and the remainder of the chain as [`Next`].
/// Not calling `next.run` short-circuits everything inward of this layer.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: Request, next: Next) -> BoxFuture;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin(self(req, next))
    }
}

/// The remainder of the handler chain, inward of the current middleware.
pub struct Next(BoxedHandler);

impl Next {
    pub fn run(self, req: Request) -> BoxFuture {
        self.0.call(req)
    }
}

// ── Stack ─────────────────────────────────────────────────────────────────────

/// An ordered list of middlewares. The first one added is the outermost.
#[derive(Clone, Default)]
pub struct Stack {
    layers: Vec<Arc<dyn Middleware>>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `middleware` inward of everything already in the stack.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Wraps `handler` so that the first middleware runs first on the way in
    /// and last on the way out.
    pub(crate) fn wrap(&self, mut handler: BoxedHandler) -> BoxedHandler {
        // Walk backwards: the last layer wraps the handler directly and the
        // first layer ends up outermost.
        for layer in self.layers.iter().rev() {
            handler = Arc::new(Layer { middleware: Arc::clone(layer), next: handler });
        }
        handler
    }
}

/// One middleware bound to the chain inward of it.
struct Layer {
    middleware: Arc<dyn Middleware>,
    next: BoxedHandler,
}

impl ErasedHandler for Layer {
    fn call(&self, req: Request) -> BoxFuture {
        self.middleware.handle(req, Next(Arc::clone(&self.next)))
    }
}
