//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The router holds handlers of *different* types in a single
//! `HashMap<Method, Tree>`, and middlewares wrap handlers they know nothing
//! about. Both need one uniform type, so every handler is hidden behind a
//! trait object (`dyn ErasedHandler`).
//!
//! The chain from user code to vtable call is:
//!
//! ```text
//! async fn list(req: Request) -> Result<Response, Error> { … }  ← user writes this
//!        ↓ router.on(Method::GET, "/", list)
//! list.into_boxed_handler()                          ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(list))                          ← heap-allocated wrapper
//!        ↓  wrapped by route, then global middlewares
//! handler.call(req)  at request time                 ← one vtable dispatch per layer
//!        ↓
//! Box::pin(async { list(req).await.map(into_response) })  ← BoxFuture
//! ```
//!
//! The base handler is where a successful response first passes through the
//! response codec, so it records the status into the request's
//! [`Values`](crate::Values).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

// ── Internal types ────────────────────────────────────────────────────────────

/// What every layer of a handler chain resolves to.
pub type Outcome = Result<Response, Error>;

/// A heap-allocated, type-erased future that resolves to an [`Outcome`].
///
/// `Send + 'static` let tokio move the future across threads safely.
pub type BoxFuture = Pin<Box<dyn Future<Output = Outcome> + Send + 'static>>;

/// Dispatch interface shared by base handlers and middleware layers.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
///
/// `Arc` gives cheap, thread-safe shared ownership without copying the handler.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` (or closure) with the signature:
///
/// ```text
/// async fn name(req: Request) -> Result<impl IntoResponse, Error>
/// ```
///
/// Handlers that need shared state can be built with [`with_state`].
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// The sealing module. Because `Sealed` is private, external crates cannot
/// name it and therefore cannot implement `Handler` on their own types.
mod private {
    pub trait Sealed {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Newtype wrapper that holds a concrete handler `F` and implements
/// [`ErasedHandler`], bridging the typed world to the trait-object world.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        let values = Arc::clone(req.values());
        let fut = (self.0)(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.into_response().finish(&values))
        })
    }
}

// ── State ─────────────────────────────────────────────────────────────────────

/// Binds shared state to a handler function.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use garagesale::{Error, Request, Response, Router, handler::with_state};
/// use http::{Method, StatusCode};
///
/// struct Greeter { name: String }
///
/// async fn greet(g: Arc<Greeter>, _req: Request) -> Result<Response, Error> {
///     Ok(Response::text(StatusCode::OK, format!("hello {}", g.name)))
/// }
///
/// let g = Arc::new(Greeter { name: "ann".into() });
/// let app = Router::new().on(Method::GET, "/", with_state(&g, greet));
/// ```
pub fn with_state<S, F, Fut, R>(state: &Arc<S>, f: F) -> impl Handler
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    let state = Arc::clone(state);
    move |req: Request| f(Arc::clone(&state), req)
}
