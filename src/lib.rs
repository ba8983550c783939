//! # garagesale
//!
//! A sales API (products, sales and users) and the small HTTP framework it
//! runs on.
//!
//! ## The framework
//!
//! - **Routing**: radix trees per method via [`matchit`], `{param}` segments.
//! - **Handlers**: plain `async fn(Request) -> Result<impl IntoResponse, Error>`.
//! - **Middleware**: ordered [`Stack`](middleware::Stack)s, application-wide
//!   and per route. Application middleware is always outermost.
//! - **Errors**: a closed taxonomy, [`Error`], translated to JSON in one place.
//! - **Auth**: signed bearer tokens with key rotation ([`auth`]) and role
//!   checks ([`middleware::HasRole`]).
//! - **Server**: hyper, HTTP/1.1 and HTTP/2, graceful drain on SIGTERM or on a
//!   [`ShutdownError`].
//!
//! TLS, rate limiting and body-size limits belong to the reverse proxy in
//! front of the service.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use garagesale::middleware::{Errors, Logger, Stack};
//! use garagesale::{Error, Request, RequestError, Response, Router, Server};
//! use http::{Method, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), garagesale::ServerError> {
//!     let app = Router::with_middleware(Stack::new().with(Logger::new()).with(Errors::new()))
//!         .on(Method::GET, "/users/{id}", get_user);
//!
//!     Server::bind(([0, 0, 0, 0], 3000).into()).serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Result<Response, Error> {
//!     match req.param("id") {
//!         Some("1") => Response::json(StatusCode::OK, &serde_json::json!({ "id": 1 })),
//!         _ => Err(RequestError::not_found("user not found").into()),
//!     }
//! }
//! ```

mod error;
mod request;
mod response;
mod router;
mod server;
mod values;

pub mod api;
pub mod auth;
pub mod config;
pub mod handler;
pub mod middleware;
pub mod store;

pub use error::{BoxError, Context, Error, FieldError, RequestError, ServerError, ShutdownError};
pub use handler::Handler;
pub use request::Request;
pub use response::{INTERNAL_ERROR_MESSAGE, IntoResponse, JSON_CONTENT_TYPE, Response};
pub use router::Router;
pub use server::{DEFAULT_SHUTDOWN_TIMEOUT, Server};
pub use values::Values;
