use std::sync::Arc;

use http::{Method, StatusCode};

use crate::error::Error;
use crate::handler::with_state;
use crate::middleware::{Errors, Logger, Registry, Stack};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// Routes of the debug service. Serve them on a private address.
///
/// `GET /debug/vars` returns the request counters as JSON.
pub fn debug_routes(registry: Arc<Registry>) -> Router {
    Router::with_middleware(Stack::new().with(Logger::new()).with(Errors::new()))
        .on(Method::GET, "/debug/vars", with_state(&registry, vars))
}

async fn vars(registry: Arc<Registry>, _req: Request) -> Result<Response, Error> {
    Response::json(StatusCode::OK, &registry.snapshot())
}
