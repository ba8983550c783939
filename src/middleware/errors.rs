use std::sync::Arc;

use tracing::error;

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Turns every error from inward layers into a JSON error response.
///
/// Request errors keep their status and message. Unexpected errors become a
/// bare `500`. A shutdown error is logged, answered with `500` in the request's
/// values, and passed on outward so the server can stop.
#[derive(Clone, Copy, Debug, Default)]
pub struct Errors;

impl Errors {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for Errors {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let values = Arc::clone(req.values());

        Box::pin(async move {
            let err = match next.run(req).await {
                Ok(res) => return Ok(res),
                Err(err) => err,
            };

            error!(trace_id = %values.trace_id(), error = %err, "request failed");

            match err {
                Error::Request(_) | Error::Unexpected { .. } => {
                    Ok(Response::from_error(&err).finish(&values))
                }
                Error::Shutdown(_) => {
                    values.record_status(err.status());
                    Err(err)
                }
            }
        })
    }
}
