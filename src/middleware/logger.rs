use tracing::info;

use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;

/// Writes one access-log line per request once the chain has returned.
///
/// Put it outermost. The line carries the status recorded in the request's
/// [`Values`](crate::Values); if nothing recorded one (a shutdown error escaped
/// the chain) the status the error maps to is used instead.
#[derive(Clone, Copy, Debug, Default)]
pub struct Logger;

impl Logger {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for Logger {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let values = std::sync::Arc::clone(req.values());
        let method = req.method().clone();
        let path = req.path().to_owned();
        let remote = req.remote_addr();

        Box::pin(async move {
            let outcome = next.run(req).await;

            let status = values.status().unwrap_or_else(|| match &outcome {
                Ok(res) => res.status_code(),
                Err(err) => err.status(),
            });

            info!(
                trace_id = %values.trace_id(),
                %method,
                path,
                %remote,
                status = status.as_u16(),
                elapsed = ?values.elapsed(),
                "request completed"
            );
            outcome
        })
    }
}
