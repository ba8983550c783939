use std::sync::Arc;

use http::StatusCode;
use serde::Serialize;

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::store::Store;

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

/// Readiness: `200` when the store answers, `500` with a reason otherwise.
///
/// An unready store is a normal answer here, not an error, so the body stays
/// descriptive.
pub(super) async fn health(store: Arc<Store>, _req: Request) -> Result<Response, Error> {
    match store.status_check().await {
        Ok(()) => Response::json(StatusCode::OK, &Health { status: "ok" }),
        Err(err) => {
            tracing::warn!(error = %err, "health check failed");
            Response::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &Health { status: "the store is not accepting requests at the moment" },
            )
        }
    }
}
