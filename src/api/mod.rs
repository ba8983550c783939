//! The sales API: every route, the middleware around it, and the debug
//! service.
//!
//! | Method | Path | Guard |
//! |---|---|---|
//! | GET | `/v1/health` | none |
//! | GET | `/v1/users/token` | Basic auth |
//! | GET | `/v1/products` | token |
//! | POST | `/v1/products` | token |
//! | GET | `/v1/products/{id}` | token |
//! | PUT | `/v1/products/{id}` | token, ADMIN or creator |
//! | DELETE | `/v1/products/{id}` | token + ADMIN |
//! | POST | `/v1/products/{id}/sales` | token + ADMIN |
//! | GET | `/v1/products/{id}/sales` | token |

mod check;
mod debug;
mod products;
mod users;

use std::sync::Arc;

use http::Method;

pub use debug::debug_routes;

use crate::auth::{Authenticator, Claims, ROLE_ADMIN};
use crate::error::{Error, RequestError};
use crate::handler::with_state;
use crate::middleware::{Authenticate, Errors, HasRole, Logger, Metrics, Panics, Registry, Stack};
use crate::request::Request;
use crate::router::Router;
use crate::store::{Store, StoreError};

/// What the API handlers share.
pub struct Api {
    pub store: Arc<Store>,
    pub authenticator: Arc<Authenticator>,
    pub token_ttl: chrono::Duration,
}

/// Builds the API router.
///
/// Application middleware, outermost first: access log, error translation,
/// metrics, panic recovery.
pub fn routes(api: Api, registry: Arc<Registry>) -> Router {
    let global = Stack::new()
        .with(Logger::new())
        .with(Errors::new())
        .with(Metrics::new(registry))
        .with(Panics::new());

    let authenticated = Stack::new().with(Authenticate::new(Arc::clone(&api.authenticator)));
    let admin = authenticated.clone().with(HasRole::new([ROLE_ADMIN]));

    let store = Arc::clone(&api.store);
    let users = Arc::new(users::Users::new(api));

    Router::with_middleware(global)
        .on(Method::GET, "/v1/health", with_state(&store, check::health))
        .on(Method::GET, "/v1/users/token", with_state(&users, users::token))
        .on_with(Method::GET, "/v1/products", with_state(&store, products::list), authenticated.clone())
        .on_with(Method::POST, "/v1/products", with_state(&store, products::create), authenticated.clone())
        .on_with(Method::GET, "/v1/products/{id}", with_state(&store, products::retrieve), authenticated.clone())
        .on_with(Method::PUT, "/v1/products/{id}", with_state(&store, products::update), authenticated.clone())
        .on_with(Method::DELETE, "/v1/products/{id}", with_state(&store, products::delete), admin.clone())
        .on_with(Method::POST, "/v1/products/{id}/sales", with_state(&store, products::add_sale), admin)
        .on_with(Method::GET, "/v1/products/{id}/sales", with_state(&store, products::list_sales), authenticated)
}

/// Claims put on the request by [`Authenticate`]. Missing claims mean the
/// route was registered without it.
fn claims(req: &Request) -> Result<&Claims, Error> {
    req.claims()
        .ok_or_else(|| Error::unexpected("reading claims", "claims missing from request"))
}

/// Maps a store sentinel to the request error a client should see. `what`
/// names the record for not-found messages.
fn store_error(what: &'static str, context: &'static str) -> impl Fn(StoreError) -> Error {
    move |err| match err {
        StoreError::InvalidId => RequestError::bad_request(err).into(),
        StoreError::NotFound => RequestError::not_found(format!("{what} not found")).into(),
        StoreError::Forbidden => RequestError::forbidden(err).into(),
        StoreError::AuthenticationFailure => RequestError::unauthorized(err).into(),
        // No route registers users yet; `Users::create` is public for callers
        // building their own.
        StoreError::DuplicateEmail(_) => RequestError::bad_request(err).into(),
        StoreError::Hash(_) | StoreError::Unavailable => Error::unexpected(context, err),
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;

    #[test]
    fn store_sentinels_map_to_client_errors() {
        let map = store_error("product", "testing");
        let cases = [
            (StoreError::InvalidId, StatusCode::BAD_REQUEST),
            (StoreError::NotFound, StatusCode::NOT_FOUND),
            (StoreError::Forbidden, StatusCode::FORBIDDEN),
            (StoreError::AuthenticationFailure, StatusCode::UNAUTHORIZED),
            (StoreError::DuplicateEmail("a@b.c".into()), StatusCode::BAD_REQUEST),
            (StoreError::Unavailable, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(map(err).status(), status);
        }
        assert!(matches!(map(StoreError::Hash("bad".into())), Error::Unexpected { .. }));
    }
}
