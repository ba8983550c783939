use std::sync::Arc;

use tracing::{debug, error};

use crate::auth::Authenticator;
use crate::error::{Error, RequestError};
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;

const BEARER_FORMAT: &str = "expected authorization header format: Bearer <token>";

/// Requires a valid bearer token and stores its claims on the request.
///
/// Missing or malformed headers and tokens that fail verification are all
/// answered `401` before anything inward runs.
#[derive(Clone)]
pub struct Authenticate {
    authenticator: Arc<Authenticator>,
}

impl Authenticate {
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self { authenticator }
    }
}

/// The token from `Bearer <token>`: exactly two space-separated parts, the
/// first of them exactly `Bearer`.
fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme == "Bearer" && !token.is_empty() => {
            Some(token)
        }
        _ => None,
    }
}

impl Middleware for Authenticate {
    fn handle(&self, mut req: Request, next: Next) -> BoxFuture {
        let authenticator = Arc::clone(&self.authenticator);

        Box::pin(async move {
            let Some(token) = req.header("authorization").and_then(bearer_token) else {
                return Err(RequestError::unauthorized(BEARER_FORMAT).into());
            };

            let claims = authenticator
                .parse_claims(token)
                .map_err(RequestError::unauthorized)?;

            debug!(trace_id = %req.values().trace_id(), subject = %claims.subject, "authenticated");
            req.set_claims(claims);
            next.run(req).await
        })
    }
}

/// Lets a request through only if its claims hold at least one of the roles.
///
/// Must run inward of [`Authenticate`]. Without claims on the request this is
/// a wiring mistake and is reported as an unexpected error.
#[derive(Clone, Debug)]
pub struct HasRole {
    roles: Arc<[String]>,
}

impl HasRole {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { roles: roles.into_iter().map(Into::into).collect() }
    }
}

impl Middleware for HasRole {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let roles = Arc::clone(&self.roles);

        Box::pin(async move {
            let Some(claims) = req.claims() else {
                error!(path = req.path(), "role check without authenticated claims");
                return Err(Error::unexpected("checking roles", "claims missing from request"));
            };

            if !claims.has_role(roles.iter()) {
                return Err(RequestError::forbidden("you are not authorized for that action").into());
            }
            next.run(req).await
        })
    }
}
