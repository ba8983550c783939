use std::sync::Arc;

use chrono::Utc;
use http::StatusCode;
use serde::Serialize;

use super::{Api, store_error};
use crate::auth::Authenticator;
use crate::error::{Context as _, Error, RequestError};
use crate::request::Request;
use crate::response::Response;
use crate::store::Store;

pub(super) struct Users {
    store: Arc<Store>,
    authenticator: Arc<Authenticator>,
    token_ttl: chrono::Duration,
}

impl Users {
    pub(super) fn new(api: Api) -> Self {
        Self { store: api.store, authenticator: api.authenticator, token_ttl: api.token_ttl }
    }
}

#[derive(Serialize)]
struct Token {
    token: String,
}

/// Trades Basic-auth email and password for a signed token.
pub(super) async fn token(users: Arc<Users>, req: Request) -> Result<Response, Error> {
    let Some((email, password)) = req.basic_auth() else {
        return Err(RequestError::unauthorized("must provide email and password in Basic auth").into());
    };

    let claims = users
        .store
        .users
        .authenticate(&email, &password, Utc::now(), users.token_ttl)
        .await
        .map_err(store_error("user", "authenticating"))?;

    let token = users.authenticator.generate_token(&claims).context("generating token")?;
    Response::json(StatusCode::OK, &Token { token })
}
