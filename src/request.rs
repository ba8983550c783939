//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::{Extensions, HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use crate::error::{Error, FieldError, RequestError};
use crate::values::Values;

/// An incoming HTTP request with its body already collected.
pub struct Request {
    parts: http::request::Parts,
    body: Bytes,
    params: HashMap<String, String>,
    remote_addr: SocketAddr,
    values: Arc<Values>,
}

impl Request {
    pub(crate) fn new(
        req: http::Request<Bytes>,
        params: HashMap<String, String>,
        remote_addr: SocketAddr,
        values: Arc<Values>,
    ) -> Self {
        let (parts, body) = req.into_parts();
        Self { parts, body, params, remote_addr, values }
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> SocketAddr { self.remote_addr }

    /// The state shared between this request's middlewares.
    pub fn values(&self) -> &Arc<Values> { &self.values }

    /// Typed per-request storage. Keys are types, so a private type makes a
    /// private slot.
    pub fn extensions(&self) -> &Extensions { &self.parts.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.parts.extensions }

    /// Header lookup by name (header names are case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/products/{id}`, `req.param("id")` on `/products/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Decodes the JSON body into `T` and runs its validation rules.
    ///
    /// Malformed JSON is a `400`; failed rules are a `400` listing every
    /// offending field.
    pub fn decode<T>(&self) -> Result<T, Error>
    where
        T: DeserializeOwned + Validate,
    {
        let value: T = serde_json::from_slice(&self.body).map_err(RequestError::bad_request)?;
        value
            .validate()
            .map_err(|errors| RequestError::validation(field_errors(&errors)))?;
        Ok(value)
    }

    /// Credentials from an `Authorization: Basic …` header.
    pub fn basic_auth(&self) -> Option<(String, String)> {
        let encoded = self.header("authorization")?.strip_prefix("Basic ")?;
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, pass) = decoded.split_once(':')?;
        Some((user.to_owned(), pass.to_owned()))
    }
}

/// Flattens validator output into `(field, message)` pairs, ordered by field.
fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let message = match &e.message {
                    Some(message) => message.to_string(),
                    None => match e.code.as_ref() {
                        "required" => "is required".to_owned(),
                        "length" => "has an invalid length".to_owned(),
                        "range" => "is out of range".to_owned(),
                        "email" => "must be a valid email".to_owned(),
                        other => format!("failed `{other}` validation"),
                    },
                };
                FieldError::new(field.to_string(), message)
            })
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Builds a request as the router would, for unit tests.
    pub(crate) fn request(req: http::Request<Bytes>) -> Request {
        let values = Arc::new(Values::from_headers(req.headers()));
        Request::new(req, HashMap::new(), SocketAddr::from(([127, 0, 0, 1], 50000)), values)
    }
}
