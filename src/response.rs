//! Outgoing HTTP response type, the [`IntoResponse`] conversion trait and the
//! JSON response codec.
//!
//! Handlers build a [`Response`] (usually with [`Response::json`]) and return
//! it. Errors are turned into the JSON error body by [`Response::from_error`],
//! which the error-translation middleware calls.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde::Serialize;

use crate::error::{Error, FieldError};
use crate::values::Values;

/// Content type of every JSON body this crate writes.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// The only message a client reads for a 5xx.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use garagesale::Response;
/// use http::StatusCode;
///
/// # fn main() -> Result<(), garagesale::Error> {
/// Response::json(StatusCode::CREATED, &serde_json::json!({ "id": 42 }))?;
/// Response::status(StatusCode::NO_CONTENT);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// Encodes `data` as JSON. A `204 No Content` status drops the body.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, data: &T) -> Result<Self, Error> {
        if status == StatusCode::NO_CONTENT {
            return Ok(Self::status(status));
        }
        let body = serde_json::to_vec(data)
            .map_err(|e| Error::unexpected("encoding response body", e))?;
        Ok(Self::with_body(status, JSON_CONTENT_TYPE, body.into()))
    }

    /// `text/plain; charset=utf-8`.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::with_body(status, "text/plain; charset=utf-8", Bytes::from(body.into()))
    }

    /// Response with no body.
    pub fn status(status: StatusCode) -> Self {
        Self { status, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// The JSON error body for `err`.
    ///
    /// Request errors expose their cause and fields. Every other class gets the
    /// fixed internal-error message so no detail leaks to the client.
    pub fn from_error(err: &Error) -> Self {
        let body = match err {
            Error::Request(e) => ErrorResponse { error: e.to_string(), fields: e.fields() },
            Error::Unexpected { .. } | Error::Shutdown(_) => {
                ErrorResponse { error: INTERNAL_ERROR_MESSAGE.to_owned(), fields: &[] }
            }
        };
        let status = err.status();
        match serde_json::to_vec(&body) {
            Ok(bytes) => Self::with_body(status, JSON_CONTENT_TYPE, bytes.into()),
            Err(e) => {
                tracing::error!(error = %e, "encoding error body");
                Self::status(status)
            }
        }
    }

    /// Adds a header, replacing any previous value.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    fn with_body(status: StatusCode, content_type: &'static str, body: Bytes) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        Self { status, headers, body }
    }

    /// Records the status into the request's [`Values`] and hands the response
    /// back. Every response that leaves a handler chain passes through here once.
    pub(crate) fn finish(self, values: &Values) -> Self {
        values.record_status(self.status);
        self
    }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

/// Wire shape of every error body.
#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: String,
    #[serde(skip_serializing_if = "no_fields")]
    fields: &'a [FieldError],
}

fn no_fields(fields: &&[FieldError]) -> bool {
    fields.is_empty()
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

/// Return a status directly from a handler: `Ok(StatusCode::NO_CONTENT)`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(StatusCode::OK, self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(StatusCode::OK, self) }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::error::{RequestError, ShutdownError};

    fn body_json(res: &Response) -> Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    #[test]
    fn json_sets_content_type() {
        let res = Response::json(StatusCode::OK, &json!({ "id": 1 })).unwrap();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_TYPE], JSON_CONTENT_TYPE);
        assert_eq!(body_json(&res), json!({ "id": 1 }));
    }

    #[test]
    fn no_content_has_no_body() {
        let res = Response::json(StatusCode::NO_CONTENT, &json!({ "ignored": true })).unwrap();
        assert!(res.body().is_empty());
        assert!(res.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn request_error_body_shows_cause_and_fields() {
        let err: Error = RequestError::validation(vec![FieldError::new("name", "is required")]).into();
        let res = Response::from_error(&err);

        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(&res),
            json!({
                "error": "field validation error",
                "fields": [{ "field": "name", "error": "is required" }],
            })
        );
    }

    #[test]
    fn fields_are_omitted_when_empty() {
        let err: Error = RequestError::not_found("product not found").into();
        assert_eq!(body_json(&Response::from_error(&err)), json!({ "error": "product not found" }));
    }

    #[test]
    fn internal_errors_hide_their_cause() {
        let unexpected = Error::unexpected("querying", "password=hunter2 rejected");
        let shutdown: Error = ShutdownError::new("integrity").into();

        for err in [unexpected, shutdown] {
            let res = Response::from_error(&err);
            assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body_json(&res), json!({ "error": INTERNAL_ERROR_MESSAGE }));
        }
    }

    #[test]
    fn finish_records_status() {
        let values = Values::new("t");
        Response::status(StatusCode::ACCEPTED).finish(&values);
        assert_eq!(values.status(), Some(StatusCode::ACCEPTED));
    }
}
