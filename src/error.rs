//! Error taxonomy.
//!
//! Every handler and middleware returns [`Error`], a closed set of classes:
//!
//! | Variant | Meaning | Client sees |
//! |---|---|---|
//! | [`Error::Request`] | expected failure (400/401/403/404, …) | the cause message verbatim, plus `fields` |
//! | [`Error::Unexpected`] | anything else | a fixed `Internal Server Error` string |
//! | [`Error::Shutdown`] | the service must terminate | a fixed `Internal Server Error` string |
//!
//! The error-translation middleware matches on these exhaustively. Only
//! [`Error::Shutdown`] is allowed to travel past it, up to the server loop.
//!
//! [`ServerError`] is separate: it surfaces infrastructure failures from
//! [`Server::serve`](crate::Server::serve), not per-request failures.

use std::borrow::Cow;

use http::StatusCode;
use serde::Serialize;

/// A boxed, thread-safe error used as the cause of request and unexpected errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ── Error ─────────────────────────────────────────────────────────────────────

/// The error type returned by handlers and middlewares.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An expected, client-facing failure with its own status code.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// A failure the client should not learn details about.
    #[error("{context}: {source}")]
    Unexpected {
        context: Cow<'static, str>,
        #[source]
        source: BoxError,
    },

    /// A fatal condition: the service must drain and stop.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

impl Error {
    /// Wraps `source` as an internal error. `context` is logged, never sent.
    pub fn unexpected(
        context: impl Into<Cow<'static, str>>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Unexpected { context: context.into(), source: source.into() }
    }

    /// The status code this error is answered with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Request(e) => e.status(),
            Self::Unexpected { .. } | Self::Shutdown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown(_))
    }
}

// ── RequestError ──────────────────────────────────────────────────────────────

/// An expected failure carrying the status code to answer with.
///
/// The cause is always present; its message is what the client reads, so only
/// build these from text that is safe to show.
#[derive(Debug, thiserror::Error)]
#[error("{cause}")]
pub struct RequestError {
    cause: BoxError,
    status: StatusCode,
    fields: Vec<FieldError>,
}

impl RequestError {
    pub fn new(cause: impl Into<BoxError>, status: StatusCode) -> Self {
        Self { cause: cause.into(), status, fields: Vec::new() }
    }

    /// `400 Bad Request` listing every field that failed validation.
    pub fn validation(fields: Vec<FieldError>) -> Self {
        Self::new("field validation error", StatusCode::BAD_REQUEST).with_fields(fields)
    }

    pub fn bad_request(cause: impl Into<BoxError>) -> Self {
        Self::new(cause, StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized(cause: impl Into<BoxError>) -> Self {
        Self::new(cause, StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden(cause: impl Into<BoxError>) -> Self {
        Self::new(cause, StatusCode::FORBIDDEN)
    }

    pub fn not_found(cause: impl Into<BoxError>) -> Self {
        Self::new(cause, StatusCode::NOT_FOUND)
    }

    pub fn with_fields(mut self, fields: Vec<FieldError>) -> Self {
        self.fields = fields;
        self
    }

    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.fields
    }
}

/// A problem with one field of a decoded request body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, error: impl Into<String>) -> Self {
        Self { field: field.into(), error: error.into() }
    }
}

// ── ShutdownError ─────────────────────────────────────────────────────────────

/// Signals that the service has to stop. Recognised by type, never by message.
#[derive(Clone, Debug, thiserror::Error)]
#[error("shutdown requested: {message}")]
pub struct ShutdownError {
    message: Cow<'static, str>,
}

impl ShutdownError {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// ── ServerError ───────────────────────────────────────────────────────────────

/// The error type returned by [`Server::serve`](crate::Server::serve).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding the listener failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A handler raised a [`ShutdownError`] and the server stopped because of it.
    #[error("service stopped: {0}")]
    Shutdown(ShutdownError),
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Attaches a message to a foreign error, turning it into [`Error::Unexpected`].
///
/// ```rust
/// use garagesale::{Context, Error};
///
/// fn parse(raw: &str) -> Result<u32, Error> {
///     raw.parse::<u32>().context("parsing quantity")
/// }
/// assert!(parse("x").is_err());
/// ```
pub trait Context<T> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, Error>;
}

impl<T, E> Context<T> for Result<T, E>
where
    E: Into<BoxError>,
{
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, Error> {
        self.map_err(|e| Error::unexpected(context, e))
    }
}
