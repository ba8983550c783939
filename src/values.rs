//! Request-scoped values.
//!
//! One [`Values`] is created by the router for every request, before the first
//! middleware runs. The response codec records the final status into it; the
//! logger reads the status and the start instant on the way out.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use http::{HeaderMap, StatusCode};
use uuid::Uuid;

/// State recorded for a single request.
#[derive(Debug)]
pub struct Values {
    trace_id: String,
    start: Instant,
    status: OnceLock<StatusCode>,
}

impl Values {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self { trace_id: trace_id.into(), start: Instant::now(), status: OnceLock::new() }
    }

    /// Builds the values for an inbound request, adopting the W3C
    /// `traceparent` trace id when the caller sent a well-formed one.
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        let trace_id = headers
            .get("traceparent")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_traceparent)
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        Self::new(trace_id)
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// The status the response codec recorded, if it ran.
    pub fn status(&self) -> Option<StatusCode> {
        self.status.get().copied()
    }

    /// Records the response status. Only the first write sticks.
    pub(crate) fn record_status(&self, status: StatusCode) {
        if let Err(ignored) = self.status.set(status) {
            tracing::debug!(
                trace_id = %self.trace_id,
                status = ignored.as_u16(),
                "response status already recorded"
            );
        }
    }
}

/// Extracts the trace id from `00-<trace-id>-<parent-id>-<flags>`.
fn parse_traceparent(header: &str) -> Option<String> {
    let mut parts = header.trim().split('-');
    let (version, trace_id, parent_id, flags) =
        (parts.next()?, parts.next()?, parts.next()?, parts.next()?);

    let is_hex = |s: &str, len: usize| {
        s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    };

    if !is_hex(version, 2) || version == "ff" || !is_hex(parent_id, 16) || !is_hex(flags, 2) {
        return None;
    }
    if !is_hex(trace_id, 32) || trace_id.bytes().all(|b| b == b'0') {
        return None;
    }
    Some(trace_id.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_written_once() {
        let v = Values::new("abc");
        assert_eq!(v.status(), None);

        v.record_status(StatusCode::CREATED);
        v.record_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(v.status(), Some(StatusCode::CREATED));
    }

    #[test]
    fn adopts_valid_traceparent() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "traceparent",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01".parse().unwrap(),
        );
        let v = Values::from_headers(&headers);
        assert_eq!(v.trace_id(), "4bf92f3577b34da6a3ce929d0e0e4736");
    }

    #[test]
    fn rejects_malformed_traceparent() {
        assert_eq!(parse_traceparent("00-00000000000000000000000000000000-00f067aa0ba902b7-01"), None);
        assert_eq!(parse_traceparent("00-XYZ-00f067aa0ba902b7-01"), None);
        assert_eq!(parse_traceparent("garbage"), None);

        let v = Values::from_headers(&HeaderMap::new());
        assert_eq!(v.trace_id().len(), 32);
    }
}
