use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;

/// How often the live task count is sampled, in requests.
const TASK_SAMPLE_EVERY: u64 = 100;

/// Process-wide request counters.
///
/// Cheap to update from any number of concurrent requests. Published as JSON
/// by the debug service.
#[derive(Debug, Default)]
pub struct Registry {
    requests: AtomicU64,
    errors: AtomicU64,
    tasks: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Live runtime tasks as of the last sample.
    pub fn tasks(&self) -> u64 {
        self.tasks.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot { requests: self.requests(), errors: self.errors(), tasks: self.tasks() }
    }

    /// Counts one request and returns the new total.
    fn record_request(&self) -> u64 {
        self.requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn sample_tasks(&self) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let alive = handle.metrics().num_alive_tasks() as u64;
            self.tasks.store(alive, Ordering::Relaxed);
        }
    }
}

/// Point-in-time copy of a [`Registry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub errors: u64,
    pub tasks: u64,
}

/// Counts requests and the errors that reach it.
///
/// Must sit inward of [`Errors`](super::Errors), otherwise every error has
/// already become a response by the time it gets here.
#[derive(Clone, Debug)]
pub struct Metrics {
    registry: Arc<Registry>,
}

impl Metrics {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

impl Middleware for Metrics {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        let registry = Arc::clone(&self.registry);

        Box::pin(async move {
            let outcome = next.run(req).await;

            let total = registry.record_request();
            if total % TASK_SAMPLE_EVERY == 0 {
                registry.sample_tasks();
            }
            if outcome.is_err() {
                registry.record_error();
            }
            outcome
        })
    }
}
