use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::Once;

use futures::FutureExt as _;

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;

thread_local! {
    /// Backtrace of the most recent panic on this thread.
    static LAST_BACKTRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Chains a hook in front of the current one that keeps a backtrace of the
/// panic for [`Panics`] to pick up.
fn install_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(Backtrace::force_capture()));
            previous(info);
        }));
    });
}

fn take_backtrace() -> Option<Backtrace> {
    LAST_BACKTRACE.with(|slot| slot.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Recovers from a panic anywhere inward and turns it into an unexpected
/// error carrying the panic message and stack trace.
///
/// The client only sees a `500`. The process and every other in-flight
/// request keep running.
#[derive(Clone, Copy, Debug)]
pub struct Panics(());

impl Panics {
    pub fn new() -> Self {
        install_hook();
        Self(())
    }
}

impl Default for Panics {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for Panics {
    fn handle(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin(async move {
            // `run` starts the inward chain synchronously, so it has to be
            // called inside the guarded future.
            match AssertUnwindSafe(async move { next.run(req).await }).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let message = panic_message(payload.as_ref()).to_owned();
                    let trace = take_backtrace()
                        .map(|bt| bt.to_string())
                        .unwrap_or_else(|| "<no backtrace>".to_owned());
                    Err(Error::unexpected("handler panicked", format!("{message}\n{trace}")))
                }
            }
        })
    }
}
