//! Bar-close observers.
//!
//! Dispatch is fire-and-forget: an observer that returns an error or panics is
//! logged and counted, and the remaining observers still run. Failures are
//! observability-only; they never reach the ingesting caller.

use parking_lot::RwLock;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::domain::Bar;

pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;
pub type CallbackResult = Result<(), CallbackError>;

type BarCloseCallback = Arc<dyn Fn(&str, &Bar) -> CallbackResult + Send + Sync>;

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

#[derive(Default)]
pub(crate) struct CallbackRegistry {
    entries: RwLock<Vec<(CallbackId, BarCloseCallback)>>,
    next_id: AtomicU64,
    failures: AtomicU64,
}

impl CallbackRegistry {
    pub(crate) fn register(&self, callback: BarCloseCallback) -> CallbackId {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, callback));
        id
    }

    pub(crate) fn unregister(&self, id: CallbackId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub(crate) fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Invoke every observer in registration order.
    ///
    /// The list is cloned first so observers may (un)register without
    /// deadlocking.
    pub(crate) fn dispatch(&self, instrument: &str, bar: &Bar) {
        let snapshot: Vec<(CallbackId, BarCloseCallback)> = self.entries.read().clone();

        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(instrument, bar))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(instrument = %instrument, callback = id.0, error = %err, "bar-close callback failed");
                }
                Err(payload) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        instrument = %instrument,
                        callback = id.0,
                        panic = %panic_message(payload.as_ref()),
                        "bar-close callback panicked"
                    );
                }
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
