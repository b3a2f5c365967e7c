use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Coalesces rapid calls: only the latest one runs, after `delay` of quiet.
///
/// Must be used from within a tokio runtime.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedule `f`, replacing any call that has not fired yet.
    pub fn call<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        });
        let mut guard = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = guard.replace(handle) {
            previous.abort();
        }
    }

    /// Drop the pending call, if any.
    pub fn cancel(&self) {
        let mut guard = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = guard.take() {
            previous.abort();
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
