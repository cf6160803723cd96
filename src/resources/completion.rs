use std::{fmt, sync::Arc, time::Duration};

use parking_lot::{Condvar, Mutex};

use super::ResourceHandle;
use crate::error::ResourceError;

type LoadResult = Result<ResourceHandle, ResourceError>;

struct CompletionInner {
    result: Mutex<Option<LoadResult>>,
    cvar: Condvar,
}

/// Waiting half of a single synchronous load.
pub struct Completion(Arc<CompletionInner>);

/// Fulfilling half, travels with the request to the loader thread.
///
/// Dropping it unfulfilled resolves the waiter with [`ResourceError::Abandoned`].
pub struct Completer {
    inner: Arc<CompletionInner>,
    fulfilled: bool,
}

pub fn completion() -> (Completer, Completion) {
    let inner = Arc::new(CompletionInner {
        result: Mutex::new(None),
        cvar: Condvar::new(),
    });

    (
        Completer {
            inner: Arc::clone(&inner),
            fulfilled: false,
        },
        Completion(inner),
    )
}

impl Completer {
    pub fn complete(mut self, result: LoadResult) {
        self.set(result);
    }

    fn set(&mut self, result: LoadResult) {
        if self.fulfilled {
            return;
        }
        self.fulfilled = true;

        *self.inner.result.lock() = Some(result);
        self.inner.cvar.notify_all();
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        self.set(Err(ResourceError::Abandoned));
    }
}

impl Completion {
    pub fn is_complete(&self) -> bool {
        self.0.result.lock().is_some()
    }

    pub fn wait(self) -> LoadResult {
        let mut result = self.0.result.lock();
        loop {
            if let Some(result) = result.take() {
                return result;
            }
            self.0.cvar.wait(&mut result);
        }
    }

    /// Returns `None` if nothing arrived within `timeout`.
    pub fn wait_timeout(self, timeout: Duration) -> Option<LoadResult> {
        let mut result = self.0.result.lock();
        if result.is_none() {
            self.0
                .cvar
                .wait_while_for(&mut result, |result| result.is_none(), timeout);
        }
        result.take()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Completion")
            .field(if self.is_complete() { &"complete" } else { &"pending" })
            .finish()
    }
}

impl fmt::Debug for Completer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("fulfilled", &self.fulfilled)
            .finish()
    }
}
