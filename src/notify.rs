//! Per-write completion notification.
//!
//! A [`WritePromise`] is a one-shot handle attached to a queued write and
//! fired exactly once with success or failure. Promises collected during a
//! drain pass are batched into a [`CompletionBatch`] and fired only after
//! all queue bookkeeping for that pass has been applied, so a handler
//! always observes consistent engine state.

use crate::error::WriteError;

/// One-shot completion handle for a queued write.
///
/// Not `Send`: promises live on the event-loop thread that owns the
/// engine, and handlers run synchronously on that thread.
pub struct WritePromise {
    on_complete: Option<Box<dyn FnOnce(Result<(), WriteError>)>>,
    chained: Vec<WritePromise>,
}

impl WritePromise {
    /// Create a promise that invokes `f` when fired.
    pub fn new(f: impl FnOnce(Result<(), WriteError>) + 'static) -> Self {
        WritePromise {
            on_complete: Some(Box::new(f)),
            chained: Vec::new(),
        }
    }

    /// Attach `child`: when this promise fires, `child` fires after it
    /// with the same outcome.
    pub fn cascade(&mut self, child: WritePromise) {
        self.chained.push(child);
    }

    /// Fire with success.
    pub fn succeed(self) {
        self.fire(Ok(()));
    }

    /// Fire with `error`.
    pub fn fail(self, error: WriteError) {
        self.fire(Err(error));
    }

    fn fire(mut self, result: Result<(), WriteError>) {
        if let Some(f) = self.on_complete.take() {
            f(result.clone());
        }
        for child in std::mem::take(&mut self.chained) {
            child.fire(result.clone());
        }
    }
}

impl std::fmt::Debug for WritePromise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritePromise")
            .field("chained", &self.chained.len())
            .finish()
    }
}

/// Ordered fan-out of the promises collected during one drain pass.
#[derive(Default)]
pub(crate) struct CompletionBatch {
    promises: Vec<WritePromise>,
}

impl CompletionBatch {
    pub(crate) fn push(&mut self, promise: Option<WritePromise>) {
        if let Some(p) = promise {
            self.promises.push(p);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.promises.len()
    }

    /// Fire every collected promise with success, in collection order.
    pub(crate) fn succeed_all(self) {
        for p in self.promises {
            p.succeed();
        }
    }

    /// Fire every collected promise with `error`, in collection order.
    pub(crate) fn fail_all(self, error: &WriteError) {
        for p in self.promises {
            p.fail(error.clone());
        }
    }
}
