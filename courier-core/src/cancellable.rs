//! Cancellation handles.
//!
//! Every request hands the caller an `Arc<dyn Cancellable>` before the work it
//! controls necessarily exists. [`CancellableWrapper`] covers that gap: it is
//! armed with the real handle later and forwards a cancellation that arrived
//! early. All handles are idempotent; only the first `cancel` has an effect.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A thread-safe handle that aborts a request.
pub trait Cancellable: Send + Sync {
    /// Whether [`cancel`](Cancellable::cancel) has been called.
    fn is_cancelled(&self) -> bool;

    /// Cancels the request. Calling this more than once has no further effect.
    fn cancel(&self);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A flag with no side effect of its own.
#[derive(Debug, Default)]
pub struct SimpleCancellable {
    cancelled: AtomicBool,
}

impl SimpleCancellable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cancellable for SimpleCancellable {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

type CancelAction = Box<dyn FnOnce() + Send>;

/// Runs an action on the first cancellation.
///
/// The flag is raised before the action runs, so the action (and anything it
/// wakes) already observes `is_cancelled() == true`.
pub struct CancellableToken {
    cancelled: AtomicBool,
    action: Mutex<Option<CancelAction>>,
}

impl CancellableToken {
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancelled: AtomicBool::new(false),
            action: Mutex::new(Some(Box::new(action))),
        }
    }
}

impl Cancellable for CancellableToken {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let action = lock(&self.action).take();
        if let Some(action) = action {
            action();
        }
    }
}

impl fmt::Debug for CancellableToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellableToken")
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct WrapperState {
    cancelled: bool,
    inner: Option<Arc<dyn Cancellable>>,
}

/// A handle that can be armed with the real cancellable after it was handed out.
///
/// Cancelling before [`arm`](CancellableWrapper::arm) is remembered, and the
/// inner handle is cancelled as soon as it is attached.
#[derive(Default)]
pub struct CancellableWrapper {
    state: Mutex<WrapperState>,
}

impl CancellableWrapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the real cancellable, replacing any previous one.
    pub fn arm(&self, inner: Arc<dyn Cancellable>) {
        let cancelled = {
            let mut state = lock(&self.state);
            state.inner = Some(inner.clone());
            state.cancelled
        };
        if cancelled {
            inner.cancel();
        }
    }
}

impl Cancellable for CancellableWrapper {
    fn is_cancelled(&self) -> bool {
        let state = lock(&self.state);
        state.cancelled
            || state
                .inner
                .as_ref()
                .is_some_and(|inner| inner.is_cancelled())
    }

    fn cancel(&self) {
        // The inner handle is cancelled outside the lock: its side effects may
        // complete the request, which can query this wrapper again.
        let inner = {
            let mut state = lock(&self.state);
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            state.inner.clone()
        };
        if let Some(inner) = inner {
            inner.cancel();
        }
    }
}

impl fmt::Debug for CancellableWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("CancellableWrapper")
            .field("cancelled", &state.cancelled)
            .field("armed", &state.inner.is_some())
            .finish()
    }
}
