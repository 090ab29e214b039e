//! Serial callback queue and stub timers.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{Notify, mpsc};
use tracing::{trace, warn};

type Job = Box<dyn FnOnce() + Send>;

/// Returned by [`CallbackQueue::current`] outside a tokio runtime.
#[derive(Debug, Error)]
#[error("callback queue requires a tokio runtime: {0}")]
pub struct NoRuntime(#[from] tokio::runtime::TryCurrentError);

/// A serial, FIFO executor for completions and progress updates.
///
/// Jobs run one at a time, in submission order, on a single worker task.
/// Progress updates and the completion of one request are enqueued in that
/// order, so a caller never sees progress after completion.
///
/// Cloning is cheap; clones feed the same worker.
#[derive(Clone)]
pub struct CallbackQueue {
    sender: mpsc::UnboundedSender<Job>,
    handle: Handle,
}

impl CallbackQueue {
    /// Starts a queue whose worker runs on `handle`.
    pub fn new(handle: Handle) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        handle.spawn(async move {
            while let Some(job) = receiver.recv().await {
                job();
            }
            trace!("callback queue closed");
        });
        Self { sender, handle }
    }

    /// Starts a queue on the current tokio runtime.
    pub fn current() -> Result<Self, NoRuntime> {
        Ok(Self::new(Handle::try_current()?))
    }

    /// The runtime the worker (and any stub timers for this queue) run on.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Enqueues `job`.
    ///
    /// If the worker is gone (its runtime shut down), the job runs inline so
    /// that it is never lost.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Err(mpsc::error::SendError(job)) = self.sender.send(Box::new(job)) {
            warn!("callback queue worker is gone, running job inline");
            job();
        }
    }
}

impl fmt::Debug for CallbackQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackQueue")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

/// Runs `job` on `queue` when given, inline otherwise.
pub(crate) fn deliver<F>(queue: Option<&CallbackQueue>, job: F)
where
    F: FnOnce() + Send + 'static,
{
    match queue {
        Some(queue) => queue.execute(job),
        None => job(),
    }
}

/// Wakes a sleeping stub timer early.
///
/// Works for timers on a tokio runtime and for the blocking fallback thread.
#[derive(Default)]
pub(crate) struct Alarm {
    rung: Mutex<bool>,
    condvar: Condvar,
    notify: Notify,
}

impl Alarm {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn ring(&self) {
        *self.rung.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.condvar.notify_all();
        // Stores a permit when the timer is not waiting yet.
        self.notify.notify_one();
    }

    async fn sleep(&self, delay: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.notify.notified() => trace!("stub timer woken early"),
        }
    }

    fn sleep_blocking(&self, delay: Duration) {
        let rung = self.rung.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = self
            .condvar
            .wait_timeout_while(rung, delay, |rung| !*rung)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Runs `job` after `delay`, or as soon as `alarm` rings.
///
/// The timer runs on the queue's runtime, else the ambient runtime, else a
/// dedicated thread. The job itself runs on `queue` when one is given.
pub(crate) fn run_after<F>(delay: Duration, alarm: Arc<Alarm>, queue: Option<CallbackQueue>, job: F)
where
    F: FnOnce() + Send + 'static,
{
    let handle = queue
        .as_ref()
        .map(|queue| queue.handle().clone())
        .or_else(|| Handle::try_current().ok());
    match handle {
        Some(handle) => {
            handle.spawn(async move {
                alarm.sleep(delay).await;
                deliver(queue.as_ref(), job);
            });
        }
        None => {
            trace!(?delay, "no tokio runtime, stub timer runs on its own thread");
            std::thread::spawn(move || {
                alarm.sleep_blocking(delay);
                deliver(queue.as_ref(), job);
            });
        }
    }
}
