//! Progress reporting for uploads and downloads.

use std::sync::Arc;

use crate::response::Response;

/// Transfer progress as reported by the transport, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    completed: u64,
    total: Option<u64>,
}

impl Progress {
    pub fn new(completed: u64, total: Option<u64>) -> Self {
        Self { completed, total }
    }

    /// Bytes transferred so far.
    pub fn completed_units(&self) -> u64 {
        self.completed
    }

    /// Expected total, when the transport knows it (e.g. `Content-Length`).
    pub fn total_units(&self) -> Option<u64> {
        self.total
    }

    /// Fraction of the transfer completed, or `None` without a known total.
    pub fn fraction_completed(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => Some((self.completed as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }
}

/// A progress update delivered to a request's progress callback.
///
/// The last update of a successful request carries the response.
#[derive(Debug, Clone, Default)]
pub struct ProgressResponse {
    progress: Option<Progress>,
    response: Option<Response>,
}

impl ProgressResponse {
    pub fn new(progress: Option<Progress>, response: Option<Response>) -> Self {
        Self { progress, response }
    }

    /// The raw transfer progress, if the transport reported any.
    pub fn progress_object(&self) -> Option<Progress> {
        self.progress
    }

    /// The response, present once the request has completed.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Whether the request has completed.
    pub fn completed(&self) -> bool {
        self.response.is_some()
    }

    /// Overall progress between 0.0 and 1.0.
    ///
    /// Without a known total this stays at 0.0 until completion.
    pub fn fraction(&self) -> f64 {
        if self.completed() {
            return 1.0;
        }
        self.progress
            .and_then(|progress| progress.fraction_completed())
            .unwrap_or(0.0)
    }
}

/// Caller-supplied progress callback.
pub type ProgressBlock = Arc<dyn Fn(ProgressResponse) + Send + Sync>;
