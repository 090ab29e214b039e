//! Metrics declaration and recording.

use std::time::Duration;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track number of dispatched requests by kind (`live` or `stub`).
    pub static ref REQUESTS_DISPATCHED: &'static str = {
        metrics::describe_counter!(
            "courier_requests_dispatched_total",
            "Total number of requests dispatched, by dispatch kind."
        );
        "courier_requests_dispatched_total"
    };
    /// Track number of calls that joined an outstanding request.
    pub static ref REQUESTS_DEDUPLICATED: &'static str = {
        metrics::describe_counter!(
            "courier_requests_deduplicated_total",
            "Total number of calls served by an already in-flight request."
        );
        "courier_requests_deduplicated_total"
    };
    /// Track number of requests completed as cancelled.
    pub static ref REQUESTS_CANCELLED: &'static str = {
        metrics::describe_counter!(
            "courier_requests_cancelled_total",
            "Total number of requests completed with a cancellation."
        );
        "courier_requests_cancelled_total"
    };
    /// Histogram of live request duration.
    pub static ref REQUEST_DURATION: &'static str = {
        metrics::describe_histogram!(
            "courier_request_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of live requests in seconds, from dispatch to transport completion."
        );
        "courier_request_duration_seconds"
    };
}

/// Records a dispatch of the given kind.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_dispatch(kind: &'static str) {
    metrics::counter!(*REQUESTS_DISPATCHED, "kind" => kind).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_dispatch(_kind: &'static str) {}

/// Records a request that completed with a cancellation.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_cancellation() {
    metrics::counter!(*REQUESTS_CANCELLED).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_cancellation() {}

/// Records the duration of a live request and whether it succeeded.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_live_duration(duration: Duration, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::histogram!(*REQUEST_DURATION, "outcome" => outcome).record(duration.as_secs_f64());
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_live_duration(_duration: Duration, _success: bool) {}
