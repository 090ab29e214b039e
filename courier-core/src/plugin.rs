//! Request lifecycle hooks.
//!
//! A provider calls every plugin, in registration order, at four points of
//! each request, whether it is sent over the network or stubbed:
//!
//! 1. [`prepare`](Plugin::prepare): each plugin receives the previous plugin's
//!    output and may rewrite the request.
//! 2. [`will_send`](Plugin::will_send): observation only, right before the
//!    transport proceeds.
//! 3. [`did_receive`](Plugin::did_receive): observation of the raw result.
//! 4. [`process`](Plugin::process): each plugin may replace the result; the
//!    last output is what the caller receives.
//!
//! Failures that occur before anything could be sent (an unresolvable
//! endpoint, say) skip the first two hooks.

use crate::error::RequestResult;
use crate::request::{Request, RequestType};

/// Observes and rewrites requests made by a provider for targets of type `T`.
///
/// All hooks default to no-ops, so a plugin implements only what it needs.
///
/// ```
/// use courier_core::{Plugin, Request, Target};
/// use http::header::{HeaderValue, USER_AGENT};
///
/// struct UserAgent;
///
/// impl<T: Target + ?Sized> Plugin<T> for UserAgent {
///     fn prepare(&self, request: Request, _target: &T) -> Request {
///         request.with_header(USER_AGENT, HeaderValue::from_static("courier"))
///     }
/// }
/// ```
pub trait Plugin<T: ?Sized>: Send + Sync {
    /// Rewrites the request before it is sent.
    fn prepare(&self, request: Request, target: &T) -> Request {
        let _ = target;
        request
    }

    /// Called immediately before the request is sent, or stubbed.
    fn will_send(&self, request: &dyn RequestType, target: &T) {
        let _ = (request, target);
    }

    /// Called with the result before it is processed.
    fn did_receive(&self, result: &RequestResult, target: &T) {
        let _ = (result, target);
    }

    /// Transforms the result before it reaches the caller.
    fn process(&self, result: RequestResult, target: &T) -> RequestResult {
        let _ = target;
        result
    }
}
