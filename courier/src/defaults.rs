//! Default closures for [`ProviderBuilder`](crate::ProviderBuilder).
//!
//! These are plain functions; a provider that is given none of its own uses
//! them.

use std::time::Duration;

use courier_core::{Endpoint, Error, Request, SampleResponse, StubBehavior, Target, target_url};

/// Builds an endpoint from the target as-is.
///
/// The URL is the base URL joined with the path (an empty path adds nothing),
/// and the sample response is a `200` carrying the target's sample data.
pub fn default_endpoint_mapping<T: Target + ?Sized>(target: &T) -> Endpoint {
    let sample_data = target.sample_data();
    Endpoint::new(
        target_url(target),
        move || SampleResponse::NetworkResponse(200, sample_data.clone()),
        target.method(),
        target.task(),
        target.headers(),
    )
}

/// Resolves the endpoint with [`Endpoint::url_request`].
pub fn default_request_mapping<F>(endpoint: Endpoint, done: F)
where
    F: FnOnce(Result<Request, Error>),
{
    done(endpoint.url_request());
}

/// Never stubs.
pub fn never_stub<T: ?Sized>(_: &T) -> StubBehavior {
    StubBehavior::Never
}

/// Stubs every request immediately.
pub fn immediately_stub<T: ?Sized>(_: &T) -> StubBehavior {
    StubBehavior::Immediate
}

/// Stubs every request after `delay`.
pub fn delayed_stub<T: ?Sized>(
    delay: Duration,
) -> impl Fn(&T) -> StubBehavior + Send + Sync + Clone {
    move |_| StubBehavior::Delayed(delay)
}
