//! Conversions between courier requests and reqwest types.

use courier_core::{HttpResponse, Request};

/// Builds the reqwest request for one attempt.
///
/// The body is left empty for callers that stream their own.
pub(crate) fn to_reqwest(request: &Request, with_body: bool) -> reqwest::Request {
    let mut outgoing = reqwest::Request::new(request.method().clone(), request.url().clone());
    *outgoing.headers_mut() = request.headers().clone();
    if with_body && let Some(body) = request.body() {
        *outgoing.body_mut() = Some(reqwest::Body::from(body.clone()));
    }
    outgoing
}

/// The response metadata, without the body.
pub(crate) fn from_reqwest(response: &reqwest::Response) -> HttpResponse {
    HttpResponse::new(response.status(), response.headers().clone())
        .with_url(response.url().clone())
}
