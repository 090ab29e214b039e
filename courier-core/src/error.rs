//! Error taxonomy shared by every stage of the request pipeline.
//!
//! [`Error`] is the single failure type callers ever see. Variants carry the
//! minimum context needed to act on them: mapping failures carry the
//! offending [`Response`], pre-dispatch failures carry a diagnostic, and
//! [`Error::Underlying`] wraps whatever the transport (or a cancellation)
//! produced.
//!
//! Wrapped errors are held behind [`Arc`] so that one result can be fanned
//! out to several waiters without re-creating it.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::response::Response;

/// Shared, type-erased error used for wrapped failures.
pub type BoxError = Arc<dyn StdError + Send + Sync + 'static>;

/// The outcome of one logical request.
pub type RequestResult = Result<Response, Error>;

/// Canonical transport-level failures produced by the pipeline itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request was cancelled through its token.
    #[error("the operation was cancelled")]
    Cancelled,
    /// The transport finished without producing a response or an error.
    #[error("the transport finished without a response or an error")]
    Unknown,
}

/// Error type for every request made through a provider.
#[derive(Clone, Error)]
pub enum Error {
    /// Failed to decode the response body as an image.
    #[error("failed to map data to an image")]
    ImageMapping(Response),

    /// Failed to decode the response body as JSON.
    #[error("failed to map data to JSON")]
    JsonMapping(Response),

    /// Failed to decode the response body as a string.
    #[error("failed to map data to a string")]
    StringMapping(Response),

    /// Failed to decode the response body into a typed object.
    #[error("failed to map data to a decodable object: {0}")]
    ObjectMapping(BoxError, Response),

    /// Failed to serialize an encodable request body.
    #[error("failed to encode encodable object into data: {0}")]
    EncodableMapping(BoxError),

    /// The status code fell outside the accepted set.
    #[error("status code {} didn't fall within the given range", .0.status_code())]
    StatusCode(Response),

    /// A transport-level or cancellation failure, with the partial response if
    /// one was received.
    #[error("{0}")]
    Underlying(BoxError, Option<Response>),

    /// The endpoint could not be turned into a request. Carries the URL.
    #[error("failed to map endpoint to a request: {0}")]
    RequestMapping(String),

    /// Request parameters could not be encoded.
    #[error("failed to encode parameters for request: {0}")]
    ParameterEncoding(BoxError),
}

impl Error {
    /// Wraps any error as [`Error::Underlying`] without a response.
    pub fn underlying<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error::Underlying(Arc::new(error), None)
    }

    /// The canonical cancellation failure.
    pub fn cancelled() -> Self {
        Error::underlying(TransportError::Cancelled)
    }

    /// The canonical failure for a transport that produced nothing at all.
    pub fn unknown() -> Self {
        Error::underlying(TransportError::Unknown)
    }

    /// Returns `true` if this is the canonical cancellation failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Error::Underlying(error, _)
                if error.downcast_ref::<TransportError>() == Some(&TransportError::Cancelled)
        )
    }

    /// The response attached to this error, if any.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Error::ImageMapping(response)
            | Error::JsonMapping(response)
            | Error::StringMapping(response)
            | Error::ObjectMapping(_, response)
            | Error::StatusCode(response) => Some(response),
            Error::Underlying(_, response) => response.as_ref(),
            Error::EncodableMapping(_) | Error::RequestMapping(_) | Error::ParameterEncoding(_) => {
                None
            }
        }
    }

    /// The wrapped error for variants that carry one.
    pub fn underlying_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Error::ObjectMapping(error, _)
            | Error::EncodableMapping(error)
            | Error::Underlying(error, _)
            | Error::ParameterEncoding(error) => Some(error.as_ref()),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Error::ImageMapping(_) => "ImageMapping",
            Error::JsonMapping(_) => "JsonMapping",
            Error::StringMapping(_) => "StringMapping",
            Error::ObjectMapping(..) => "ObjectMapping",
            Error::EncodableMapping(_) => "EncodableMapping",
            Error::StatusCode(_) => "StatusCode",
            Error::Underlying(..) => "Underlying",
            Error::RequestMapping(_) => "RequestMapping",
            Error::ParameterEncoding(_) => "ParameterEncoding",
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tuple = f.debug_tuple(self.kind());
        if let Error::RequestMapping(url) = self {
            tuple.field(url);
        }
        if let Some(error) = self.underlying_error() {
            tuple.field(&format_args!("{error}"));
        }
        if let Some(response) = self.response() {
            tuple.field(response);
        }
        tuple.finish()
    }
}

// Wrapped errors are compared by their rendered message.
fn same_error(lhs: &BoxError, rhs: &BoxError) -> bool {
    Arc::ptr_eq(lhs, rhs) || lhs.to_string() == rhs.to_string()
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::ImageMapping(r1), Error::ImageMapping(r2))
            | (Error::JsonMapping(r1), Error::JsonMapping(r2))
            | (Error::StringMapping(r1), Error::StringMapping(r2))
            | (Error::StatusCode(r1), Error::StatusCode(r2)) => r1 == r2,
            (Error::ObjectMapping(e1, r1), Error::ObjectMapping(e2, r2)) => {
                same_error(e1, e2) && r1 == r2
            }
            (Error::EncodableMapping(e1), Error::EncodableMapping(e2))
            | (Error::ParameterEncoding(e1), Error::ParameterEncoding(e2)) => same_error(e1, e2),
            (Error::Underlying(e1, r1), Error::Underlying(e2, r2)) => {
                same_error(e1, e2) && r1 == r2
            }
            (Error::RequestMapping(u1), Error::RequestMapping(u2)) => u1 == u2,
            _ => false,
        }
    }
}
