//! The boundary to an HTTP engine.
//!
//! A [`Transport`] accepts a resolved [`TransportTask`], drives it to
//! completion and reports the raw outcome as a [`TransportOutput`]. It never
//! sees targets or plugins directly: the provider hands it a
//! [`RequestInterceptor`] that folds the plugin chain into two closures, plus
//! an optional retry policy.
//!
//! # Contract
//!
//! For every call to [`Transport::send`] the transport must, per attempt:
//!
//! 1. pass the request through [`RequestInterceptor::adapt`],
//! 2. call [`RequestInterceptor::will_send`] with the adapted request right
//!    before it goes on the wire,
//!
//! and finally call [`TransportCompletion::complete`] exactly once. Dropping
//! the completion without calling it delivers the canonical cancellation
//! failure, so a caller is never left waiting.

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::warn;

use crate::cancellable::Cancellable;
use crate::error::{BoxError, Error, RequestResult, TransportError};
use crate::multipart::MultipartFormData;
use crate::progress::Progress;
use crate::request::{PreparedRequest, Request, RequestType};
use crate::response::{HttpResponse, Response};
use crate::task::DownloadDestination;

/// Receives transfer progress from a transport.
pub type ProgressSink = Arc<dyn Fn(Progress) + Send + Sync>;

/// Work handed to a transport.
#[derive(Debug, Clone)]
pub enum TransportTask {
    /// Send the request with its in-memory body.
    Data(Request),
    /// Send the request with the contents of `file` as the body.
    UploadFile { request: Request, file: PathBuf },
    /// Send the request with `parts` encoded as `multipart/form-data`.
    UploadMultipart {
        request: Request,
        parts: Vec<MultipartFormData>,
    },
    /// Send the request and write the response body to `destination`.
    Download {
        request: Request,
        destination: DownloadDestination,
    },
}

impl TransportTask {
    pub fn request(&self) -> &Request {
        match self {
            TransportTask::Data(request)
            | TransportTask::UploadFile { request, .. }
            | TransportTask::UploadMultipart { request, .. }
            | TransportTask::Download { request, .. } => request,
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportTask::Data(_) => "data",
            TransportTask::UploadFile { .. } => "upload_file",
            TransportTask::UploadMultipart { .. } => "upload_multipart",
            TransportTask::Download { .. } => "download",
        }
    }
}

/// The raw outcome of a transport call.
///
/// Any combination of fields may be present; [`convert_response_to_result`]
/// turns every one of them into a result.
#[derive(Debug, Clone, Default)]
pub struct TransportOutput {
    pub response: Option<HttpResponse>,
    pub request: Option<Request>,
    pub data: Option<Bytes>,
    pub error: Option<BoxError>,
}

impl TransportOutput {
    /// An output carrying only `error`.
    pub fn failure<E>(request: Option<Request>, error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            request,
            error: Some(Arc::new(error)),
            ..Self::default()
        }
    }

    /// The canonical cancelled output.
    pub fn cancelled(request: Option<Request>) -> Self {
        Self::failure(request, TransportError::Cancelled)
    }
}

/// Normalizes a transport outcome.
///
/// - response without error: success, with empty data if none was read
/// - error, with or without a response: [`Error::Underlying`], keeping the
///   partial response when there is one
/// - neither: [`Error::Underlying`] with [`TransportError::Unknown`]
pub fn convert_response_to_result(output: TransportOutput) -> RequestResult {
    let TransportOutput {
        response,
        request,
        data,
        error,
    } = output;
    let to_response = |http: HttpResponse| {
        Response::new(http.status().as_u16(), data.clone().unwrap_or_default())
            .with_request(request.clone())
            .with_response(Some(http))
    };
    match (response, error) {
        (Some(http), None) => Ok(to_response(http)),
        (Some(http), Some(error)) => Err(Error::Underlying(error, Some(to_response(http)))),
        (None, Some(error)) => Err(Error::Underlying(error, None)),
        (None, None) => Err(Error::unknown()),
    }
}

type CompletionFn = Box<dyn FnOnce(TransportOutput) + Send>;

/// One-shot callback a transport reports its outcome to.
pub struct TransportCompletion {
    callback: Option<CompletionFn>,
}

impl TransportCompletion {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(TransportOutput) + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    pub fn complete(mut self, output: TransportOutput) {
        if let Some(callback) = self.callback.take() {
            callback(output);
        }
    }
}

impl Drop for TransportCompletion {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            warn!("transport dropped its completion, reporting cancellation");
            callback(TransportOutput::cancelled(None));
        }
    }
}

impl fmt::Debug for TransportCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportCompletion")
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

/// Outcome of a retry consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    DoNotRetry,
    Retry,
    RetryAfter(Duration),
}

/// Decides whether a failed attempt is sent again.
pub trait Retrier: Send + Sync {
    /// `attempt` counts the attempts already made, starting at 1.
    fn retry(
        &self,
        request: &Request,
        error: &(dyn StdError + Send + Sync + 'static),
        attempt: u32,
    ) -> RetryDecision;
}

type AdaptFn = Arc<dyn Fn(Request) -> Request + Send + Sync>;
type WillSendFn = Arc<dyn Fn(&dyn RequestType) + Send + Sync>;

/// Per-request hooks a transport runs around every attempt.
#[derive(Clone, Default)]
pub struct RequestInterceptor {
    adapt: Option<AdaptFn>,
    will_send: Option<WillSendFn>,
    retrier: Option<Arc<dyn Retrier>>,
}

impl RequestInterceptor {
    /// An interceptor that changes nothing and never retries.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adapt<F>(mut self, adapt: F) -> Self
    where
        F: Fn(Request) -> Request + Send + Sync + 'static,
    {
        self.adapt = Some(Arc::new(adapt));
        self
    }

    pub fn with_will_send<F>(mut self, will_send: F) -> Self
    where
        F: Fn(&dyn RequestType) + Send + Sync + 'static,
    {
        self.will_send = Some(Arc::new(will_send));
        self
    }

    pub fn with_retrier(mut self, retrier: Option<Arc<dyn Retrier>>) -> Self {
        self.retrier = retrier;
        self
    }

    /// Rewrites the request before it is sent.
    pub fn adapt(&self, request: Request) -> Request {
        match &self.adapt {
            Some(adapt) => adapt(request),
            None => request,
        }
    }

    /// Announces the adapted request.
    pub fn will_send(&self, request: &dyn RequestType) {
        if let Some(will_send) = &self.will_send {
            will_send(request);
        }
    }

    pub fn retry(
        &self,
        request: &Request,
        error: &(dyn StdError + Send + Sync + 'static),
        attempt: u32,
    ) -> RetryDecision {
        match &self.retrier {
            Some(retrier) => retrier.retry(request, error, attempt),
            None => RetryDecision::DoNotRetry,
        }
    }
}

impl fmt::Debug for RequestInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInterceptor")
            .field("adapt", &self.adapt.is_some())
            .field("will_send", &self.will_send.is_some())
            .field("retrier", &self.retrier.is_some())
            .finish()
    }
}

/// An HTTP engine the provider dispatches live requests through.
pub trait Transport: Send + Sync + 'static {
    /// Starts `task` and returns a handle that cancels it.
    ///
    /// `progress` receives transfer updates; a transport that cannot measure
    /// progress may ignore it.
    fn send(
        &self,
        task: TransportTask,
        interceptor: RequestInterceptor,
        progress: Option<ProgressSink>,
        completion: TransportCompletion,
    ) -> Arc<dyn Cancellable>;

    /// A request that will never be sent, as the transport would present it.
    ///
    /// Used to show plugins the request a stub stands in for.
    fn unsent(&self, request: Request) -> Box<dyn RequestType> {
        Box::new(PreparedRequest::new(request))
    }
}
