//! # courier-core
//!
//! Core traits and types for the courier networking layer.
//!
//! This crate holds the vocabulary shared by providers, transports and
//! plugins. It has no runtime of its own: everything that schedules work
//! lives in `courier`, and everything that talks HTTP lives in a transport
//! crate such as `courier-reqwest`.
//!
//! ## From target to result
//!
//! - A [`Target`] **describes** one API operation: base URL, path, method,
//!   [`Task`], sample data and validation.
//! - An [`Endpoint`] is the **resolved** form of a target. It resolves into a
//!   concrete [`Request`] and doubles as the deduplication key, since its
//!   equality is the equality of that request.
//! - A [`Plugin`] **observes and rewrites** requests and results at four
//!   points of every dispatch.
//! - A [`Transport`] **performs** the request and reports a raw
//!   [`TransportOutput`], which [`convert_response_to_result`] normalizes.
//! - A [`Cancellable`] lets the caller **abort** a request at any time.
//!
//! Every outcome ends up as a [`RequestResult`]: a [`Response`] or an
//! [`Error`].

pub mod cancellable;
pub mod encoding;
pub mod endpoint;
pub mod error;
pub mod multipart;
pub mod plugin;
pub mod progress;
pub mod request;
pub mod response;
pub mod stub;
pub mod target;
pub mod task;
pub mod transport;

pub use cancellable::{Cancellable, CancellableToken, CancellableWrapper, SimpleCancellable};
pub use encoding::{
    ArrayEncoding, BoolEncoding, EncodingError, JsonEncoding, ParameterEncoding, Parameters,
    UrlDestination, UrlEncoding,
};
pub use endpoint::{Endpoint, SampleResponse, SampleResponseClosure};
pub use error::{BoxError, Error, RequestResult, TransportError};
pub use multipart::{FormDataProvider, MultipartEncoder, MultipartFormData, StreamSource};
pub use plugin::Plugin;
pub use progress::{Progress, ProgressBlock, ProgressResponse};
pub use request::{PreparedRequest, Request, RequestType};
pub use response::{HttpResponse, Response};
pub use stub::StubBehavior;
pub use target::{MultiTarget, Target, ValidationType, target_url};
pub use task::{DownloadDestination, DownloadOptions, JsonEncodable, MethodExt, Task};
pub use transport::{
    ProgressSink, RequestInterceptor, Retrier, RetryDecision, Transport, TransportCompletion,
    TransportOutput, TransportTask, convert_response_to_result,
};

pub use http::{HeaderMap, Method, StatusCode};
pub use url::Url;
