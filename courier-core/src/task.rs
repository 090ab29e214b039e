//! The kind of work a target asks for.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use serde::Serialize;

use crate::encoding::{ParameterEncoding, Parameters};
use crate::multipart::MultipartFormData;

/// A value that can be serialized into a JSON request body.
pub trait JsonEncodable: Send + Sync {
    fn encode_json(&self) -> Result<Vec<u8>, serde_json::Error>;
}

impl<T> JsonEncodable for T
where
    T: Serialize + Send + Sync,
{
    fn encode_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Options applied before a download is moved into place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DownloadOptions {
    pub create_intermediate_directories: bool,
    pub remove_previous_file: bool,
}

/// Where a download task writes its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDestination {
    path: PathBuf,
    options: DownloadOptions,
}

impl DownloadDestination {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: DownloadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DownloadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> DownloadOptions {
        self.options
    }
}

/// An HTTP task.
///
/// Matching on this enum is exhaustive everywhere it is dispatched, so a new
/// variant fails to compile until every dispatch site handles it.
#[derive(Clone)]
pub enum Task {
    /// A request with no additional data.
    RequestPlain,
    /// A request body set with raw data.
    RequestData(Bytes),
    /// A request body set with a JSON-serializable value.
    RequestJsonEncodable(Arc<dyn JsonEncodable>),
    /// Parameters written with the given encoding.
    RequestParameters {
        parameters: Parameters,
        encoding: ParameterEncoding,
    },
    /// A raw body combined with query string parameters.
    RequestCompositeData {
        body_data: Bytes,
        url_parameters: Parameters,
    },
    /// Body parameters combined with query string parameters.
    RequestCompositeParameters {
        body_parameters: Parameters,
        body_encoding: ParameterEncoding,
        url_parameters: Parameters,
    },
    /// Upload the contents of a file.
    UploadFile(PathBuf),
    /// A `multipart/form-data` upload.
    UploadMultipart(Vec<MultipartFormData>),
    /// A `multipart/form-data` upload combined with query string parameters.
    UploadCompositeMultipart(Vec<MultipartFormData>, Parameters),
    /// Download the body into a file.
    DownloadDestination(DownloadDestination),
    /// Download the body into a file, sending parameters with the given encoding.
    DownloadParameters {
        parameters: Parameters,
        encoding: ParameterEncoding,
        destination: DownloadDestination,
    },
}

impl Task {
    /// A JSON body task from any serializable value.
    pub fn json<T>(value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        Task::RequestJsonEncodable(Arc::new(value))
    }

    fn name(&self) -> &'static str {
        match self {
            Task::RequestPlain => "RequestPlain",
            Task::RequestData(_) => "RequestData",
            Task::RequestJsonEncodable(_) => "RequestJsonEncodable",
            Task::RequestParameters { .. } => "RequestParameters",
            Task::RequestCompositeData { .. } => "RequestCompositeData",
            Task::RequestCompositeParameters { .. } => "RequestCompositeParameters",
            Task::UploadFile(_) => "UploadFile",
            Task::UploadMultipart(_) => "UploadMultipart",
            Task::UploadCompositeMultipart(..) => "UploadCompositeMultipart",
            Task::DownloadDestination(_) => "DownloadDestination",
            Task::DownloadParameters { .. } => "DownloadParameters",
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::RequestData(data) => f.debug_tuple(self.name()).field(&data.len()).finish(),
            Task::RequestParameters {
                parameters,
                encoding,
            } => f
                .debug_struct(self.name())
                .field("parameters", parameters)
                .field("encoding", encoding)
                .finish(),
            Task::UploadFile(path) => f.debug_tuple(self.name()).field(path).finish(),
            Task::UploadMultipart(parts) | Task::UploadCompositeMultipart(parts, _) => {
                f.debug_tuple(self.name()).field(&parts.len()).finish()
            }
            Task::DownloadDestination(destination)
            | Task::DownloadParameters { destination, .. } => f
                .debug_tuple(self.name())
                .field(&destination.path())
                .finish(),
            _ => f.write_str(self.name()),
        }
    }
}

/// Method capabilities the dispatcher relies on.
pub trait MethodExt {
    /// Whether the method may carry a `multipart/form-data` body.
    fn supports_multipart(&self) -> bool;
}

impl MethodExt for Method {
    fn supports_multipart(&self) -> bool {
        matches!(
            *self,
            Method::POST | Method::PUT | Method::PATCH | Method::CONNECT
        )
    }
}
