use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why a reqwest transport attempt failed.
///
/// Reported to the provider as the underlying error of
/// [`courier_core::Error::Underlying`].
#[derive(Debug, Error)]
pub enum SendError {
    /// `send` was called outside a tokio runtime and no handle was configured.
    #[error("no tokio runtime available to drive the request")]
    NoRuntime,

    /// The middleware stack or the client failed.
    #[error(transparent)]
    Middleware(#[from] reqwest_middleware::Error),

    /// Reading the response body failed.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    /// The multipart body could not be assembled.
    #[error("failed to encode multipart body: {0}")]
    Multipart(#[source] io::Error),

    /// A file to upload or a download destination could not be used.
    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SendError {
    pub(crate) fn file(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| SendError::File { path, source }
    }
}
