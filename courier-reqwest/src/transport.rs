//! A [`Transport`] over reqwest-middleware.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use courier_core::{
    Cancellable, CancellableToken, DownloadDestination, HeaderMap, HttpResponse,
    MultipartEncoder, MultipartFormData, PreparedRequest, Progress, ProgressSink, Request,
    RequestInterceptor, RequestType, RetryDecision, SimpleCancellable, Transport,
    TransportCompletion, TransportOutput, TransportTask,
};
use futures::StreamExt;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use reqwest_middleware::ClientWithMiddleware;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{Instrument, debug, info_span, warn};

use crate::error::SendError;
use crate::request::{from_reqwest, to_reqwest};

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Sends courier requests with a reqwest client.
///
/// Every request runs as its own task on a tokio runtime: the one given with
/// [`with_handle`](ReqwestTransport::with_handle), or the runtime current at
/// the time of the call.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: ClientWithMiddleware,
    handle: Option<Handle>,
    session_headers: HeaderMap,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self::from(ClientWithMiddleware::from(client))
    }

    /// Runs requests on `handle` instead of the caller's runtime.
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Headers the client adds to every request, shown to plugins in
    /// [`RequestType::session_headers`].
    pub fn with_session_headers(mut self, headers: HeaderMap) -> Self {
        self.session_headers = headers;
        self
    }

    pub fn client(&self) -> &ClientWithMiddleware {
        &self.client
    }
}

impl From<reqwest::Client> for ReqwestTransport {
    fn from(client: reqwest::Client) -> Self {
        Self::new(client)
    }
}

impl From<ClientWithMiddleware> for ReqwestTransport {
    fn from(client: ClientWithMiddleware) -> Self {
        Self {
            client,
            handle: None,
            session_headers: HeaderMap::new(),
        }
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        task: TransportTask,
        interceptor: RequestInterceptor,
        progress: Option<ProgressSink>,
        completion: TransportCompletion,
    ) -> Arc<dyn Cancellable> {
        let Some(handle) = self.handle.clone().or_else(|| Handle::try_current().ok()) else {
            warn!(url = %task.request().url(), "no tokio runtime, request not sent");
            let request = task.request().clone();
            completion.complete(TransportOutput::failure(Some(request), SendError::NoRuntime));
            return Arc::new(SimpleCancellable::new());
        };

        let span = info_span!(
            "courier_request",
            kind = task.kind(),
            method = %task.request().method(),
            url = %task.request().url(),
        );
        let cancelled = Arc::new(Notify::new());
        let exchange = Exchange {
            client: self.client.clone(),
            session_headers: self.session_headers.clone(),
            interceptor,
            progress,
        };
        handle.spawn({
            let cancelled = cancelled.clone();
            async move {
                let original = task.request().clone();
                let output = tokio::select! {
                    biased;
                    _ = cancelled.notified() => {
                        debug!("request cancelled");
                        TransportOutput::cancelled(Some(original))
                    }
                    output = exchange.run(&task) => output,
                };
                completion.complete(output);
            }
            .instrument(span)
        });

        // `notify_one` keeps a permit, so a cancel racing the task start still
        // wins.
        Arc::new(CancellableToken::new(move || cancelled.notify_one()))
    }

    fn unsent(&self, request: Request) -> Box<dyn RequestType> {
        Box::new(PreparedRequest::new(request).with_session_headers(self.session_headers.clone()))
    }
}

/// Everything one request needs, moved into its task.
struct Exchange {
    client: ClientWithMiddleware,
    session_headers: HeaderMap,
    interceptor: RequestInterceptor,
    progress: Option<ProgressSink>,
}

/// A failed attempt, with the response head if one arrived.
struct Failure {
    error: SendError,
    response: Option<HttpResponse>,
}

impl From<SendError> for Failure {
    fn from(error: SendError) -> Self {
        Failure {
            error,
            response: None,
        }
    }
}

impl From<reqwest_middleware::Error> for Failure {
    fn from(error: reqwest_middleware::Error) -> Self {
        SendError::from(error).into()
    }
}

impl Exchange {
    /// Sends `task`, retrying for as long as the interceptor asks to.
    async fn run(&self, task: &TransportTask) -> TransportOutput {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = self.interceptor.adapt(task.request().clone());
            self.interceptor.will_send(
                &PreparedRequest::new(request.clone())
                    .with_session_headers(self.session_headers.clone()),
            );

            let failure = match self.attempt(task, &request).await {
                Ok((response, data)) => {
                    return TransportOutput {
                        response: Some(response),
                        request: Some(request),
                        data,
                        error: None,
                    };
                }
                Err(failure) => failure,
            };

            match self.interceptor.retry(&request, &failure.error, attempt) {
                RetryDecision::DoNotRetry => {
                    debug!(attempt, error = %failure.error, "request failed");
                    return TransportOutput {
                        response: failure.response,
                        request: Some(request),
                        data: None,
                        error: Some(Arc::new(failure.error)),
                    };
                }
                RetryDecision::Retry => {
                    debug!(attempt, error = %failure.error, "retrying request");
                }
                RetryDecision::RetryAfter(delay) => {
                    debug!(attempt, ?delay, error = %failure.error, "retrying request after delay");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        task: &TransportTask,
        request: &Request,
    ) -> Result<(HttpResponse, Option<Bytes>), Failure> {
        let outgoing = match task {
            TransportTask::Data(_) | TransportTask::Download { .. } => to_reqwest(request, true),
            TransportTask::UploadFile { file, .. } => {
                let data = tokio::fs::read(file).await.map_err(SendError::file(file))?;
                self.upload(request, Bytes::from(data), None)
            }
            TransportTask::UploadMultipart { parts, .. } => {
                let (data, content_type) = encode_multipart(parts.clone()).await?;
                self.upload(request, data, Some(content_type))
            }
        };

        let mut response = self.client.execute(outgoing).await?;
        let head = from_reqwest(&response);
        let total = response.content_length();
        let body = match task {
            TransportTask::Data(_) => read_body(&mut response, self.progress.as_ref(), total)
                .await
                .map(Some),
            TransportTask::UploadFile { .. } | TransportTask::UploadMultipart { .. } => {
                read_body(&mut response, None, total).await.map(Some)
            }
            TransportTask::Download { destination, .. } => {
                download(&mut response, destination, self.progress.as_ref(), total)
                    .await
                    .map(|()| None)
            }
        };
        match body {
            Ok(data) => Ok((head, data)),
            Err(error) => Err(Failure {
                error,
                response: Some(head),
            }),
        }
    }

    /// A request whose body streams `data` in chunks, reporting upload
    /// progress.
    fn upload(
        &self,
        request: &Request,
        data: Bytes,
        content_type: Option<String>,
    ) -> reqwest::Request {
        let mut outgoing = to_reqwest(request, false);
        let headers = outgoing.headers_mut();
        headers.insert(CONTENT_LENGTH, HeaderValue::from(data.len() as u64));
        if let Some(content_type) = content_type
            && let Ok(value) = HeaderValue::from_str(&content_type)
        {
            headers.insert(CONTENT_TYPE, value);
        }
        *outgoing.body_mut() = Some(upload_body(data, self.progress.clone()));
        outgoing
    }
}

fn upload_body(data: Bytes, progress: Option<ProgressSink>) -> reqwest::Body {
    let total = data.len() as u64;
    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| data.slice(start..data.len().min(start + UPLOAD_CHUNK_SIZE)))
        .collect();
    let mut sent = 0;
    let stream = futures::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len() as u64;
        if let Some(progress) = &progress {
            progress(Progress::new(sent, Some(total)));
        }
        Ok::<_, io::Error>(chunk)
    });
    reqwest::Body::wrap_stream(stream)
}

/// Encodes `parts` off the runtime threads, since files are read synchronously.
async fn encode_multipart(parts: Vec<MultipartFormData>) -> Result<(Bytes, String), SendError> {
    let encoder = MultipartEncoder::new();
    let content_type = encoder.content_type();
    let data = tokio::task::spawn_blocking(move || encoder.encode(&parts))
        .await
        .map_err(|error| SendError::Multipart(io::Error::other(error)))?
        .map_err(SendError::Multipart)?;
    Ok((data, content_type))
}

async fn read_body(
    response: &mut reqwest::Response,
    progress: Option<&ProgressSink>,
    total: Option<u64>,
) -> Result<Bytes, SendError> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        body.extend_from_slice(&chunk);
        if let Some(progress) = progress {
            progress(Progress::new(body.len() as u64, total));
        }
    }
    Ok(Bytes::from(body))
}

async fn download(
    response: &mut reqwest::Response,
    destination: &DownloadDestination,
    progress: Option<&ProgressSink>,
    total: Option<u64>,
) -> Result<(), SendError> {
    let path = destination.path();
    let options = destination.options();
    if options.create_intermediate_directories
        && let Some(parent) = path.parent()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(SendError::file(parent))?;
    }
    if options.remove_previous_file {
        match tokio::fs::remove_file(path).await {
            Err(error) if error.kind() != io::ErrorKind::NotFound => {
                return Err(SendError::file(path)(error));
            }
            _ => {}
        }
    }

    if tokio::fs::try_exists(path)
        .await
        .map_err(SendError::file(path))?
    {
        return Err(SendError::file(path)(io::ErrorKind::AlreadyExists.into()));
    }

    let mut partial = PartialFile::new(path);
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&partial.path)
        .await
        .map_err(SendError::file(&partial.path))?;
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk)
            .await
            .map_err(SendError::file(&partial.path))?;
        written += chunk.len() as u64;
        if let Some(progress) = progress {
            progress(Progress::new(written, total));
        }
    }
    file.flush().await.map_err(SendError::file(&partial.path))?;
    drop(file);
    tokio::fs::rename(&partial.path, path)
        .await
        .map_err(SendError::file(path))?;
    partial.keep();
    debug!(path = %path.display(), bytes = written, "download written");
    Ok(())
}

/// A download in progress, written next to its destination.
///
/// Removed on drop unless it was moved into place, so failed or cancelled
/// downloads leave nothing behind.
struct PartialFile {
    path: PathBuf,
    kept: bool,
}

impl PartialFile {
    fn new(destination: &Path) -> Self {
        let mut name = destination
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(".part");
        Self {
            path: destination.with_file_name(name),
            kept: false,
        }
    }

    fn keep(&mut self) {
        self.kept = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.kept {
            return;
        }
        if let Err(error) = std::fs::remove_file(&self.path)
            && error.kind() != io::ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), %error, "failed to remove partial download");
        }
    }
}
