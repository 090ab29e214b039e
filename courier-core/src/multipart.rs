//! `multipart/form-data` bodies.

use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

type OpenStream = dyn Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync;

/// A re-openable stream of known length.
///
/// Targets may be dispatched more than once, so the stream is described by a
/// factory that opens a fresh reader for every encoding.
#[derive(Clone)]
pub struct StreamSource {
    open: Arc<OpenStream>,
    length: u64,
}

impl StreamSource {
    pub fn new<F>(length: u64, open: F) -> Self
    where
        F: Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync + 'static,
    {
        Self {
            open: Arc::new(open),
            length,
        }
    }

    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Where the bytes of a form part come from.
#[derive(Debug, Clone)]
pub enum FormDataProvider {
    Data(Bytes),
    File(PathBuf),
    Stream(StreamSource),
}

/// One part of a multipart body.
#[derive(Debug, Clone)]
pub struct MultipartFormData {
    provider: FormDataProvider,
    name: String,
    file_name: Option<String>,
    mime_type: Option<String>,
}

impl MultipartFormData {
    pub fn new(provider: FormDataProvider, name: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
            file_name: None,
            mime_type: None,
        }
    }

    /// A part holding in-memory data.
    pub fn data(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::new(FormDataProvider::Data(data.into()), name)
    }

    /// A part read from a file when the body is encoded.
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(FormDataProvider::File(path.into()), name)
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn provider(&self) -> &FormDataProvider {
        &self.provider
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }
}

const DEFAULT_FILE_MIME_TYPE: &str = "application/octet-stream";

/// Encodes form parts into a single body.
///
/// Encoding reads files and streams synchronously; async callers should run
/// it on a blocking thread.
#[derive(Debug, Clone)]
pub struct MultipartEncoder {
    boundary: String,
}

impl MultipartEncoder {
    /// An encoder with a random boundary.
    pub fn new() -> Self {
        Self::with_boundary(format!(
            "courier.boundary.{:016x}{:016x}",
            rand::random::<u64>(),
            rand::random::<u64>()
        ))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// The `Content-Type` header value for bodies from this encoder.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn encode(&self, parts: &[MultipartFormData]) -> io::Result<Bytes> {
        let mut body = BytesMut::new();
        for part in parts {
            body.put_slice(format!("--{}\r\n", self.boundary).as_bytes());
            match &part.provider {
                FormDataProvider::Data(data) => {
                    write_headers(
                        &mut body,
                        part,
                        part.file_name.as_deref(),
                        part.mime_type.as_deref(),
                    );
                    body.put_slice(data);
                }
                FormDataProvider::File(path) => {
                    let file_name = part.file_name.clone().or_else(|| {
                        path.file_name()
                            .map(|name| name.to_string_lossy().into_owned())
                    });
                    let mime_type = part.mime_type.as_deref().unwrap_or(DEFAULT_FILE_MIME_TYPE);
                    write_headers(&mut body, part, file_name.as_deref(), Some(mime_type));
                    body.put_slice(&fs::read(path)?);
                }
                FormDataProvider::Stream(source) => {
                    write_headers(
                        &mut body,
                        part,
                        part.file_name.as_deref(),
                        part.mime_type.as_deref(),
                    );
                    let mut buffer = Vec::new();
                    (source.open)()?.take(source.length).read_to_end(&mut buffer)?;
                    if (buffer.len() as u64) < source.length {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!(
                                "stream for part {:?} ended after {} of {} bytes",
                                part.name,
                                buffer.len(),
                                source.length
                            ),
                        ));
                    }
                    body.put_slice(&buffer);
                }
            }
            body.put_slice(b"\r\n");
        }
        body.put_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Ok(body.freeze())
    }
}

impl Default for MultipartEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn write_headers(
    body: &mut BytesMut,
    part: &MultipartFormData,
    file_name: Option<&str>,
    mime_type: Option<&str>,
) {
    let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
    if let Some(file_name) = file_name {
        disposition.push_str(&format!("; filename=\"{file_name}\""));
    }
    body.put_slice(disposition.as_bytes());
    body.put_slice(b"\r\n");
    if let Some(mime_type) = mime_type {
        body.put_slice(format!("Content-Type: {mime_type}\r\n").as_bytes());
    }
    body.put_slice(b"\r\n");
}
