//! Concrete, transport-neutral requests.
//!
//! [`Request`] is what an [`Endpoint`](crate::Endpoint) resolves into and what
//! plugins see and rewrite. It is deliberately plain (method, URL, headers and
//! an optional in-memory body) so that equality and hashing are well defined:
//! two endpoints deduplicate iff their resolved requests are equal.

use std::fmt::Write as _;
use std::hash::{Hash, Hasher};

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use url::Url;

/// A fully resolved HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Request {
    /// Creates a request without headers or body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Replaces the HTTP method.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// The absolute URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Mutable access to the URL, e.g. for query encoding.
    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    /// The header fields.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the header fields.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The in-memory body, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = Some(body.into());
    }

    /// Builder-style header insertion. Replaces existing values for `name`.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets `name` only when the request does not already carry it.
    pub fn set_default_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.entry(name).or_insert(value);
    }

    /// Renders the request as a cURL command line.
    ///
    /// `session_headers` are headers the transport adds on its own; they are
    /// included unless the request overrides them.
    pub fn curl_description(&self, session_headers: &HeaderMap) -> String {
        let mut out = String::from("$ curl -v");
        if self.method != Method::GET {
            let _ = write!(out, " \\\n\t-X {}", self.method);
        }
        for (name, value) in session_headers {
            if !self.headers.contains_key(name) {
                write_header(&mut out, name, value);
            }
        }
        for (name, value) in &self.headers {
            write_header(&mut out, name, value);
        }
        if let Some(body) = &self.body {
            let body = String::from_utf8_lossy(body);
            let _ = write!(out, " \\\n\t-d \"{}\"", body.replace('"', "\\\""));
        }
        let _ = write!(out, " \\\n\t\"{}\"", self.url);
        out
    }
}

fn write_header(out: &mut String, name: &HeaderName, value: &HeaderValue) {
    let value = String::from_utf8_lossy(value.as_bytes());
    let _ = write!(out, " \\\n\t-H \"{}: {}\"", name, value.replace('"', "\\\""));
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
            && self.url == other.url
            && self.headers == other.headers
            && self.body == other.body
    }
}

impl Eq for Request {}

impl Hash for Request {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.method.hash(state);
        self.url.hash(state);
        // HeaderMap equality ignores key order, so the hash must too.
        let mut headers: Vec<(&str, &[u8])> = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_bytes()))
            .collect();
        headers.sort_unstable();
        headers.hash(state);
        self.body.hash(state);
    }
}

/// The view of an outgoing request handed to plugins in `will_send`.
///
/// Transports implement this for whatever they wrap, so plugins never see
/// transport types.
pub trait RequestType: Send + Sync {
    /// The request that is about to be sent, if it could be built.
    fn request(&self) -> Option<&Request>;

    /// Headers the transport adds to every request of its session.
    fn session_headers(&self) -> HeaderMap {
        HeaderMap::new()
    }

    /// cURL representation of the request, including session headers.
    fn curl_description(&self) -> String {
        match self.request() {
            Some(request) => request.curl_description(&self.session_headers()),
            None => "$ curl command could not be created".to_owned(),
        }
    }
}

/// A plain [`RequestType`] over an owned request.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    request: Option<Request>,
    session_headers: HeaderMap,
}

impl PreparedRequest {
    /// Wraps `request` with no session headers.
    pub fn new(request: Request) -> Self {
        Self {
            request: Some(request),
            session_headers: HeaderMap::new(),
        }
    }

    /// Attaches the transport's session headers.
    pub fn with_session_headers(mut self, headers: HeaderMap) -> Self {
        self.session_headers = headers;
        self
    }
}

impl RequestType for PreparedRequest {
    fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    fn session_headers(&self) -> HeaderMap {
        self.session_headers.clone()
    }
}
