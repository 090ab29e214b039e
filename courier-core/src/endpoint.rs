//! Resolved targets.
//!
//! An [`Endpoint`] is the intermediate form between a [`Target`](crate::Target)
//! and a concrete [`Request`]. Providers build one per call through their
//! endpoint closure, may resolve it with [`Endpoint::url_request`], and key
//! in-flight deduplication on it.
//!
//! Equality and hashing are defined by the resolved request: two endpoints are
//! equal iff their requests are equal, or, when neither resolves, iff their
//! URLs match.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, Method};
use url::Url;

use crate::encoding::{EncodingError, ParameterEncoding, Parameters, UrlEncoding};
use crate::error::{BoxError, Error};
use crate::request::Request;
use crate::response::HttpResponse;
use crate::task::Task;

/// Canned outcome used when a request is stubbed.
#[derive(Debug, Clone)]
pub enum SampleResponse {
    /// A status code and body.
    NetworkResponse(u16, Bytes),
    /// Full response metadata and a body.
    Response(HttpResponse, Bytes),
    /// A failure as if the network had produced it.
    NetworkError(BoxError),
}

/// Produces a sample response on demand.
pub type SampleResponseClosure = Arc<dyn Fn() -> SampleResponse + Send + Sync>;

/// A resolved, immutable description of one request.
#[derive(Clone)]
pub struct Endpoint {
    url: String,
    sample_response_closure: SampleResponseClosure,
    method: Method,
    task: Task,
    http_header_fields: Option<HeaderMap>,
}

impl Endpoint {
    pub fn new<F>(
        url: impl Into<String>,
        sample_response_closure: F,
        method: Method,
        task: Task,
        http_header_fields: Option<HeaderMap>,
    ) -> Self
    where
        F: Fn() -> SampleResponse + Send + Sync + 'static,
    {
        Self {
            url: url.into(),
            sample_response_closure: Arc::new(sample_response_closure),
            method,
            task,
            http_header_fields,
        }
    }

    /// The absolute URL, exactly as built from the target.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn http_header_fields(&self) -> Option<&HeaderMap> {
        self.http_header_fields.as_ref()
    }

    /// Evaluates the sample response closure.
    pub fn sample_response(&self) -> SampleResponse {
        (self.sample_response_closure)()
    }

    /// A copy of this endpoint with `headers` merged in. New values win.
    pub fn adding(&self, headers: HeaderMap) -> Endpoint {
        let http_header_fields = if headers.is_empty() {
            self.http_header_fields.clone()
        } else {
            let mut merged = self.http_header_fields.clone().unwrap_or_default();
            for name in headers.keys() {
                merged.remove(name);
            }
            for (name, value) in &headers {
                merged.append(name, value.clone());
            }
            Some(merged)
        };
        Endpoint {
            http_header_fields,
            ..self.clone()
        }
    }

    /// A copy of this endpoint with a different task.
    pub fn replacing(&self, task: Task) -> Endpoint {
        Endpoint {
            task,
            ..self.clone()
        }
    }

    /// Builds the concrete request: URL, method, headers, then the task's
    /// body and query parameters.
    pub fn url_request(&self) -> Result<Request, Error> {
        let url = Url::parse(&self.url).map_err(|_| Error::RequestMapping(self.url.clone()))?;
        let mut request = Request::new(self.method.clone(), url);
        if let Some(headers) = &self.http_header_fields {
            *request.headers_mut() = headers.clone();
        }

        match &self.task {
            Task::RequestPlain
            | Task::UploadFile(_)
            | Task::UploadMultipart(_)
            | Task::DownloadDestination(_) => Ok(request),
            Task::RequestData(data) => {
                request.set_body(data.clone());
                Ok(request)
            }
            Task::RequestJsonEncodable(encodable) => {
                let body = encodable
                    .encode_json()
                    .map_err(|error| Error::EncodableMapping(Arc::new(error)))?;
                request.set_default_header(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                request.set_body(body);
                Ok(request)
            }
            Task::RequestParameters {
                parameters,
                encoding,
            }
            | Task::DownloadParameters {
                parameters,
                encoding,
                ..
            } => encode(encoding, request, parameters),
            Task::RequestCompositeData {
                body_data,
                url_parameters,
            } => {
                request.set_body(body_data.clone());
                encode_query(request, url_parameters)
            }
            Task::RequestCompositeParameters {
                body_parameters,
                body_encoding,
                url_parameters,
            } => {
                if !body_encoding.targets_body() {
                    return Err(parameter_encoding(EncodingError::BodyEncodingRequired));
                }
                let request = encode(body_encoding, request, body_parameters)?;
                encode_query(request, url_parameters)
            }
            Task::UploadCompositeMultipart(_, url_parameters) => {
                encode_query(request, url_parameters)
            }
        }
    }
}

fn parameter_encoding(error: EncodingError) -> Error {
    Error::ParameterEncoding(Arc::new(error))
}

fn encode(
    encoding: &ParameterEncoding,
    request: Request,
    parameters: &Parameters,
) -> Result<Request, Error> {
    encoding
        .encode(request, parameters)
        .map_err(parameter_encoding)
}

fn encode_query(request: Request, parameters: &Parameters) -> Result<Request, Error> {
    encode(
        &ParameterEncoding::Url(UrlEncoding::query_string()),
        request,
        parameters,
    )
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        match (self.url_request(), other.url_request()) {
            (Ok(lhs), Ok(rhs)) => lhs == rhs,
            (Err(_), Err(_)) => self.url == other.url,
            _ => false,
        }
    }
}

impl Eq for Endpoint {}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.url_request() {
            Ok(request) => request.hash(state),
            Err(_) => self.url.hash(state),
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("task", &self.task)
            .field("http_header_fields", &self.http_header_fields)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use http::header::{ACCEPT, AUTHORIZATION};
    use serde_json::json;

    use super::*;
    use crate::encoding::JsonEncoding;

    fn endpoint(url: &str, method: Method, task: Task) -> Endpoint {
        Endpoint::new(
            url,
            || SampleResponse::NetworkResponse(200, Bytes::new()),
            method,
            task,
            None,
        )
    }

    fn params(value: serde_json::Value) -> Parameters {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!("test parameters must be an object"),
        }
    }

    #[test]
    fn unparsable_url_is_a_request_mapping_error() {
        let endpoint = endpoint("not a url", Method::GET, Task::RequestPlain);
        assert_eq!(
            endpoint.url_request().unwrap_err(),
            Error::RequestMapping("not a url".to_owned())
        );
    }

    #[test]
    fn adding_merges_headers_with_new_values_winning() {
        let mut initial = HeaderMap::new();
        initial.insert(ACCEPT, HeaderValue::from_static("text/plain"));
        initial.insert(AUTHORIZATION, HeaderValue::from_static("old"));
        let base = Endpoint::new(
            "https://api.example.com",
            || SampleResponse::NetworkResponse(200, Bytes::new()),
            Method::GET,
            Task::RequestPlain,
            Some(initial),
        );

        let mut extra = HeaderMap::new();
        extra.insert(AUTHORIZATION, HeaderValue::from_static("new"));
        let added = base.adding(extra);

        let headers = added.http_header_fields().unwrap();
        assert_eq!(headers[ACCEPT], "text/plain");
        assert_eq!(headers[AUTHORIZATION], "new");
        assert_eq!(base.http_header_fields().unwrap()[AUTHORIZATION], "old");
    }

    #[test]
    fn replacing_swaps_the_task_only() {
        let base = endpoint("https://api.example.com/a", Method::POST, Task::RequestPlain);
        let replaced = base.replacing(Task::RequestData(Bytes::from_static(b"x")));
        assert_eq!(replaced.url(), base.url());
        assert_eq!(
            replaced.url_request().unwrap().body().unwrap().as_ref(),
            b"x"
        );
        assert!(base.url_request().unwrap().body().is_none());
    }

    #[test]
    fn json_encodable_sets_content_type() {
        let endpoint = endpoint(
            "https://api.example.com/users",
            Method::POST,
            Task::json(json!({"name": "ferris"})),
        );
        let request = endpoint.url_request().unwrap();
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(request.body().unwrap().as_ref(), br#"{"name":"ferris"}"#);
    }

    #[test]
    fn composite_parameters_split_body_and_query() {
        let endpoint = endpoint(
            "https://api.example.com/users",
            Method::POST,
            Task::RequestCompositeParameters {
                body_parameters: params(json!({"name": "ferris"})),
                body_encoding: ParameterEncoding::Json(JsonEncoding::default()),
                url_parameters: params(json!({"dry_run": true})),
            },
        );
        let request = endpoint.url_request().unwrap();
        assert_eq!(request.url().query(), Some("dry_run=1"));
        assert_eq!(request.body().unwrap().as_ref(), br#"{"name":"ferris"}"#);
    }

    #[test]
    fn composite_parameters_reject_query_body_encoding() {
        let endpoint = endpoint(
            "https://api.example.com/users",
            Method::POST,
            Task::RequestCompositeParameters {
                body_parameters: params(json!({"name": "ferris"})),
                body_encoding: ParameterEncoding::Url(UrlEncoding::query_string()),
                url_parameters: Parameters::new(),
            },
        );
        assert!(matches!(
            endpoint.url_request(),
            Err(Error::ParameterEncoding(_))
        ));
    }

    #[test]
    fn composite_data_keeps_raw_body() {
        let endpoint = endpoint(
            "https://api.example.com/upload",
            Method::PUT,
            Task::RequestCompositeData {
                body_data: Bytes::from_static(b"raw"),
                url_parameters: params(json!({"v": 2})),
            },
        );
        let request = endpoint.url_request().unwrap();
        assert_eq!(request.url().query(), Some("v=2"));
        assert_eq!(request.body().unwrap().as_ref(), b"raw");
    }

    #[test]
    fn equality_follows_the_resolved_request() {
        let a = endpoint("https://api.example.com/zen", Method::GET, Task::RequestPlain);
        let b = endpoint("https://api.example.com/zen", Method::GET, Task::RequestPlain);
        let c = endpoint("https://api.example.com/zen", Method::POST, Task::RequestPlain);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<Endpoint> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn unresolvable_endpoints_compare_by_url() {
        let a = endpoint("::bad", Method::GET, Task::RequestPlain);
        let b = endpoint("::bad", Method::POST, Task::RequestPlain);
        let resolvable = endpoint("https://api.example.com", Method::GET, Task::RequestPlain);
        assert_eq!(a, b);
        assert_ne!(a, resolvable);
    }
}
