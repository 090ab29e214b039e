//! Normalized responses and the helpers that filter or decode them.

use std::fmt;
use std::ops::RangeBounds;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::Error;
use crate::request::Request;

/// Response metadata as reported by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    url: Option<Url>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            status,
            headers,
            url: None,
        }
    }

    /// Records the final URL the response was served from.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }
}

/// The response to a provider request.
///
/// Carries the status code and raw body, plus (when available) the request
/// that produced it and the transport's response metadata. Cloning is cheap:
/// the body is reference counted.
#[derive(Clone)]
pub struct Response {
    status_code: u16,
    data: Bytes,
    request: Option<Request>,
    response: Option<HttpResponse>,
}

impl Response {
    /// Creates a response with just a status code and body.
    pub fn new(status_code: u16, data: impl Into<Bytes>) -> Self {
        Self {
            status_code,
            data: data.into(),
            request: None,
            response: None,
        }
    }

    /// Attaches the originating request.
    pub fn with_request(mut self, request: Option<Request>) -> Self {
        self.request = request;
        self
    }

    /// Attaches the transport's response metadata.
    pub fn with_response(mut self, response: Option<HttpResponse>) -> Self {
        self.response = response;
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        self.response.as_ref()
    }

    /// Returns the response if its status code falls within `status_codes`.
    ///
    /// Fails with [`Error::StatusCode`] otherwise.
    pub fn filter<R: RangeBounds<u16>>(self, status_codes: R) -> Result<Self, Error> {
        if status_codes.contains(&self.status_code) {
            Ok(self)
        } else {
            Err(Error::StatusCode(self))
        }
    }

    /// Returns the response if it has exactly `status_code`.
    pub fn filter_status_code(self, status_code: u16) -> Result<Self, Error> {
        self.filter(status_code..=status_code)
    }

    /// Returns the response if its status code is in 200..=299.
    pub fn filter_successful_status_codes(self) -> Result<Self, Error> {
        self.filter(200..=299)
    }

    /// Returns the response if its status code is in 200..=399.
    pub fn filter_successful_status_and_redirect_codes(self) -> Result<Self, Error> {
        self.filter(200..=399)
    }

    /// Decodes the body as a JSON value.
    ///
    /// An empty body maps to `null` when `fails_on_empty_data` is false.
    pub fn map_json(&self, fails_on_empty_data: bool) -> Result<Value, Error> {
        match serde_json::from_slice(&self.data) {
            Ok(value) => Ok(value),
            Err(_) if self.data.is_empty() && !fails_on_empty_data => Ok(Value::Null),
            Err(_) => Err(Error::JsonMapping(self.clone())),
        }
    }

    /// Decodes the body as UTF-8, or extracts a string at a dotted JSON key path.
    pub fn map_string(&self, key_path: Option<&str>) -> Result<String, Error> {
        match key_path {
            Some(key_path) => {
                let json = self.map_json(true)?;
                lookup(&json, key_path)
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| Error::StringMapping(self.clone()))
            }
            None => std::str::from_utf8(&self.data)
                .map(str::to_owned)
                .map_err(|_| Error::StringMapping(self.clone())),
        }
    }

    /// Deserializes the body, or the value at a dotted JSON key path, into `D`.
    pub fn map<D: DeserializeOwned>(&self, key_path: Option<&str>) -> Result<D, Error> {
        let object_mapping =
            |error: serde_json::Error| Error::ObjectMapping(Arc::new(error), self.clone());
        match key_path {
            Some(key_path) => {
                let json = self.map_json(true)?;
                let value = lookup(&json, key_path)
                    .cloned()
                    .ok_or_else(|| Error::JsonMapping(self.clone()))?;
                serde_json::from_value(value).map_err(object_mapping)
            }
            None => serde_json::from_slice(&self.data).map_err(object_mapping),
        }
    }
}

fn lookup<'a>(json: &'a Value, key_path: &str) -> Option<&'a Value> {
    key_path
        .split('.')
        .try_fold(json, |value, key| value.as_object()?.get(key))
}

impl PartialEq for Response {
    fn eq(&self, other: &Self) -> bool {
        self.status_code == other.status_code
            && self.data == other.data
            && self.response == other.response
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Status Code: {}, Data Length: {}",
            self.status_code,
            self.data.len()
        )
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    fn json(body: &'static str) -> Response {
        Response::new(200, Bytes::from_static(body.as_bytes()))
    }

    #[test]
    fn filters_by_status_code() {
        assert!(Response::new(204, Bytes::new()).filter_successful_status_codes().is_ok());
        assert!(Response::new(302, Bytes::new()).filter_successful_status_codes().is_err());
        assert!(
            Response::new(302, Bytes::new())
                .filter_successful_status_and_redirect_codes()
                .is_ok()
        );

        let error = Response::new(404, Bytes::new())
            .filter_status_code(200)
            .unwrap_err();
        assert_eq!(error, Error::StatusCode(Response::new(404, Bytes::new())));
    }

    #[test]
    fn empty_body_maps_to_null_only_when_allowed() {
        let empty = Response::new(204, Bytes::new());
        assert_eq!(empty.map_json(false).unwrap(), Value::Null);
        assert_eq!(empty.map_json(true).unwrap_err(), Error::JsonMapping(empty));
    }

    #[test]
    fn maps_string_at_key_path() {
        let response = json(r#"{"user": {"login": "octocat"}}"#);
        assert_eq!(
            response.map_string(Some("user.login")).unwrap(),
            "octocat"
        );
        assert!(matches!(
            response.map_string(Some("user.missing")),
            Err(Error::StringMapping(_))
        ));
    }

    #[test]
    fn maps_typed_objects() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct User {
            login: String,
        }

        let response = json(r#"{"user": {"login": "octocat"}}"#);
        let user: User = response.map(Some("user")).unwrap();
        assert_eq!(user.login, "octocat");

        let error = response.map::<User>(None).unwrap_err();
        assert!(matches!(error, Error::ObjectMapping(_, _)));
    }

    #[test]
    fn equality_ignores_echoed_request() {
        let request = Request::new(
            http::Method::GET,
            Url::parse("https://api.example.com").unwrap(),
        );
        let a = json("hello").with_request(Some(request));
        let b = json("hello");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Status Code: 200, Data Length: 5");
    }
}
