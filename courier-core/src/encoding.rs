//! Parameter encodings.
//!
//! Parameters are a JSON object. [`ParameterEncoding::Url`] renders them as a
//! query string (or a form body), [`ParameterEncoding::Json`] as a JSON body.
//!
//! URL encoding flattens nested values:
//!
//! - objects become `key[nested]=value`
//! - arrays become `key[]=value` (or `key=value` with [`ArrayEncoding::NoBrackets`])
//! - booleans become `1`/`0` (or `true`/`false` with [`BoolEncoding::Literal`])
//! - `null` becomes a bare `key`
//!
//! Keys are sorted so the same parameters always produce the same request.

use http::Method;
use http::header::{CONTENT_TYPE, HeaderValue};
use serde_json::{Map, Value};
use thiserror::Error;
use url::form_urlencoded;

use crate::request::Request;

/// A bag of request parameters.
pub type Parameters = Map<String, Value>;

/// Where URL-encoded parameters go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlDestination {
    /// Query string for `GET`, `HEAD` and `DELETE`, body otherwise.
    #[default]
    MethodDependent,
    /// Always the query string.
    QueryString,
    /// Always the body.
    HttpBody,
}

/// How array values are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayEncoding {
    #[default]
    Brackets,
    NoBrackets,
}

/// How boolean values are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoolEncoding {
    #[default]
    Numeric,
    Literal,
}

/// Form/query string encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UrlEncoding {
    pub destination: UrlDestination,
    pub array_encoding: ArrayEncoding,
    pub bool_encoding: BoolEncoding,
}

impl UrlEncoding {
    /// Encoding that always targets the query string.
    pub fn query_string() -> Self {
        Self {
            destination: UrlDestination::QueryString,
            ..Self::default()
        }
    }

    /// Encoding that always targets the body.
    pub fn http_body() -> Self {
        Self {
            destination: UrlDestination::HttpBody,
            ..Self::default()
        }
    }

    fn encodes_in_url(&self, method: &Method) -> bool {
        match self.destination {
            UrlDestination::MethodDependent => {
                matches!(*method, Method::GET | Method::HEAD | Method::DELETE)
            }
            UrlDestination::QueryString => true,
            UrlDestination::HttpBody => false,
        }
    }

    /// Renders `parameters` as a percent-encoded query string.
    pub fn query(&self, parameters: &Parameters) -> String {
        let mut components = Vec::new();
        let mut keys: Vec<&String> = parameters.keys().collect();
        keys.sort();
        for key in keys {
            self.components(key, &parameters[key.as_str()], &mut components);
        }
        components
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => format!("{}={}", escape(&key), escape(&value)),
                None => escape(&key),
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    fn components(&self, key: &str, value: &Value, out: &mut Vec<(String, Option<String>)>) {
        match value {
            Value::Object(map) => {
                let mut nested: Vec<(&String, &Value)> = map.iter().collect();
                nested.sort_by(|a, b| a.0.cmp(b.0));
                for (nested_key, value) in nested {
                    self.components(&format!("{key}[{nested_key}]"), value, out);
                }
            }
            Value::Array(values) => {
                let key = match self.array_encoding {
                    ArrayEncoding::Brackets => format!("{key}[]"),
                    ArrayEncoding::NoBrackets => key.to_owned(),
                };
                for value in values {
                    self.components(&key, value, out);
                }
            }
            Value::Bool(flag) => {
                let rendered = match (self.bool_encoding, flag) {
                    (BoolEncoding::Numeric, true) => "1",
                    (BoolEncoding::Numeric, false) => "0",
                    (BoolEncoding::Literal, true) => "true",
                    (BoolEncoding::Literal, false) => "false",
                };
                out.push((key.to_owned(), Some(rendered.to_owned())));
            }
            Value::Number(number) => out.push((key.to_owned(), Some(number.to_string()))),
            Value::String(string) => out.push((key.to_owned(), Some(string.clone()))),
            Value::Null => out.push((key.to_owned(), None)),
        }
    }

    fn encode(&self, mut request: Request, parameters: &Parameters) -> Request {
        let query = self.query(parameters);
        if self.encodes_in_url(request.method()) {
            if !query.is_empty() {
                let merged = match request.url().query() {
                    Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
                    _ => query,
                };
                request.url_mut().set_query(Some(&merged));
            }
        } else {
            request.set_default_header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded; charset=utf-8"),
            );
            request.set_body(query);
        }
        request
    }
}

fn escape(component: &str) -> String {
    form_urlencoded::byte_serialize(component.as_bytes()).collect()
}

/// JSON body encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonEncoding {
    pub pretty: bool,
}

impl JsonEncoding {
    fn encode(
        &self,
        mut request: Request,
        parameters: &Parameters,
    ) -> Result<Request, EncodingError> {
        let body = if self.pretty {
            serde_json::to_vec_pretty(parameters)?
        } else {
            serde_json::to_vec(parameters)?
        };
        request.set_default_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        request.set_body(body);
        Ok(request)
    }
}

/// How parameters are written into a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterEncoding {
    Url(UrlEncoding),
    Json(JsonEncoding),
}

impl ParameterEncoding {
    /// Method-dependent URL encoding.
    pub fn url() -> Self {
        ParameterEncoding::Url(UrlEncoding::default())
    }

    /// Compact JSON encoding.
    pub fn json() -> Self {
        ParameterEncoding::Json(JsonEncoding::default())
    }

    /// Whether this encoding writes into the body for every method.
    pub fn targets_body(&self) -> bool {
        match self {
            ParameterEncoding::Url(encoding) => encoding.destination == UrlDestination::HttpBody,
            ParameterEncoding::Json(_) => true,
        }
    }

    /// Writes `parameters` into `request`.
    pub fn encode(
        &self,
        request: Request,
        parameters: &Parameters,
    ) -> Result<Request, EncodingError> {
        match self {
            ParameterEncoding::Url(encoding) => Ok(encoding.encode(request, parameters)),
            ParameterEncoding::Json(encoding) => encoding.encode(request, parameters),
        }
    }
}

impl Default for ParameterEncoding {
    fn default() -> Self {
        Self::url()
    }
}

/// Failure while encoding parameters.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("failed to serialize parameters as JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Composite tasks need a body encoding that never touches the URL.
    #[error("body parameters need an encoding that targets the HTTP body")]
    BodyEncodingRequired,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use url::Url;

    use super::*;

    fn params(value: Value) -> Parameters {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test parameters must be an object"),
        }
    }

    fn request(method: Method, url: &str) -> Request {
        Request::new(method, Url::parse(url).unwrap())
    }

    #[test]
    fn query_flattens_nested_values_in_key_order() {
        let query = UrlEncoding::default().query(&params(json!({
            "b": [1, 2],
            "a": {"y": true, "x": "hello world"},
            "c": null,
        })));
        assert_eq!(query, "a%5Bx%5D=hello+world&a%5By%5D=1&b%5B%5D=1&b%5B%5D=2&c");
    }

    #[test]
    fn alternative_array_and_bool_styles() {
        let encoding = UrlEncoding {
            array_encoding: ArrayEncoding::NoBrackets,
            bool_encoding: BoolEncoding::Literal,
            ..UrlEncoding::default()
        };
        let query = encoding.query(&params(json!({"tag": ["x", "y"], "on": false})));
        assert_eq!(query, "on=false&tag=x&tag=y");
    }

    #[test]
    fn method_dependent_encoding_appends_to_existing_query() {
        let encoded = ParameterEncoding::url()
            .encode(
                request(Method::GET, "https://api.example.com/search?page=2"),
                &params(json!({"q": "rust"})),
            )
            .unwrap();
        assert_eq!(encoded.url().query(), Some("page=2&q=rust"));
        assert!(encoded.body().is_none());
    }

    #[test]
    fn method_dependent_encoding_uses_body_for_post() {
        let encoded = ParameterEncoding::url()
            .encode(
                request(Method::POST, "https://api.example.com/login"),
                &params(json!({"user": "me"})),
            )
            .unwrap();
        assert_eq!(encoded.url().query(), None);
        assert_eq!(encoded.body().unwrap().as_ref(), b"user=me");
        assert_eq!(
            encoded.headers()[CONTENT_TYPE],
            "application/x-www-form-urlencoded; charset=utf-8"
        );
    }

    #[test]
    fn json_encoding_keeps_existing_content_type() {
        let base = request(Method::PUT, "https://api.example.com/item")
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/vnd.api+json"));
        let encoded = ParameterEncoding::json()
            .encode(base, &params(json!({"id": 7})))
            .unwrap();
        assert_eq!(encoded.body().unwrap().as_ref(), br#"{"id":7}"#);
        assert_eq!(encoded.headers()[CONTENT_TYPE], "application/vnd.api+json");
    }
}
