//! Declarative client settings for [`ReqwestTransport`].
//!
//! ```yaml
//! timeout: 30s
//! connect_timeout: 5s
//! user_agent: my-app/1.0
//! default_headers:
//!   Accept: application/json
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use courier_core::HeaderMap;
use http::header::{HeaderName, HeaderValue, InvalidHeaderName, InvalidHeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::ReqwestTransport;

/// Errors from [`TransportConfig::build`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid header name {name:?}: {source}")]
    HeaderName {
        name: String,
        #[source]
        source: InvalidHeaderName,
    },
    #[error("invalid value for header {name:?}: {source}")]
    HeaderValue {
        name: String,
        #[source]
        source: InvalidHeaderValue,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Settings for the reqwest client behind a transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Total time allowed for a request, including reading the body.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,
    pub user_agent: Option<String>,
    /// Headers sent with every request unless the request sets them.
    pub default_headers: BTreeMap<String, String>,
}

impl TransportConfig {
    /// The headers the client will add to every request.
    pub fn session_headers(&self) -> Result<HeaderMap, ConfigError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|source| {
                ConfigError::HeaderName {
                    name: name.clone(),
                    source,
                }
            })?;
            let value = HeaderValue::from_str(value).map_err(|source| ConfigError::HeaderValue {
                name: name.clone(),
                source,
            })?;
            headers.insert(header, value);
        }
        if let Some(user_agent) = &self.user_agent {
            let value =
                HeaderValue::from_str(user_agent).map_err(|source| ConfigError::HeaderValue {
                    name: USER_AGENT.to_string(),
                    source,
                })?;
            headers.insert(USER_AGENT, value);
        }
        Ok(headers)
    }

    /// Builds a client from these settings and wraps it in a transport.
    pub fn build(&self) -> Result<ReqwestTransport, ConfigError> {
        let headers = self.session_headers()?;
        let mut builder = reqwest::Client::builder().default_headers(headers.clone());
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = self.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        let client = builder.build()?;
        Ok(ReqwestTransport::new(client).with_session_headers(headers))
    }
}
