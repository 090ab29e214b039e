#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod error;
mod request;
mod transport;

pub use config::{ConfigError, TransportConfig};
pub use error::SendError;
pub use transport::ReqwestTransport;

/// Re-export reqwest-middleware's client for building middleware stacks
pub use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
