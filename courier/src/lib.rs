#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Declarative provider configuration.
///
/// [`ProviderConfig`](config::ProviderConfig) deserializes from YAML or any
/// other serde format, with human-readable durations for delayed stubs.
pub mod config;

/// Default closures for endpoint mapping, request resolution and stubbing.
pub mod defaults;

mod dispatch;
mod inflight;

/// Metrics collection for request observability.
///
/// When the `metrics` feature is enabled, this module provides counters
/// and histograms for:
/// - Dispatched requests, live and stubbed
/// - Calls served by an in-flight duplicate
/// - Cancellations and live request latency
pub mod metrics;

/// Plugins bundled with the provider.
///
/// - [`AccessTokenPlugin`](plugins::AccessTokenPlugin) authorizes requests
/// - [`NetworkActivityPlugin`](plugins::NetworkActivityPlugin) reports when
///   requests start and finish
pub mod plugins;

mod provider;

/// Serial callback queue for completions and progress updates.
pub mod queue;

pub use config::{ProviderConfig, StubConfig};
pub use provider::{
    EndpointClosure, Provider, ProviderBuilder, RequestClosure, RequestResultClosure, StubClosure,
};
pub use queue::CallbackQueue;

pub use courier_core::{
    BoxError, Cancellable, Endpoint, Error, HeaderMap, Method, MultiTarget, Plugin, Progress,
    ProgressBlock, ProgressResponse, Request, RequestResult, RequestType, Response,
    SampleResponse, StatusCode, StubBehavior, Target, Task, Transport, Url, ValidationType,
};
