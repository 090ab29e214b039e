//! Declarative provider configuration.
//!
//! ```yaml
//! track_inflights: true
//! stub:
//!   type: Delayed
//!   delay: 250ms
//! ```

use std::time::Duration;

use courier_core::StubBehavior;
use serde::{Deserialize, Serialize};

/// Stub behavior applied to every target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StubConfig {
    #[default]
    Never,
    Immediate,
    Delayed {
        #[serde(with = "humantime_serde")]
        delay: Duration,
    },
}

impl From<StubConfig> for StubBehavior {
    fn from(config: StubConfig) -> Self {
        match config {
            StubConfig::Never => StubBehavior::Never,
            StubConfig::Immediate => StubBehavior::Immediate,
            StubConfig::Delayed { delay } => StubBehavior::Delayed(delay),
        }
    }
}

/// Provider settings that can come from a config file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Coalesce concurrent calls for equal endpoints into one dispatch.
    pub track_inflights: bool,
    pub stub: StubConfig,
}
