//! Plugins bundled with the provider.

mod access_token;
mod network_activity;

pub use access_token::{AccessTokenAuthorizable, AccessTokenPlugin, AuthorizationType, basic_token};
pub use network_activity::{NetworkActivityChangeType, NetworkActivityPlugin};
