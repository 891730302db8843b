//! Code-hosting provider layer (GitHub REST) w/o async-trait or dynamic
//! trait objects.
//!
//! Tokens are passed per call, not stored on the client: every request is
//! authorized by whichever candidate the credential chain resolved, so one
//! shared client serves all users.

pub mod types;
pub use types::*;

pub mod github;
pub use github::GitHubClient;

/// Runtime configuration for the provider client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// API base, e.g. "https://api.github.com".
    pub base_api: String,
}
