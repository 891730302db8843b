use std::env;

use insights::{
    CommentStore, Directory, EngineClient, EngineConfig, GitHubClient, JobOrchestrator, JobStore,
    ProviderConfig,
    errors::{ConfigError, Error},
};
use std::sync::Arc;

/// Shared state for all HTTP handlers.
pub struct AppState {
    /// Bind address for the HTTP server, e.g. "0.0.0.0:8080".
    pub bind_addr: String,
    /// Shared provider client; tokens come per request from the credential chain.
    pub github: GitHubClient,
    /// Analysis-engine client (generation calls + artifact dereference).
    pub engine: EngineClient,
    /// Generation-job orchestrator over the keyed job store.
    pub jobs: JobOrchestrator,
    /// Idempotent per-comment outcome records.
    pub comments: CommentStore,
    /// Connections + repository attachments (stand-in for the identity store).
    pub directory: Directory,
}

impl AppState {
    /// Load shared state from environment variables.
    pub fn from_env() -> Result<Self, Error> {
        let bind_addr =
            env::var("API_ADDRESS").map_err(|_| ConfigError::MissingEnv("API_ADDRESS"))?;
        let engine_base =
            env::var("ENGINE_BASE_URL").map_err(|_| ConfigError::MissingEnv("ENGINE_BASE_URL"))?;
        let github_base =
            env::var("GITHUB_API_BASE").unwrap_or_else(|_| "https://api.github.com".into());

        let github = GitHubClient::from_config(ProviderConfig {
            base_api: github_base,
        })?;
        let engine = EngineClient::from_config(EngineConfig {
            base_url: engine_base,
        })?;

        let directory = Directory::new();
        directory.seed_from_json(
            env::var("CONNECTIONS_SEED").ok().as_deref(),
            env::var("ATTACHMENTS_SEED").ok().as_deref(),
        )?;

        Ok(Self {
            bind_addr,
            github,
            engine,
            jobs: JobOrchestrator::new(Arc::new(JobStore::new())),
            comments: CommentStore::new(),
            directory,
        })
    }
}
