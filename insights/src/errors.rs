//! Crate-wide error hierarchy for the insights core.
//!
//! Goals:
//! - Single root `Error` for all public functions.
//! - Provider-aware mapping (401→Unauthorized, 429→RateLimited, 5xx→Server, etc.).
//! - No dynamic dispatch, no async-trait, ergonomic `?` via `From` impls.
//!
//! Note on propagation: failures of the detached analysis-engine call are never
//! returned to the request that started a job. They land in the job record and
//! become visible on the next status read.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type InsightResult<T> = Result<T, Error>;

/// Root error type for the insights crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Code-hosting provider (GitHub) related failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Analysis-engine call failure (transport, non-2xx, reported error).
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// No credential candidate qualified for the target repository.
    ///
    /// Terminal for the request: retrying with the same identity set cannot
    /// succeed until connection state changes. No job is created.
    #[error("no provider access for repository {0}")]
    Authorization(String),

    /// Configuration problems (bad/missing base URL, etc.).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Input validation errors (empty comment body, bad subject, etc.).
    #[error("validation error: {0}")]
    Validation(String),
}

/// Detailed provider-specific error used inside the provider layer.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Unauthorized (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden (HTTP 403).
    #[error("forbidden")]
    Forbidden,

    /// Not found (HTTP 404).
    #[error("not found")]
    NotFound,

    /// Rate limited (HTTP 429).
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Gateway/Server error (HTTP 5xx).
    #[error("server error: status {0}")]
    Server(u16),

    /// Request rejected with a readable body (e.g. 422 on an unplaceable
    /// review-comment position). The submitter uses this to fall back to a
    /// general comment.
    #[error("rejected: status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Other HTTP status (4xx/3xx) not covered above.
    #[error("http status error: {0}")]
    HttpStatus(u16),

    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// Unexpected/invalid shape of provider response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Analysis-engine call errors.
///
/// All of these map to the same `failed` job state; the distinction only
/// matters for the recorded message.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The call did not resolve within its deadline.
    #[error("engine call timed out")]
    Timeout,

    /// Non-success HTTP status from the engine.
    #[error("engine returned status {status}: {body}")]
    Http { status: u16, body: String },

    /// The engine answered 2xx but reported a failure in its payload.
    #[error("engine reported: {0}")]
    Reported(String),

    /// Network/transport failure without status.
    #[error("engine network error: {0}")]
    Network(String),

    /// Unexpected/invalid shape of engine response.
    #[error("invalid engine response: {0}")]
    InvalidResponse(String),
}

/// Configuration and setup errors (base API URL, bind address, etc.).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("invalid base api url: {0}")]
    InvalidBaseUrl(String),
}

// ===== Conversions for `?` ergonomics =====

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Provider(ProviderError::from(e))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ProviderError::Timeout;
        }
        if e.is_decode() {
            return ProviderError::InvalidResponse(e.to_string());
        }
        if let Some(status) = e.status() {
            let code = status.as_u16();
            return match code {
                401 => ProviderError::Unauthorized,
                403 => ProviderError::Forbidden,
                404 => ProviderError::NotFound,
                429 => ProviderError::RateLimited {
                    retry_after_secs: None,
                },
                500..=599 => ProviderError::Server(code),
                _ => ProviderError::HttpStatus(code),
            };
        }
        ProviderError::Network(e.to_string())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return EngineError::Timeout;
        }
        if e.is_decode() {
            return EngineError::InvalidResponse(e.to_string());
        }
        if let Some(status) = e.status() {
            return EngineError::Http {
                status: status.as_u16(),
                body: String::new(),
            };
        }
        EngineError::Network(e.to_string())
    }
}
