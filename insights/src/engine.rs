//! HTTP client for the external analysis engine.
//!
//! One call in, one terminal JSON result out, may take minutes. The request
//! carries the resolved provider token plus repository/organization identity
//! and job-specific parameters; the response is either an artifact reference
//! or an error message. The engine's internals are opaque to this crate.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ConfigError, EngineError, InsightResult};
use crate::jobs::{JobKind, ResultRef};

/// Deadline for one generation call. Kept below the orchestrator's
/// staleness window (`jobs::STALE_AFTER`) so a hung call fails here first
/// and the poll-time check only catches workers that died outright.
pub const ENGINE_CALL_TIMEOUT: Duration = Duration::from_secs(40 * 60);

/// Runtime configuration for the engine client.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL, e.g. "http://analysis-engine:9000".
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct EngineClient {
    http: Client,
    base_url: String,
}

/// Generation request payload.
#[derive(Debug, Clone, Serialize)]
pub struct EngineRequest {
    pub access_token: String,
    pub organization: String,
    /// "owner/name".
    pub repo: String,
    pub kind: JobKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EngineResponse {
    #[serde(default)]
    result: Option<EngineResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EngineResult {
    bucket: String,
    key: String,
    #[serde(default)]
    size: u64,
}

impl EngineClient {
    pub fn from_config(cfg: EngineConfig) -> InsightResult<Self> {
        if !cfg.base_url.starts_with("http://") && !cfg.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidBaseUrl(cfg.base_url).into());
        }
        let http = Client::builder()
            .user_agent("repolens-backend/0.1")
            .connect_timeout(Duration::from_secs(10))
            .timeout(ENGINE_CALL_TIMEOUT)
            .build()
            .map_err(EngineError::from)?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Issues one generation call and waits for its terminal result.
    ///
    /// Intended to be awaited on the orchestrator's detached task, never on
    /// the request path.
    pub async fn generate(&self, req: &EngineRequest) -> InsightResult<ResultRef> {
        let url = format!("{}/generate", self.base_url);
        debug!(repo = %req.repo, kind = req.kind.as_str(), "engine generate call");

        let resp = self
            .http
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(EngineError::from)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Http {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: EngineResponse = resp.json().await.map_err(EngineError::from)?;
        if let Some(msg) = parsed.error {
            return Err(EngineError::Reported(msg).into());
        }
        let result = parsed.result.ok_or_else(|| {
            EngineError::InvalidResponse("2xx response with neither result nor error".into())
        })?;

        Ok(ResultRef {
            bucket: result.bucket,
            object_key: result.key,
            byte_size: result.size,
        })
    }

    /// Dereferences an artifact by its stored reference. The status read
    /// path calls this before returning a completed result.
    pub async fn fetch_artifact(&self, r: &ResultRef) -> InsightResult<serde_json::Value> {
        let url = format!(
            "{}/artifacts/{}/{}",
            self.base_url,
            urlencoding::encode(&r.bucket),
            urlencoding::encode(&r.object_key)
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(EngineError::from)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Http {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        let value = resp.json().await.map_err(EngineError::from)?;
        Ok(value)
    }
}
