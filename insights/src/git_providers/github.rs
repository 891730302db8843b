//! GitHub provider (REST v3) for PR metadata, file diffs and comments.
//!
//! Endpoints used:
//! - GET  /repos/{owner}/{repo}                          (access probe)
//! - GET  /repos/{owner}/{repo}/pulls/{number}           (meta incl. head sha)
//! - GET  /repos/{owner}/{repo}/pulls/{number}/files     (field "patch" is unified diff)
//! - POST /repos/{owner}/{repo}/pulls/{number}/comments  (position-anchored)
//! - POST /repos/{owner}/{repo}/issues/{number}/comments (general)

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{ConfigError, Error, InsightResult, ProviderError};
use crate::git_providers::ProviderConfig;
use crate::git_providers::types::*;

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_api: String, // e.g. "https://api.github.com"
}

impl GitHubClient {
    /// Constructs a client from generic provider config with a shared
    /// reqwest instance.
    pub fn from_config(cfg: ProviderConfig) -> InsightResult<Self> {
        if !cfg.base_api.starts_with("http://") && !cfg.base_api.starts_with("https://") {
            return Err(ConfigError::InvalidBaseUrl(cfg.base_api).into());
        }
        let http = Client::builder()
            .user_agent("repolens-backend/0.1")
            .build()?;
        Ok(Self {
            http,
            base_api: cfg.base_api.trim_end_matches('/').to_string(),
        })
    }

    /// Fetches PR metadata. Includes the head SHA needed to anchor comments.
    pub async fn get_pull(
        &self,
        token: &str,
        repo: &RepoKey,
        number: u64,
    ) -> InsightResult<PullRequestInfo> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.base_api,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name),
            number
        );
        let resp: GhPull = self
            .get(&url, token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(PullRequestInfo {
            number: resp.number,
            title: resp.title,
            state: resp.state,
            html_url: resp.html_url,
            head_sha: resp.head.sha,
            head_ref: resp.head.r#ref,
            base_ref: resp.base.r#ref,
            author_login: resp.user.map(|u| u.login),
        })
    }

    /// Fetches the changed files of a PR with their unified `patch` text.
    ///
    /// Paginates until a short page: large PRs exceed the provider's per-page
    /// maximum and every file must be present for comment anchoring to work.
    pub async fn get_pull_files(
        &self,
        token: &str,
        repo: &RepoKey,
        number: u64,
    ) -> InsightResult<Vec<PullRequestFile>> {
        const PER_PAGE: usize = 100;

        let mut files = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "{}/repos/{}/{}/pulls/{}/files?per_page={}&page={}",
                self.base_api,
                urlencoding::encode(&repo.owner),
                urlencoding::encode(&repo.name),
                number,
                PER_PAGE,
                page
            );
            let raw: Vec<GhPullFile> = self
                .get(&url, token)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let page_len = raw.len();
            files.extend(raw.into_iter().map(|f| PullRequestFile {
                filename: f.filename,
                status: f.status,
                patch: f.patch,
                additions: f.additions,
                deletions: f.deletions,
            }));
            if page_len < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(files)
    }

    /// Creates a position-anchored review comment on a PR.
    ///
    /// Rejections (typically 422 when the position does not land in the diff)
    /// come back as `ProviderError::Rejected` with the response body so the
    /// caller can fall back to a general comment.
    pub async fn create_review_comment(
        &self,
        token: &str,
        repo: &RepoKey,
        number: u64,
        comment: &NewReviewComment<'_>,
    ) -> InsightResult<PostedComment> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/comments",
            self.base_api,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name),
            number
        );
        let resp = self.post(&url, token).json(comment).send().await?;
        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        let posted: GhComment = resp.json().await?;
        Ok(PostedComment {
            id: posted.id,
            html_url: posted.html_url,
        })
    }

    /// Creates a general (non-anchored) PR-level comment via the issues API.
    pub async fn create_issue_comment(
        &self,
        token: &str,
        repo: &RepoKey,
        number: u64,
        body: &str,
    ) -> InsightResult<PostedComment> {
        #[derive(serde::Serialize)]
        struct Req<'a> {
            body: &'a str,
        }

        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.base_api,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name),
            number
        );
        let resp = self
            .post(&url, token)
            .json(&Req { body })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(rejected(resp).await);
        }
        let posted: GhComment = resp.json().await?;
        Ok(PostedComment {
            id: posted.id,
            html_url: posted.html_url,
        })
    }

    /// Live-tests a token against a specific repository.
    ///
    /// Read-only probe; any transport error counts as "no access" rather
    /// than bubbling up, since the credential chain treats the outcome as a
    /// yes/no question.
    pub async fn probe_repo(&self, token: &str, repo: &RepoKey) -> bool {
        let url = format!(
            "{}/repos/{}/{}",
            self.base_api,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name)
        );
        match self.get(&url, token).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(repo = %repo, "repo probe transport failure: {e}");
                false
            }
        }
    }

    fn get(&self, url: &str, token: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }

    fn post(&self, url: &str, token: &str) -> reqwest::RequestBuilder {
        self.http
            .post(url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
    }
}

/// Maps a non-success response to `ProviderError::Rejected`, preserving the
/// body text for per-comment error records.
async fn rejected(resp: reqwest::Response) -> Error {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Error::Provider(ProviderError::Rejected { status, body })
}

/// --- GitHub response shapes (subset of fields we actually use) ---

#[derive(Debug, Deserialize)]
struct GhPull {
    number: u64,
    title: String,
    state: String,
    html_url: String,
    head: GhRef,
    base: GhRef,
    #[serde(default)]
    user: Option<GhUser>,
}

#[derive(Debug, Deserialize)]
struct GhRef {
    sha: String,
    r#ref: String,
}

#[derive(Debug, Deserialize)]
struct GhUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GhPullFile {
    filename: String,
    status: String,
    #[serde(default)]
    patch: Option<String>, // unified diff; None for binary/too large
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

#[derive(Debug, Deserialize)]
struct GhComment {
    id: u64,
    html_url: String,
}
