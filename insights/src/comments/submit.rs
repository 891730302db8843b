//! Review-comment submitter.
//!
//! Consumes the diff-position resolver and a resolved provider token to post
//! generated feedback onto a pull request. Anchored posting is attempted when
//! a head SHA and a target line are both available; on an unresolved position
//! or a provider rejection the comment degrades to a general PR-level note
//! restating the file/line context. Every attempt lands in the comment store
//! under its content hash, success or not, so whole-batch retries stay
//! idempotent.
//!
//! Comments are processed sequentially (one provider call at a time) to
//! respect simple rate limits and keep per-comment error attribution
//! straightforward. Individual failures never abort the batch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::comments::store::{
    AttemptOutcome, CommentKey, CommentStore, ReviewCommentRecord, content_hash,
};
use crate::diffpos::resolve_position;
use crate::git_providers::{CommentSide, GitHubClient, NewReviewComment, RepoKey};
use crate::jobs::truncate_error;

/// One generated comment offered for posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateComment {
    pub path: String,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub side: Option<CommentSide>,
    pub body: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub issue_type: Option<String>,
}

/// The pull request a batch targets.
#[derive(Debug, Clone)]
pub struct PrContext {
    pub org: String,
    pub repo: RepoKey,
    pub pr_number: u64,
    /// Head commit SHA when known; without it every comment posts as general.
    pub head_sha: Option<String>,
}

/// Per-comment outcome reported back to the initiator.
#[derive(Debug, Clone, Serialize)]
pub struct CommentResult {
    pub content_hash: String,
    pub path: String,
    pub line: Option<u32>,
    pub posted: bool,
    pub comment_url: Option<String>,
    pub error: Option<String>,
}

/// Aggregate batch outcome.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReport {
    pub posted: usize,
    pub total: usize,
    pub results: Vec<CommentResult>,
}

/// Posts a batch of candidate comments onto the PR.
pub async fn submit_comments(
    gh: &GitHubClient,
    store: &CommentStore,
    ctx: &PrContext,
    token: &str,
    comments: &[CandidateComment],
) -> SubmitReport {
    // One files fetch serves every anchored attempt in the batch. Failure
    // here only downgrades anchoring, it does not fail the batch.
    let patches = load_patches(gh, ctx, token, comments).await;

    let mut results = Vec::with_capacity(comments.len());
    for comment in comments {
        results.push(submit_one(gh, store, ctx, token, comment, patches.as_ref()).await);
    }

    let posted = results.iter().filter(|r| r.posted).count();
    SubmitReport {
        posted,
        total: results.len(),
        results,
    }
}

/// Which of the given candidates are already posted; used by the UI to avoid
/// re-offering a posted comment across retries/re-renders.
pub fn posted_hashes(
    store: &CommentStore,
    ctx: &PrContext,
    comments: &[CandidateComment],
) -> Vec<String> {
    let hashes: Vec<String> = comments
        .iter()
        .map(|c| content_hash(&c.path, c.line, &c.body))
        .collect();
    store.posted_hashes(&ctx.org, &ctx.repo, ctx.pr_number, &hashes)
}

async fn load_patches(
    gh: &GitHubClient,
    ctx: &PrContext,
    token: &str,
    comments: &[CandidateComment],
) -> Option<HashMap<String, String>> {
    let wants_anchoring = ctx.head_sha.is_some() && comments.iter().any(|c| c.line.is_some());
    if !wants_anchoring {
        return None;
    }
    match gh.get_pull_files(token, &ctx.repo, ctx.pr_number).await {
        Ok(files) => Some(
            files
                .into_iter()
                .filter_map(|f| f.patch.map(|p| (f.filename, p)))
                .collect(),
        ),
        Err(e) => {
            warn!(pr = ctx.pr_number, "fetching PR files failed, anchoring disabled: {e}");
            None
        }
    }
}

async fn submit_one(
    gh: &GitHubClient,
    store: &CommentStore,
    ctx: &PrContext,
    token: &str,
    comment: &CandidateComment,
    patches: Option<&HashMap<String, String>>,
) -> CommentResult {
    let hash = content_hash(&comment.path, comment.line, &comment.body);

    if comment.path.trim().is_empty() || comment.body.trim().is_empty() {
        return CommentResult {
            content_hash: hash,
            path: comment.path.clone(),
            line: comment.line,
            posted: false,
            comment_url: None,
            error: Some("path and body are required".into()),
        };
    }

    let key = CommentKey {
        org: ctx.org.clone(),
        repo: ctx.repo.clone(),
        pr_number: ctx.pr_number,
        content_hash: hash.clone(),
    };

    // Identical content already posted: report it, no provider call.
    if let Some(existing) = store.get(&key) {
        if existing.posted {
            debug!(hash = %hash, "skip already-posted comment");
            return CommentResult {
                content_hash: hash,
                path: comment.path.clone(),
                line: comment.line,
                posted: true,
                comment_url: existing.provider_comment_url,
                error: None,
            };
        }
    }

    let outcome = post_with_fallback(gh, ctx, token, comment, patches).await;
    let record = store.record_attempt(key, seed_record(comment), outcome);

    CommentResult {
        content_hash: hash,
        path: comment.path.clone(),
        line: comment.line,
        posted: record.posted,
        comment_url: record.provider_comment_url,
        error: record.post_error,
    }
}

/// Anchored attempt first, general comment second, error outcome last.
async fn post_with_fallback(
    gh: &GitHubClient,
    ctx: &PrContext,
    token: &str,
    comment: &CandidateComment,
    patches: Option<&HashMap<String, String>>,
) -> AttemptOutcome {
    if let (Some(head_sha), Some(line)) = (&ctx.head_sha, comment.line) {
        let side = comment.side.unwrap_or(CommentSide::Right);
        let resolved = patches
            .and_then(|m| m.get(&comment.path))
            .and_then(|patch| resolve_position(patch, line, side));

        if let Some(pos) = resolved {
            let anchored = NewReviewComment {
                body: &comment.body,
                commit_id: head_sha,
                path: &comment.path,
                position: pos.position,
            };
            match gh
                .create_review_comment(token, &ctx.repo, ctx.pr_number, &anchored)
                .await
            {
                Ok(posted) => {
                    return AttemptOutcome::Posted {
                        comment_id: posted.id,
                        comment_url: posted.html_url,
                    };
                }
                Err(e) => {
                    debug!(path = %comment.path, line, "anchored post rejected, falling back: {e}");
                }
            }
        } else {
            debug!(path = %comment.path, line, "position not resolvable, falling back");
        }
    }

    let body = general_body(comment);
    match gh
        .create_issue_comment(token, &ctx.repo, ctx.pr_number, &body)
        .await
    {
        Ok(posted) => AttemptOutcome::Posted {
            comment_id: posted.id,
            comment_url: posted.html_url,
        },
        Err(e) => AttemptOutcome::Failed(truncate_error(&e.to_string())),
    }
}

/// General comment body restating the file/line context the anchor lost.
fn general_body(comment: &CandidateComment) -> String {
    let location = match comment.line {
        Some(line) => format!("`{}:{}`", comment.path, line),
        None => format!("`{}`", comment.path),
    };
    let mut prefix = location;
    if let Some(sev) = &comment.severity {
        prefix.push_str(&format!(" · {sev}"));
    }
    if let Some(kind) = &comment.issue_type {
        prefix.push_str(&format!(" · {kind}"));
    }
    format!("{}\n\n{}", prefix, comment.body)
}

fn seed_record(comment: &CandidateComment) -> ReviewCommentRecord {
    ReviewCommentRecord {
        path: comment.path.clone(),
        line: comment.line,
        side: comment.side,
        body: comment.body.clone(),
        posted: false,
        provider_comment_id: None,
        provider_comment_url: None,
        post_error: None,
        post_attempts: 0,
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Json as AxumJson, Router,
        http::StatusCode,
        routing::{get, post},
    };
    use serde_json::json;

    use super::*;
    use crate::git_providers::ProviderConfig;
    use crate::jobs::MAX_ERROR_LEN;

    fn candidate(path: &str, line: Option<u32>, body: &str) -> CandidateComment {
        CandidateComment {
            path: path.into(),
            line,
            side: Some(CommentSide::Right),
            body: body.into(),
            severity: Some("major".into()),
            issue_type: None,
        }
    }

    async fn serve(app: Router) -> GitHubClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        GitHubClient::from_config(ProviderConfig {
            base_api: format!("http://{addr}"),
        })
        .unwrap()
    }

    fn ctx(head_sha: Option<&str>) -> PrContext {
        PrContext {
            org: "acme".into(),
            repo: RepoKey::new("acme", "billing"),
            pr_number: 7,
            head_sha: head_sha.map(Into::into),
        }
    }

    #[test]
    fn general_body_restates_location_severity_and_issue_type() {
        let c = candidate("src/lib.rs", Some(12), "possible overflow");
        assert_eq!(
            general_body(&c),
            "`src/lib.rs:12` · major\n\npossible overflow"
        );

        let mut typed = candidate("src/lib.rs", Some(12), "possible overflow");
        typed.issue_type = Some("correctness".into());
        assert_eq!(
            general_body(&typed),
            "`src/lib.rs:12` · major · correctness\n\npossible overflow"
        );

        let no_line = candidate("README.md", None, "stale docs");
        assert!(general_body(&no_line).starts_with("`README.md`"));
    }

    #[tokio::test]
    async fn rejected_anchor_degrades_to_general_note() {
        let app = Router::new()
            .route(
                "/repos/acme/billing/pulls/7/files",
                get(|| async {
                    AxumJson(json!([{
                        "filename": "src/lib.rs",
                        "status": "modified",
                        "patch": "@@ -10,3 +10,4 @@\n line ten\n+line eleven new\n line twelve\n line thirteen",
                        "additions": 1,
                        "deletions": 0,
                    }]))
                }),
            )
            .route(
                "/repos/acme/billing/pulls/7/comments",
                post(|| async {
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "position is not part of the diff",
                    )
                }),
            )
            .route(
                "/repos/acme/billing/issues/7/comments",
                post(|| async {
                    (
                        StatusCode::CREATED,
                        AxumJson(json!({"id": 99, "html_url": "https://example.test/c/99"})),
                    )
                }),
            );
        let gh = serve(app).await;
        let store = CommentStore::new();
        let ctx = ctx(Some("abc123"));

        // Line 11 resolves inside the patch, so the anchored attempt runs
        // first and its rejection must fall through to the issues endpoint.
        let c = candidate("src/lib.rs", Some(11), "possible overflow");
        let report = submit_comments(&gh, &store, &ctx, "t-token", std::slice::from_ref(&c)).await;

        assert_eq!(report.posted, 1);
        assert_eq!(report.total, 1);
        let result = &report.results[0];
        assert!(result.posted);
        assert_eq!(result.comment_url.as_deref(), Some("https://example.test/c/99"));
        assert!(result.error.is_none());

        let key = CommentKey {
            org: ctx.org.clone(),
            repo: ctx.repo.clone(),
            pr_number: ctx.pr_number,
            content_hash: content_hash(&c.path, c.line, &c.body),
        };
        assert!(store.get(&key).unwrap().posted);
    }

    #[tokio::test]
    async fn failed_general_post_records_truncated_error() {
        let app = Router::new().route(
            "/repos/acme/billing/issues/7/comments",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "x".repeat(2000)) }),
        );
        let gh = serve(app).await;
        let store = CommentStore::new();
        let ctx = ctx(None);

        // No line, no head SHA: goes straight to the general post.
        let c = candidate("src/lib.rs", None, "stale docs");
        let report = submit_comments(&gh, &store, &ctx, "t-token", std::slice::from_ref(&c)).await;

        assert_eq!(report.posted, 0);
        assert!(!report.results[0].posted);

        let key = CommentKey {
            org: ctx.org.clone(),
            repo: ctx.repo.clone(),
            pr_number: ctx.pr_number,
            content_hash: content_hash(&c.path, c.line, &c.body),
        };
        let record = store.get(&key).unwrap();
        assert!(!record.posted);
        assert_eq!(record.post_attempts, 1);
        let err = record.post_error.unwrap();
        assert!(err.contains("rejected"));
        assert!(err.chars().count() <= MAX_ERROR_LEN);
    }

    #[test]
    fn posted_hashes_reflects_store_state() {
        let store = CommentStore::new();
        let ctx = PrContext {
            org: "acme".into(),
            repo: RepoKey::new("acme", "billing"),
            pr_number: 7,
            head_sha: None,
        };
        let c = candidate("src/lib.rs", Some(12), "possible overflow");
        assert!(posted_hashes(&store, &ctx, std::slice::from_ref(&c)).is_empty());

        let hash = content_hash(&c.path, c.line, &c.body);
        store.record_attempt(
            CommentKey {
                org: ctx.org.clone(),
                repo: ctx.repo.clone(),
                pr_number: ctx.pr_number,
                content_hash: hash.clone(),
            },
            seed_record(&c),
            AttemptOutcome::Posted {
                comment_id: 1,
                comment_url: "https://example.test/c/1".into(),
            },
        );
        assert_eq!(posted_hashes(&store, &ctx, &[c]), vec![hash]);
    }
}
