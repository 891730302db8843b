//! Per-comment outcome records keyed by content hash.
//!
//! Content-hash identity makes submission idempotent: re-submitting identical
//! comment text for the same location updates the same record instead of
//! duplicating it, and a UI can ask which candidates are already posted
//! before re-offering them. Records are created on first attempt, mutated on
//! every retry, and removed only by bulk repository teardown.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::git_providers::{CommentSide, RepoKey};

/// Identity of one candidate comment within a PR.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommentKey {
    pub org: String,
    pub repo: RepoKey,
    pub pr_number: u64,
    pub content_hash: String,
}

/// SHA-256 over `path | line | body`, truncated hex. Only needs to be
/// collision-resistant for moderate per-PR comment volumes.
pub fn content_hash(path: &str, line: Option<u32>, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update([0u8]);
    if let Some(l) = line {
        hasher.update(l.to_le_bytes());
    }
    hasher.update([0u8]);
    hasher.update(body.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Stored outcome of posting one comment.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewCommentRecord {
    pub path: String,
    pub line: Option<u32>,
    pub side: Option<CommentSide>,
    pub body: String,
    pub posted: bool,
    pub provider_comment_id: Option<u64>,
    pub provider_comment_url: Option<String>,
    pub post_error: Option<String>,
    pub post_attempts: u32,
}

/// Result of one post attempt, folded into the record.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Posted {
        comment_id: u64,
        comment_url: String,
    },
    Failed(String),
}

#[derive(Default)]
pub struct CommentStore {
    inner: Mutex<HashMap<CommentKey, ReviewCommentRecord>>,
}

impl CommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CommentKey) -> Option<ReviewCommentRecord> {
        self.inner
            .lock()
            .expect("comment store lock poisoned")
            .get(key)
            .cloned()
    }

    /// Inserts the record on first attempt, then folds `outcome` in; one
    /// locked operation per content-hash key, so concurrent retries cannot
    /// duplicate rows.
    pub fn record_attempt(
        &self,
        key: CommentKey,
        seed: ReviewCommentRecord,
        outcome: AttemptOutcome,
    ) -> ReviewCommentRecord {
        let mut map = self.inner.lock().expect("comment store lock poisoned");
        let record = map.entry(key).or_insert(seed);
        record.post_attempts += 1;
        match outcome {
            AttemptOutcome::Posted {
                comment_id,
                comment_url,
            } => {
                record.posted = true;
                record.provider_comment_id = Some(comment_id);
                record.provider_comment_url = Some(comment_url);
                record.post_error = None;
            }
            AttemptOutcome::Failed(msg) => {
                record.post_error = Some(msg);
            }
        }
        record.clone()
    }

    /// Which of the given hashes are already posted for this PR. Backs the
    /// idempotent re-render status call.
    pub fn posted_hashes(
        &self,
        org: &str,
        repo: &RepoKey,
        pr_number: u64,
        hashes: &[String],
    ) -> Vec<String> {
        let map = self.inner.lock().expect("comment store lock poisoned");
        hashes
            .iter()
            .filter(|h| {
                let key = CommentKey {
                    org: org.to_string(),
                    repo: repo.clone(),
                    pr_number,
                    content_hash: (*h).clone(),
                };
                map.get(&key).is_some_and(|r| r.posted)
            })
            .cloned()
            .collect()
    }

    /// Bulk teardown: drops every record belonging to the repository.
    pub fn remove_repo(&self, org: &str, repo: &RepoKey) {
        self.inner
            .lock()
            .expect("comment store lock poisoned")
            .retain(|k, _| !(k.org == org && &k.repo == repo));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(hash: &str) -> CommentKey {
        CommentKey {
            org: "acme".into(),
            repo: RepoKey::new("acme", "billing"),
            pr_number: 7,
            content_hash: hash.into(),
        }
    }

    fn seed() -> ReviewCommentRecord {
        ReviewCommentRecord {
            path: "src/lib.rs".into(),
            line: Some(12),
            side: Some(CommentSide::Right),
            body: "consider a bounds check".into(),
            posted: false,
            provider_comment_id: None,
            provider_comment_url: None,
            post_error: None,
            post_attempts: 0,
        }
    }

    #[test]
    fn hash_is_stable_and_location_sensitive() {
        let a = content_hash("src/lib.rs", Some(12), "body");
        assert_eq!(a, content_hash("src/lib.rs", Some(12), "body"));
        assert_ne!(a, content_hash("src/lib.rs", Some(13), "body"));
        assert_ne!(a, content_hash("src/lib.rs", Some(12), "other"));
        assert_ne!(a, content_hash("src/main.rs", Some(12), "body"));
        assert_ne!(a, content_hash("src/lib.rs", None, "body"));
    }

    #[test]
    fn second_attempt_updates_the_same_record() {
        let store = CommentStore::new();
        let h = content_hash("src/lib.rs", Some(12), "consider a bounds check");

        let first = store.record_attempt(key(&h), seed(), AttemptOutcome::Failed("503".into()));
        assert!(!first.posted);
        assert_eq!(first.post_attempts, 1);

        let second = store.record_attempt(
            key(&h),
            seed(),
            AttemptOutcome::Posted {
                comment_id: 42,
                comment_url: "https://example.test/c/42".into(),
            },
        );
        assert!(second.posted);
        assert_eq!(second.post_attempts, 2);
        // A successful retry clears the stored error.
        assert!(second.post_error.is_none());

        assert_eq!(
            store.posted_hashes("acme", &RepoKey::new("acme", "billing"), 7, &[h.clone()]),
            vec![h]
        );
    }

    #[test]
    fn teardown_removes_only_that_repository() {
        let store = CommentStore::new();
        let h = content_hash("a.rs", None, "x");
        store.record_attempt(key(&h), seed(), AttemptOutcome::Failed("net".into()));

        let other = CommentKey {
            org: "acme".into(),
            repo: RepoKey::new("acme", "web"),
            pr_number: 1,
            content_hash: h.clone(),
        };
        store.record_attempt(other.clone(), seed(), AttemptOutcome::Failed("net".into()));

        store.remove_repo("acme", &RepoKey::new("acme", "billing"));
        assert!(store.get(&key(&h)).is_none());
        assert!(store.get(&other).is_some());
    }
}
