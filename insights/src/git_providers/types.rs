//! Provider-agnostic data model for pull requests and review comments.
//!
//! These types are the normalized output of the provider layer and are
//! consumed by the diff-position resolver and the comment submitter.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A repository inside the provider, e.g. "acme/billing".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoKey {
    pub owner: String,
    pub name: String,
}

impl RepoKey {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// "owner/name" form used in engine payloads and log lines.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Side of a unified diff a review comment targets.
///
/// `Left` is the old file (context/deletions), `Right` the new file
/// (context/additions). Wire form follows the provider ("LEFT"/"RIGHT").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentSide {
    #[serde(rename = "LEFT")]
    Left,
    #[serde(rename = "RIGHT")]
    Right,
}

/// High-level pull-request metadata (subset we actually use).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestInfo {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub html_url: String,
    /// SHA of the PR head commit; anchors inline review comments.
    pub head_sha: String,
    pub head_ref: String,
    pub base_ref: String,
    pub author_login: Option<String>,
}

/// One changed file of a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestFile {
    pub filename: String,
    pub status: String,
    /// Unified diff text for this file; `None` for binary/too-large files.
    pub patch: Option<String>,
    pub additions: u64,
    pub deletions: u64,
}

/// Identifiers of a comment the provider accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostedComment {
    pub id: u64,
    pub html_url: String,
}

/// Payload for a position-anchored review comment.
#[derive(Debug, Clone, Serialize)]
pub struct NewReviewComment<'a> {
    pub body: &'a str,
    pub commit_id: &'a str,
    pub path: &'a str,
    /// Diff-relative position computed by the resolver, not a file line.
    pub position: u32,
}
