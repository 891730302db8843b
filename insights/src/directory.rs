//! In-memory directory of provider connections and repository attachments.
//!
//! Stands in for the platform's identity store (an external collaborator):
//! who holds which provider connection, and who attached a repository to an
//! organization. Seedable from JSON (env/config) and mutable through the
//! internal upsert surface; assembles the per-call `CandidateSet` the
//! credential chain consumes.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::credentials::{CandidateSet, ProviderConnection};
use crate::errors::{Error, InsightResult};
use crate::git_providers::RepoKey;

/// Record of a repository attached to an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoAttachment {
    pub org: String,
    pub repo: RepoKey,
    /// User who originally attached the repository.
    pub added_by: String,
    /// Owner of the organization.
    pub org_owner: String,
}

#[derive(Default)]
pub struct Directory {
    connections: RwLock<HashMap<String, ProviderConnection>>,
    attachments: RwLock<HashMap<(String, String), RepoAttachment>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads connection and attachment seeds from JSON arrays. Either may be
    /// empty; bad JSON is a startup error, not something to limp past.
    pub fn seed_from_json(
        &self,
        connections_json: Option<&str>,
        attachments_json: Option<&str>,
    ) -> InsightResult<()> {
        if let Some(raw) = connections_json {
            let conns: Vec<ProviderConnection> = serde_json::from_str(raw)
                .map_err(|e| Error::Validation(format!("connections seed: {e}")))?;
            for c in conns {
                self.upsert_connection(c);
            }
        }
        if let Some(raw) = attachments_json {
            let atts: Vec<RepoAttachment> = serde_json::from_str(raw)
                .map_err(|e| Error::Validation(format!("attachments seed: {e}")))?;
            for a in atts {
                self.upsert_attachment(a);
            }
        }
        Ok(())
    }

    pub fn upsert_connection(&self, conn: ProviderConnection) {
        self.connections
            .write()
            .expect("directory lock poisoned")
            .insert(conn.user_id.clone(), conn);
    }

    pub fn connection_of(&self, user_id: &str) -> Option<ProviderConnection> {
        self.connections
            .read()
            .expect("directory lock poisoned")
            .get(user_id)
            .cloned()
    }

    pub fn upsert_attachment(&self, att: RepoAttachment) {
        self.attachments
            .write()
            .expect("directory lock poisoned")
            .insert((att.org.clone(), att.repo.full_name()), att);
    }

    /// Detaches the repository from its organization, returning the removed
    /// record when one existed.
    pub fn remove_attachment(&self, org: &str, repo: &RepoKey) -> Option<RepoAttachment> {
        self.attachments
            .write()
            .expect("directory lock poisoned")
            .remove(&(org.to_string(), repo.full_name()))
    }

    pub fn attachment_of(&self, org: &str, repo: &RepoKey) -> Option<RepoAttachment> {
        self.attachments
            .read()
            .expect("directory lock poisoned")
            .get(&(org.to_string(), repo.full_name()))
            .cloned()
    }

    /// Derives the candidate principals for one credential resolution:
    /// requester, attacher (only when a different user), organization owner.
    pub fn candidate_set(&self, requesting_user: &str, org: &str, repo: &RepoKey) -> CandidateSet {
        let attachment = self.attachment_of(org, repo);
        let requester = self.connection_of(requesting_user);

        let added_by = attachment
            .as_ref()
            .filter(|a| a.added_by != requesting_user)
            .and_then(|a| self.connection_of(&a.added_by));

        let org_owner = attachment
            .as_ref()
            .and_then(|a| self.connection_of(&a.org_owner));

        CandidateSet {
            requester,
            added_by,
            org_owner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::ConnectionStatus;

    fn seed() -> Directory {
        let dir = Directory::new();
        for (user, token) in [("bob", "t-bob"), ("alice", "t-alice"), ("oscar", "t-oscar")] {
            dir.upsert_connection(ProviderConnection {
                user_id: user.into(),
                token: token.into(),
                status: ConnectionStatus::Active,
            });
        }
        dir.upsert_attachment(RepoAttachment {
            org: "acme".into(),
            repo: RepoKey::new("acme", "billing"),
            added_by: "alice".into(),
            org_owner: "oscar".into(),
        });
        dir
    }

    #[test]
    fn candidate_set_covers_all_three_tiers() {
        let dir = seed();
        let set = dir.candidate_set("bob", "acme", &RepoKey::new("acme", "billing"));
        assert_eq!(set.requester.unwrap().token, "t-bob");
        assert_eq!(set.added_by.unwrap().token, "t-alice");
        assert_eq!(set.org_owner.unwrap().token, "t-oscar");
    }

    #[test]
    fn attacher_tier_is_empty_when_requester_attached_the_repo() {
        let dir = seed();
        let set = dir.candidate_set("alice", "acme", &RepoKey::new("acme", "billing"));
        assert!(set.added_by.is_none());
        assert_eq!(set.requester.unwrap().token, "t-alice");
    }

    #[test]
    fn detaching_drops_attacher_and_owner_tiers() {
        let dir = seed();
        let repo = RepoKey::new("acme", "billing");
        assert!(dir.remove_attachment("acme", &repo).is_some());
        assert!(dir.attachment_of("acme", &repo).is_none());

        let set = dir.candidate_set("bob", "acme", &repo);
        assert!(set.added_by.is_none());
        assert!(set.org_owner.is_none());
        assert!(set.requester.is_some());
    }

    #[test]
    fn unattached_repo_yields_requester_only() {
        let dir = seed();
        let set = dir.candidate_set("bob", "acme", &RepoKey::new("acme", "unknown"));
        assert!(set.added_by.is_none());
        assert!(set.org_owner.is_none());
        assert!(set.requester.is_some());
    }
}
