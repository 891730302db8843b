//! Tiered credential resolution for provider calls.
//!
//! Candidate principals are tried in priority order until one is verified
//! usable for the target repository:
//!
//! 1. the requesting user's own connection (active + optional live probe),
//! 2. the user who originally attached the repository, when different from
//!    the requester (same rules),
//! 3. the organization owner's connection, accepted if merely active.
//!
//! The owner is assumed authoritative and is never live-tested. A `None`
//! result means "no access", not a retryable error: retrying with the same
//! identity set cannot succeed until connection state changes.
//!
//! The live test is a generic `Fn(token) -> Future<bool>` so production wires
//! an HTTP probe while tests stay hermetic. No async-trait, no boxed futures.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which candidate ultimately supplied the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenTier {
    Requester,
    AddedBy,
    OrgOwner,
}

/// Stored state of a user's provider connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Active,
    Expired,
    Revoked,
}

/// A user's provider connection as the identity store exposes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConnection {
    pub user_id: String,
    pub token: String,
    pub status: ConnectionStatus,
}

/// Candidate connections for one resolution, derived per call.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    pub requester: Option<ProviderConnection>,
    pub added_by: Option<ProviderConnection>,
    pub org_owner: Option<ProviderConnection>,
}

/// A usable token plus the tier that produced it.
#[derive(Debug, Clone)]
pub struct ResolvedToken {
    pub token: String,
    pub tier: TokenTier,
}

/// Resolves a usable token from the candidate set.
///
/// `live_test` receives the candidate token and must answer whether it can
/// actually see the target repository; `None` skips probing entirely. Only
/// the requester and attacher tiers are probed.
pub async fn resolve_token<F, Fut>(
    set: &CandidateSet,
    live_test: Option<F>,
) -> Option<ResolvedToken>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = bool>,
{
    let probed = [
        (set.requester.as_ref(), TokenTier::Requester),
        (set.added_by.as_ref(), TokenTier::AddedBy),
    ];

    for (candidate, tier) in probed {
        let Some(conn) = candidate else { continue };
        if conn.status != ConnectionStatus::Active {
            debug!(user = %conn.user_id, ?tier, "candidate skipped: connection not active");
            continue;
        }
        // The attacher adds nothing when it is the requester again.
        if tier == TokenTier::AddedBy
            && set
                .requester
                .as_ref()
                .is_some_and(|r| r.user_id == conn.user_id)
        {
            continue;
        }
        if let Some(test) = &live_test {
            if !test(conn.token.clone()).await {
                debug!(user = %conn.user_id, ?tier, "candidate skipped: live probe failed");
                continue;
            }
        }
        return Some(ResolvedToken {
            token: conn.token.clone(),
            tier,
        });
    }

    // Owner tier: active is enough, never probed.
    match &set.org_owner {
        Some(conn) if conn.status == ConnectionStatus::Active => Some(ResolvedToken {
            token: conn.token.clone(),
            tier: TokenTier::OrgOwner,
        }),
        _ => None,
    }
}
