//! Per-request credential resolution glue.

use insights::{InsightResult, RepoKey, ResolvedToken, errors::Error, resolve_token};

use crate::core::app_state::AppState;

/// Resolves a usable provider token for the requesting user against the
/// target repository: candidate set from the directory, live probe through
/// the shared provider client. `Error::Authorization` means "no access"
/// (403), not a retryable failure — no job or comment work may start.
pub async fn resolve_for(
    state: &AppState,
    requesting_user: &str,
    org: &str,
    repo: &RepoKey,
) -> InsightResult<ResolvedToken> {
    let set = state.directory.candidate_set(requesting_user, org, repo);
    let gh = state.github.clone();
    let target = repo.clone();
    let probe = move |token: String| {
        let gh = gh.clone();
        let target = target.clone();
        async move { gh.probe_repo(&token, &target).await }
    };
    resolve_token(&set, Some(probe))
        .await
        .ok_or_else(|| Error::Authorization(repo.full_name()))
}
