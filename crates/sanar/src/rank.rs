//! Candidate ranking against the live UI.
//!
//! Drops candidates that match nothing, moves unique matches ahead of
//! ambiguous ones (stable, so priority order survives within each group)
//! and, for click-family actions, drops candidates whose element cannot be
//! clicked. Failed checks count as negative answers via
//! [`CheckFailure::default_verdict`]; they never abort ranking.

use tracing::debug;

use crate::adapter::{verdict, CheckFailure, UiTreeAdapter};
use crate::synth::CandidateList;

/// Filter and order `candidates` with explicit check functions
pub fn rank_and_filter<V, U, C>(
    candidates: &CandidateList,
    is_valid: V,
    is_unique: U,
    is_clickable: C,
    require_clickable: bool,
) -> CandidateList
where
    V: Fn(&str) -> Result<bool, CheckFailure>,
    U: Fn(&str) -> Result<bool, CheckFailure>,
    C: Fn(&str) -> Result<bool, CheckFailure>,
{
    let mut survivors: Vec<(&String, bool)> = Vec::new();
    for candidate in candidates {
        let valid = is_valid(candidate);
        if !verdict(&valid) {
            debug!(candidate = %candidate, reason = ?valid, "candidate dropped: no match");
            continue;
        }
        if require_clickable {
            let clickable = is_clickable(candidate);
            if !verdict(&clickable) {
                debug!(candidate = %candidate, reason = ?clickable, "candidate dropped: not clickable");
                continue;
            }
        }
        survivors.push((candidate, verdict(&is_unique(candidate))));
    }
    survivors.sort_by_key(|(_, unique)| !unique);
    CandidateList::from_candidates(
        survivors.into_iter().map(|(c, _)| c.clone()),
        candidates.cap(),
    )
}

/// Filter and order `candidates` using an adapter's checks
pub fn rank_with_adapter(
    candidates: &CandidateList,
    adapter: &dyn UiTreeAdapter,
    require_clickable: bool,
) -> CandidateList {
    rank_and_filter(
        candidates,
        |c| adapter.is_valid(c),
        |c| adapter.is_unique(c),
        |c| adapter.is_clickable(c),
        require_clickable,
    )
}
