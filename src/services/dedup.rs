//! Cross-job deduplication filter.
//!
//! Pure with respect to the ledger snapshot it is handed: the ledger is only
//! ever appended to by the result assembler, after collection succeeds. A
//! candidate that passes the filter but then fails collection is therefore
//! never marked seen and stays eligible for a future job.

use std::collections::HashSet;

use crate::models::product::CandidateProduct;

/// Strip candidates whose ids are already in the ledger snapshot, preserving
/// feed order. With `ignore_history` set (deliberate re-collection) the
/// candidates pass through unchanged.
pub fn filter_candidates(
    candidates: Vec<CandidateProduct>,
    known_ids: &HashSet<i64>,
    ignore_history: bool,
) -> Vec<CandidateProduct> {
    if ignore_history {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|c| !known_ids.contains(&c.sno))
        .collect()
}
