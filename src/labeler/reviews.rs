use std::collections::HashMap;

use crate::github::models::{Review, ReviewState};

/// Collapse a pull request's raw review list into one verdict per reviewer.
///
/// Reviews on superseded commits are dropped first, then anything that is
/// not an approval or a change request. Within a reviewer the latest
/// `submitted_at` wins, so "request changes, then approve" counts as
/// approved. Ties (and missing timestamps) keep the earlier entry, making
/// the result deterministic over the input order. Output preserves
/// first-seen reviewer order.
pub fn latest_verdicts(reviews: &[Review], head_sha: &str) -> Vec<Review> {
    let mut verdicts: Vec<Review> = Vec::new();
    let mut by_reviewer: HashMap<u64, usize> = HashMap::new();

    for review in reviews {
        if review.commit_id.as_deref() != Some(head_sha) {
            continue;
        }
        if !matches!(
            review.state,
            ReviewState::Approved | ReviewState::ChangesRequested
        ) {
            continue;
        }
        match by_reviewer.get(&review.user.id) {
            Some(&slot) => {
                // Option ordering puts None first, so an undated review
                // never displaces a dated one.
                if review.submitted_at > verdicts[slot].submitted_at {
                    verdicts[slot] = review.clone();
                }
            }
            None => {
                by_reviewer.insert(review.user.id, verdicts.len());
                verdicts.push(review.clone());
            }
        }
    }

    verdicts
}

/// True when there is at least one verdict and every verdict is an approval.
pub fn all_approved(verdicts: &[Review]) -> bool {
    !verdicts.is_empty()
        && verdicts
            .iter()
            .all(|r| r.state == ReviewState::Approved)
}
