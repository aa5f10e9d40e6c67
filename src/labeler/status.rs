use anyhow::{bail, Result};
use regex::Regex;

use crate::config::{LabelDef, StatusLabels};
use crate::github::models::{Review, ReviewState};

/// Review lifecycle stage of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Wip,
    Unreviewed,
    ChangesRequested,
    Approved,
    Merged,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Wip,
        Status::Unreviewed,
        Status::ChangesRequested,
        Status::Approved,
        Status::Merged,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Status::Wip => "wip",
            Status::Unreviewed => "unreviewed",
            Status::ChangesRequested => "changes_requested",
            Status::Approved => "approved",
            Status::Merged => "merged",
        }
    }

    pub fn label(self, labels: &StatusLabels) -> &LabelDef {
        match self {
            Status::Wip => &labels.wip,
            Status::Unreviewed => &labels.unreviewed,
            Status::ChangesRequested => &labels.changes_requested,
            Status::Approved => &labels.approved,
            Status::Merged => &labels.merged,
        }
    }
}

/// Snapshot of everything the classification needs. `verdicts` must already
/// be aggregated to one per reviewer (see [`super::reviews::latest_verdicts`]).
pub struct ClassifyInput<'a> {
    pub title: &'a str,
    pub closed: bool,
    pub merged: bool,
    pub verdicts: &'a [Review],
    pub required_approvals: u32,
}

/// Derive the active status set, in priority order:
///
/// 1. WIP title (after stripping emoji decorations) beats everything.
/// 2. Closed and merged means merged, whatever the reviews say.
/// 3. Otherwise the verdicts decide: none -> unreviewed; any change request
///    -> changes requested; all approvals -> approved, with unreviewed added
///    on top when the approval count is below the branch's requirement.
///
/// The result is never empty.
pub fn classify(input: &ClassifyInput<'_>, wip_regex: &Regex) -> Result<Vec<Status>> {
    if wip_regex.is_match(&strip_decorations(input.title)) {
        return Ok(vec![Status::Wip]);
    }
    if input.closed && input.merged {
        return Ok(vec![Status::Merged]);
    }

    if input.verdicts.is_empty() {
        return Ok(vec![Status::Unreviewed]);
    }
    if input
        .verdicts
        .iter()
        .any(|r| r.state == ReviewState::ChangesRequested)
    {
        return Ok(vec![Status::ChangesRequested]);
    }

    let approvals = input
        .verdicts
        .iter()
        .filter(|r| r.state == ReviewState::Approved)
        .count();
    if approvals == input.verdicts.len() {
        let mut statuses = vec![Status::Approved];
        if (approvals as u32) < input.required_approvals {
            // Approved by everyone who reviewed, but not by enough people.
            statuses.push(Status::Unreviewed);
        }
        return Ok(statuses);
    }

    // Aggregation only lets approvals and change requests through, so this
    // is unreachable unless a caller hands us unaggregated input.
    bail!("pull request reviews resolve to no recognizable status");
}

/// Strip emoji, variation selectors and private-use characters so that
/// titles like "🚧 WIP: feature" still match the WIP pattern.
fn strip_decorations(title: &str) -> String {
    title
        .chars()
        .filter(|&c| {
            !matches!(
                c,
                '\u{E000}'..='\u{F8FF}' | '\u{FE00}'..='\u{FE0F}' | '\u{1F300}'..='\u{1F5FF}'
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_WIP_REGEX;
    use crate::github::models::Account;
    use chrono::{TimeZone, Utc};

    fn wip_regex() -> Regex {
        Regex::new(DEFAULT_WIP_REGEX).unwrap()
    }

    fn verdict(user_id: u64, state: ReviewState) -> Review {
        Review {
            user: Account {
                id: user_id,
                login: format!("user-{user_id}"),
            },
            state,
            submitted_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            commit_id: Some("head-sha".to_string()),
        }
    }

    fn input<'a>(
        title: &'a str,
        closed: bool,
        merged: bool,
        verdicts: &'a [Review],
        required_approvals: u32,
    ) -> ClassifyInput<'a> {
        ClassifyInput {
            title,
            closed,
            merged,
            verdicts,
            required_approvals,
        }
    }

    #[test]
    fn test_wip_title_beats_everything() {
        // Even a merged PR with approvals classifies as WIP.
        let verdicts = vec![verdict(1, ReviewState::Approved)];
        let statuses = classify(&input("[WIP] add feature", true, true, &verdicts, 0), &wip_regex())
            .unwrap();
        assert_eq!(statuses, vec![Status::Wip]);
    }

    #[test]
    fn test_wip_title_with_emoji_prefix() {
        let statuses =
            classify(&input("\u{1F527} WIP: fix build", false, false, &[], 0), &wip_regex())
                .unwrap();
        assert_eq!(statuses, vec![Status::Wip]);
    }

    #[test]
    fn test_variation_selector_stripped() {
        let stripped = super::strip_decorations("WIP\u{FE0F}: risky change");
        assert!(!stripped.contains('\u{FE0F}'));
        assert_eq!(stripped, "WIP: risky change");
    }

    #[test]
    fn test_merged_when_closed_and_merged() {
        let verdicts = vec![verdict(1, ReviewState::ChangesRequested)];
        let statuses =
            classify(&input("Add feature", true, true, &verdicts, 0), &wip_regex()).unwrap();
        assert_eq!(statuses, vec![Status::Merged]);
    }

    #[test]
    fn test_closed_unmerged_falls_through_to_reviews() {
        let statuses = classify(&input("Add feature", true, false, &[], 0), &wip_regex()).unwrap();
        assert_eq!(statuses, vec![Status::Unreviewed]);
    }

    #[test]
    fn test_no_reviews_is_unreviewed() {
        let statuses = classify(&input("Add feature", false, false, &[], 0), &wip_regex()).unwrap();
        assert_eq!(statuses, vec![Status::Unreviewed]);
    }

    #[test]
    fn test_any_change_request_wins() {
        let verdicts = vec![
            verdict(1, ReviewState::Approved),
            verdict(2, ReviewState::ChangesRequested),
        ];
        let statuses =
            classify(&input("Add feature", false, false, &verdicts, 0), &wip_regex()).unwrap();
        assert_eq!(statuses, vec![Status::ChangesRequested]);
    }

    #[test]
    fn test_all_approved_meets_minimum() {
        let verdicts = vec![
            verdict(1, ReviewState::Approved),
            verdict(2, ReviewState::Approved),
        ];
        let statuses =
            classify(&input("Add feature", false, false, &verdicts, 1), &wip_regex()).unwrap();
        assert_eq!(statuses, vec![Status::Approved]);
    }

    #[test]
    fn test_approved_below_minimum_keeps_unreviewed() {
        let verdicts = vec![verdict(1, ReviewState::Approved)];
        let statuses =
            classify(&input("Add feature", false, false, &verdicts, 2), &wip_regex()).unwrap();
        assert_eq!(statuses, vec![Status::Approved, Status::Unreviewed]);
    }

    #[test]
    fn test_no_minimum_means_approved_only() {
        let verdicts = vec![verdict(1, ReviewState::Approved)];
        let statuses =
            classify(&input("Add feature", false, false, &verdicts, 0), &wip_regex()).unwrap();
        assert_eq!(statuses, vec![Status::Approved]);
    }

    #[test]
    fn test_unaggregated_input_is_an_error() {
        let verdicts = vec![verdict(1, ReviewState::Other)];
        let result = classify(&input("Add feature", false, false, &verdicts, 0), &wip_regex());
        assert!(result.is_err());
    }

    #[test]
    fn test_status_label_mapping() {
        let labels = crate::config::StatusLabels::default();
        assert_eq!(Status::Wip.label(&labels).name, "WIP");
        assert_eq!(Status::ChangesRequested.label(&labels).name, "Changes requested");
        assert_eq!(Status::Merged.label(&labels).name, "Merged");
        for status in Status::ALL {
            assert!(!status.key().is_empty());
        }
    }

    #[test]
    fn test_strip_decorations_keeps_plain_text() {
        assert_eq!(super::strip_decorations("WIP: plain title"), "WIP: plain title");
        assert_eq!(super::strip_decorations("\u{1F527}[WIP] x"), "[WIP] x");
    }
}
