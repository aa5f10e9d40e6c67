use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub state: PrState,
    #[serde(default)]
    pub merged: bool,
    pub head: PrRef,
    pub base: PrRef,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub assignees: Vec<Account>,
    #[serde(default)]
    pub requested_reviewers: Vec<Account>,
}

impl PullRequest {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.name == name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrRef {
    pub sha: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: u64,
    pub login: String,
}

/// A single submitted pull request review. GitHub reports one entry per
/// submission, so a reviewer who requested changes and later approved
/// appears twice.
#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub user: Account,
    pub state: ReviewState,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub commit_id: Option<String>,
}

/// Review verdicts we act on. COMMENTED, PENDING and DISMISSED all land in
/// `Other` and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ReviewState {
    #[serde(rename = "APPROVED")]
    Approved,
    #[serde(rename = "CHANGES_REQUESTED")]
    ChangesRequested,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BranchProtection {
    #[serde(default)]
    pub required_pull_request_reviews: Option<RequiredReviews>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequiredReviews {
    #[serde(default)]
    pub required_approving_review_count: Option<u32>,
}

impl BranchProtection {
    /// Required approving review count, 0 when the branch has no review
    /// requirement configured.
    pub fn required_approvals(&self) -> u32 {
        self.required_pull_request_reviews
            .as_ref()
            .and_then(|r| r.required_approving_review_count)
            .unwrap_or(0)
    }
}
