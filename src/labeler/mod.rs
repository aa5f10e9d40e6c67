pub mod reconcile;
pub mod reviewers;
pub mod reviews;
pub mod status;

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::{LabelerSettings, ReviewerSource};
use crate::github::client::GithubApi;
use crate::github::models::{PrState, PullRequest};
use self::reconcile::LabelReconciler;
use self::status::{classify, ClassifyInput, Status};

/// One labeler run per webhook delivery. Holds no state between runs;
/// everything is recomputed from the PR snapshot and live API reads, so
/// concurrent deliveries for different PRs are fully independent.
pub struct Labeler {
    api: Arc<dyn GithubApi>,
    owner: String,
    repo: String,
    settings: LabelerSettings,
    wip_regex: Regex,
}

impl Labeler {
    pub fn new(
        api: Arc<dyn GithubApi>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        settings: LabelerSettings,
    ) -> Result<Self> {
        let wip_regex = Regex::new(&settings.wip_regex)
            .with_context(|| format!("invalid wip_regex: {}", settings.wip_regex))?;
        Ok(Self {
            api,
            owner: owner.into(),
            repo: repo.into(),
            settings,
            wip_regex,
        })
    }

    /// Reconcile one pull request: ensure label definitions, classify, apply
    /// status labels, then (when configured) reviewer labels. Errors bubble
    /// up to the dispatch layer; only the documented tolerated cases are
    /// absorbed along the way.
    #[tracing::instrument(skip_all, fields(owner = %self.owner, repo = %self.repo, pr = pr.number, event))]
    pub async fn process(&self, event: &str, pr: &PullRequest) -> Result<()> {
        let reconciler = LabelReconciler::new(self.api.as_ref(), &self.owner, &self.repo);

        for status in Status::ALL {
            reconciler
                .ensure_label(status.label(&self.settings.labels))
                .await?;
        }

        let raw_reviews = self
            .api
            .list_reviews(&self.owner, &self.repo, pr.number)
            .await
            .with_context(|| format!("failed to list reviews for PR #{}", pr.number))?;
        let verdicts = reviews::latest_verdicts(&raw_reviews, &pr.head.sha);

        // Branch protection only matters on the all-approved path; skip the
        // lookup otherwise.
        let required_approvals = if reviews::all_approved(&verdicts) {
            self.required_approvals(&pr.base.ref_name).await
        } else {
            0
        };

        let statuses = classify(
            &ClassifyInput {
                title: &pr.title,
                closed: pr.state == PrState::Closed,
                merged: pr.merged,
                verdicts: &verdicts,
                required_approvals,
            },
            &self.wip_regex,
        )?;

        tracing::info!(
            statuses = ?statuses.iter().map(|s| s.key()).collect::<Vec<_>>(),
            verdicts = verdicts.len(),
            "classified pull request"
        );

        reconciler.apply_status(pr, &self.settings, &statuses).await?;

        if !self.settings.reviewers.is_empty() {
            for (login, def) in &self.settings.reviewers {
                reconciler
                    .ensure_label(&reviewers::reviewer_label(login, def))
                    .await?;
            }
            let current = self.current_reviewers(pr).await?;
            let active = reviewers::active_reviewers(&self.settings.reviewers, &current);
            reconciler
                .apply_reviewer_labels(pr, &self.settings.reviewers, &active)
                .await?;
        }

        Ok(())
    }

    /// Minimum approving reviews for the base branch. Fails soft to 0:
    /// unprotected branches 404 here and that simply means no minimum.
    async fn required_approvals(&self, branch: &str) -> u32 {
        match self
            .api
            .get_branch_protection(&self.owner, &self.repo, branch)
            .await
        {
            Ok(protection) => protection.required_approvals(),
            Err(e) => {
                tracing::debug!(branch, error = %e, "branch protection unavailable, assuming no required approvals");
                0
            }
        }
    }

    async fn current_reviewers(&self, pr: &PullRequest) -> Result<BTreeSet<String>> {
        match self.settings.reviewer_source {
            ReviewerSource::RequestedReviewers => {
                let users = self
                    .api
                    .list_review_requests(&self.owner, &self.repo, pr.number)
                    .await
                    .with_context(|| {
                        format!("failed to list review requests for PR #{}", pr.number)
                    })?;
                Ok(users.into_iter().collect())
            }
            ReviewerSource::Assignees => {
                Ok(pr.assignees.iter().map(|a| a.login.clone()).collect())
            }
        }
    }
}
