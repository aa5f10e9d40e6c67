use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};

use super::reviewers::reviewer_label;
use super::status::Status;
use crate::config::{LabelDef, LabelerSettings};
use crate::github::client::{ApiError, GithubApi};
use crate::github::models::PullRequest;

/// Makes the labels on a pull request match a desired state with the
/// minimum number of API calls: presence is checked against the PR snapshot
/// before any add, removals tolerate already-gone labels, and re-running
/// with an unchanged desired state issues no calls at all.
pub struct LabelReconciler<'a> {
    api: &'a dyn GithubApi,
    owner: &'a str,
    repo: &'a str,
}

impl<'a> LabelReconciler<'a> {
    pub fn new(api: &'a dyn GithubApi, owner: &'a str, repo: &'a str) -> Self {
        Self { api, owner, repo }
    }

    /// Make sure the repository has a label matching `def`, creating or
    /// updating it as needed. Losing a creation race to a concurrent
    /// invocation is fine; the label exists either way.
    pub async fn ensure_label(&self, def: &LabelDef) -> Result<()> {
        let color = def.api_color();
        match self.api.get_label(self.owner, self.repo, &def.name).await {
            Ok(existing) => {
                let description = existing.description.as_deref().unwrap_or_default();
                if existing.color != color || description != def.description {
                    tracing::debug!(label = %def.name, "label definition drifted, updating");
                    self.api
                        .update_label(self.owner, self.repo, &def.name, color, &def.description)
                        .await
                        .with_context(|| format!("failed to update label '{}'", def.name))?;
                }
                Ok(())
            }
            Err(ApiError::NotFound(_)) => {
                match self
                    .api
                    .create_label(self.owner, self.repo, &def.name, color, &def.description)
                    .await
                {
                    Ok(()) | Err(ApiError::Conflict(_)) => Ok(()),
                    Err(e) => {
                        Err(e).with_context(|| format!("failed to create label '{}'", def.name))
                    }
                }
            }
            Err(e) => Err(e).with_context(|| format!("failed to look up label '{}'", def.name)),
        }
    }

    /// Add every active status label the PR is missing (one batched call)
    /// and remove every configured status label that is present but no
    /// longer active. The WIP label is only ever added when `add_wip_label`
    /// is set; a pre-existing WIP label is left in place while WIP is the
    /// active status.
    pub async fn apply_status(
        &self,
        pr: &PullRequest,
        settings: &LabelerSettings,
        active: &[Status],
    ) -> Result<()> {
        let mut to_add: Vec<String> = Vec::new();

        for status in Status::ALL {
            let def = status.label(&settings.labels);
            let is_active = active.contains(&status);
            let present = pr.has_label(&def.name);

            if is_active && !present {
                if status == Status::Wip && !settings.add_wip_label {
                    continue;
                }
                to_add.push(def.name.clone());
            } else if !is_active && present {
                self.remove(pr.number, &def.name).await?;
            }
        }

        if !to_add.is_empty() {
            tracing::debug!(pr = pr.number, labels = ?to_add, "adding status labels");
            self.api
                .add_labels(self.owner, self.repo, pr.number, &to_add)
                .await
                .with_context(|| format!("failed to add status labels to PR #{}", pr.number))?;
        }
        Ok(())
    }

    /// Same add/remove shape over the configured reviewer labels: present
    /// for every active reviewer, absent for the rest.
    pub async fn apply_reviewer_labels(
        &self,
        pr: &PullRequest,
        reviewers: &BTreeMap<String, LabelDef>,
        active: &BTreeSet<String>,
    ) -> Result<()> {
        let mut to_add: Vec<String> = Vec::new();

        for (login, def) in reviewers {
            let label = reviewer_label(login, def);
            let is_active = active.contains(login);
            let present = pr.has_label(&label.name);

            if is_active && !present {
                to_add.push(label.name);
            } else if !is_active && present {
                self.remove(pr.number, &label.name).await?;
            }
        }

        if !to_add.is_empty() {
            tracing::debug!(pr = pr.number, labels = ?to_add, "adding reviewer labels");
            self.api
                .add_labels(self.owner, self.repo, pr.number, &to_add)
                .await
                .with_context(|| format!("failed to add reviewer labels to PR #{}", pr.number))?;
        }
        Ok(())
    }

    async fn remove(&self, number: u64, name: &str) -> Result<()> {
        match self.api.remove_label(self.owner, self.repo, number, name).await {
            // Already gone, most likely a concurrent invocation beat us.
            Ok(()) | Err(ApiError::NotFound(_)) => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("failed to remove label '{name}' from PR #{number}")),
        }
    }
}
