use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Built-in WIP title pattern, case-insensitive: `[WIP]`, `WIP:` or a
/// leading `WIP ` word, possibly repeated.
pub const DEFAULT_WIP_REGEX: &str = r"(?i)^\s*(\[WIP\]\s*|WIP:\s*|WIP\s+)+\s*";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub github: Option<GithubConfig>,
    #[serde(default)]
    pub defaults: SettingsOverride,
    #[serde(default)]
    pub repos: Vec<RepoEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    pub sentry_dsn_env: Option<String>,
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_port() -> u16 {
    8081
}

fn default_environment() -> String {
    "local".to_string()
}

#[derive(Debug, Deserialize)]
pub struct GithubConfig {
    pub token_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoEntry {
    pub slug: String,
    #[serde(default)]
    pub overrides: SettingsOverride,
}

impl RepoEntry {
    pub fn owner_repo(&self) -> Option<(&str, &str)> {
        self.slug.split_once('/')
    }
}

/// A repository label as declared in configuration. `color` may carry a
/// leading `#`; it is stripped before talking to the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LabelDef {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub description: String,
}

impl LabelDef {
    fn new(name: &str, color: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            color: color.to_string(),
            description: description.to_string(),
        }
    }

    pub fn api_color(&self) -> &str {
        self.color.strip_prefix('#').unwrap_or(&self.color)
    }
}

/// One label definition per status key. Explicit fields, so the full set is
/// enumerable without any key scanning; serde aliases accept the two
/// historical config spellings (`changesRequested`, `labelChangesRequested`).
#[derive(Debug, Clone, Deserialize)]
pub struct StatusLabels {
    #[serde(alias = "labelWip")]
    pub wip: LabelDef,
    #[serde(alias = "labelUnreviewed")]
    pub unreviewed: LabelDef,
    #[serde(alias = "labelApproved")]
    pub approved: LabelDef,
    #[serde(alias = "changesRequested", alias = "labelChangesRequested")]
    pub changes_requested: LabelDef,
    #[serde(alias = "labelMerged")]
    pub merged: LabelDef,
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            wip: LabelDef::new(
                "WIP",
                "#FBCA04",
                "Still work-in-progress, please don't review and don't merge",
            ),
            unreviewed: LabelDef::new("Unreviewed", "#334796", "Pull Request is not reviewed yet"),
            approved: LabelDef::new(
                "Approved",
                "#0E8A16",
                "Pull Request has been approved and can be merged",
            ),
            changes_requested: LabelDef::new(
                "Changes requested",
                "#AA2626",
                "Pull Request needs changes before it can be reviewed again",
            ),
            merged: LabelDef::new("Merged", "#6F42C1", "Pull Request has been merged successfully"),
        }
    }
}

/// Where the "currently requested" reviewer set comes from when reviewer
/// labels are enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewerSource {
    #[default]
    RequestedReviewers,
    Assignees,
}

/// Partial settings as they appear in the config file; every field is
/// optional so `[defaults]` and per-repo `[repos.overrides]` can each
/// override just what they need.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsOverride {
    #[serde(default, alias = "wipRegex")]
    pub wip_regex: Option<String>,
    #[serde(default, alias = "addWipLabel")]
    pub add_wip_label: Option<bool>,
    #[serde(default)]
    pub labels: Option<StatusLabelsOverride>,
    #[serde(default)]
    pub reviewers: Option<BTreeMap<String, LabelDef>>,
    #[serde(default, alias = "reviewerSource")]
    pub reviewer_source: Option<ReviewerSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusLabelsOverride {
    #[serde(default, alias = "labelWip")]
    pub wip: Option<LabelDef>,
    #[serde(default, alias = "labelUnreviewed")]
    pub unreviewed: Option<LabelDef>,
    #[serde(default, alias = "labelApproved")]
    pub approved: Option<LabelDef>,
    #[serde(default, alias = "changesRequested", alias = "labelChangesRequested")]
    pub changes_requested: Option<LabelDef>,
    #[serde(default, alias = "labelMerged")]
    pub merged: Option<LabelDef>,
}

/// Fully-resolved, immutable settings for one labeler invocation.
#[derive(Debug, Clone)]
pub struct LabelerSettings {
    pub wip_regex: String,
    pub add_wip_label: bool,
    pub labels: StatusLabels,
    pub reviewers: BTreeMap<String, LabelDef>,
    pub reviewer_source: ReviewerSource,
}

impl Default for LabelerSettings {
    fn default() -> Self {
        Self {
            wip_regex: DEFAULT_WIP_REGEX.to_string(),
            add_wip_label: false,
            labels: StatusLabels::default(),
            reviewers: BTreeMap::new(),
            reviewer_source: ReviewerSource::default(),
        }
    }
}

impl LabelerSettings {
    fn apply(&mut self, overrides: &SettingsOverride) {
        if let Some(regex) = &overrides.wip_regex {
            self.wip_regex = regex.clone();
        }
        if let Some(add_wip) = overrides.add_wip_label {
            self.add_wip_label = add_wip;
        }
        if let Some(labels) = &overrides.labels {
            let apply_label = |target: &mut LabelDef, source: &Option<LabelDef>| {
                if let Some(def) = source {
                    *target = def.clone();
                }
            };
            apply_label(&mut self.labels.wip, &labels.wip);
            apply_label(&mut self.labels.unreviewed, &labels.unreviewed);
            apply_label(&mut self.labels.approved, &labels.approved);
            apply_label(&mut self.labels.changes_requested, &labels.changes_requested);
            apply_label(&mut self.labels.merged, &labels.merged);
        }
        if let Some(reviewers) = &overrides.reviewers {
            self.reviewers = reviewers.clone();
        }
        if let Some(source) = overrides.reviewer_source {
            self.reviewer_source = source;
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "failed to parse ampel.toml")?;
        Ok(config)
    }

    pub fn repo(&self, owner: &str, repo: &str) -> Option<&RepoEntry> {
        self.repos
            .iter()
            .find(|entry| entry.owner_repo() == Some((owner, repo)))
    }

    /// Layered settings resolution: built-in defaults, then the file-level
    /// `[defaults]` table, then the repo's own overrides.
    pub fn settings_for(&self, entry: &RepoEntry) -> LabelerSettings {
        let mut settings = LabelerSettings::default();
        settings.apply(&self.defaults);
        settings.apply(&entry.overrides);
        settings
    }

    pub fn github_token(&self) -> Option<String> {
        self.github
            .as_ref()
            .and_then(|g| std::env::var(&g.token_env).ok())
            .filter(|t| !t.is_empty())
    }

    pub fn sentry_dsn(&self) -> String {
        self.server
            .sentry_dsn_env
            .as_ref()
            .and_then(|env_key| std::env::var(env_key).ok())
            .unwrap_or_default()
    }
}
