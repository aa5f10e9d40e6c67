use std::collections::{BTreeMap, BTreeSet};

use crate::config::LabelDef;

/// Intersect the configured reviewer map with the usernames currently
/// requested (or assigned, depending on the configured source). Reviewers
/// without a configured label are ignored entirely.
pub fn active_reviewers(
    configured: &BTreeMap<String, LabelDef>,
    current: &BTreeSet<String>,
) -> BTreeSet<String> {
    configured
        .keys()
        .filter(|login| current.contains(*login))
        .cloned()
        .collect()
}

/// The repository label backing a reviewer entry. The description is
/// derived from the username rather than configured.
pub fn reviewer_label(login: &str, def: &LabelDef) -> LabelDef {
    LabelDef {
        name: def.name.clone(),
        color: def.color.clone(),
        description: format!("Pull Request Reviews assigned to GitHub User: {login}"),
    }
}
