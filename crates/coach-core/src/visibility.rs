//! Who a protocol is visible to, and how that turns into assignment targets.
//!
//! [`Visibility`] is a sum type keyed by mode so each variant carries only its
//! own selection. The persisted form keeps the mode and the payload in two
//! columns (`visibility_mode`, `visibility_config`); [`Visibility::from_parts`]
//! and [`Visibility::config_json`] convert between the two.

use crate::error::{CoachError, Result};
use crate::types::{Tier, VisibilityMode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    AllUsers,
    TierBased {
        tiers: Vec<Tier>,
    },
    Individual {
        user_ids: Vec<String>,
    },
    CustomGroup {
        group_ids: Vec<String>,
    },
}

/// Loose persisted payload; only the field matching the mode is read.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    tiers: Vec<Tier>,
    #[serde(default)]
    user_ids: Vec<String>,
    #[serde(default)]
    group_ids: Vec<String>,
}

/// Resolved assignment targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Targets {
    /// Every user of the product. Never materialized here.
    Unbounded,
    /// Users holding any of these tiers; membership is looked up by the caller.
    ByTier { tiers: Vec<Tier> },
    /// A concrete, deduplicated user list.
    Users { user_ids: Vec<String> },
}

/// Group membership source. The store implements this against `group_members`.
pub trait MembershipLookup {
    fn group_members(&self, group_id: &str) -> Result<Vec<String>>;
}

impl Visibility {
    pub fn mode(&self) -> VisibilityMode {
        match self {
            Visibility::AllUsers => VisibilityMode::AllUsers,
            Visibility::TierBased { .. } => VisibilityMode::TierBased,
            Visibility::Individual { .. } => VisibilityMode::Individual,
            Visibility::CustomGroup { .. } => VisibilityMode::CustomGroup,
        }
    }

    /// Build from the persisted mode column and optional JSON payload.
    pub fn from_parts(mode: VisibilityMode, config: Option<&str>) -> Result<Self> {
        let raw: RawConfig = match config.map(str::trim) {
            Some(s) if !s.is_empty() && s != "null" => serde_json::from_str(s)?,
            _ => RawConfig::default(),
        };
        Ok(match mode {
            VisibilityMode::AllUsers => Visibility::AllUsers,
            VisibilityMode::TierBased => Visibility::TierBased { tiers: raw.tiers },
            VisibilityMode::Individual => Visibility::Individual {
                user_ids: raw.user_ids,
            },
            VisibilityMode::CustomGroup => Visibility::CustomGroup {
                group_ids: raw.group_ids,
            },
        })
    }

    /// Persisted payload; `None` for all_users.
    pub fn config_json(&self) -> Option<serde_json::Value> {
        match self {
            Visibility::AllUsers => None,
            Visibility::TierBased { tiers } => Some(serde_json::json!({ "tiers": tiers })),
            Visibility::Individual { user_ids } => {
                Some(serde_json::json!({ "user_ids": user_ids }))
            }
            Visibility::CustomGroup { group_ids } => {
                Some(serde_json::json!({ "group_ids": group_ids }))
            }
        }
    }

    /// Every mode other than all_users needs at least one selected entry.
    pub fn validate(&self) -> Result<()> {
        let empty = match self {
            Visibility::AllUsers => false,
            Visibility::TierBased { tiers } => tiers.is_empty(),
            Visibility::Individual { user_ids } => non_blank(user_ids).next().is_none(),
            Visibility::CustomGroup { group_ids } => non_blank(group_ids).next().is_none(),
        };
        if empty {
            let what = match self.mode() {
                VisibilityMode::TierBased => "select at least one tier",
                VisibilityMode::Individual => "select at least one user",
                _ => "select at least one group",
            };
            return Err(CoachError::validation("visibility", what));
        }
        Ok(())
    }

    pub fn resolve_targets(&self, lookup: &dyn MembershipLookup) -> Result<Targets> {
        self.validate()?;
        match self {
            Visibility::AllUsers => Ok(Targets::Unbounded),
            Visibility::TierBased { tiers } => {
                let mut tiers = tiers.clone();
                tiers.sort();
                tiers.dedup();
                Ok(Targets::ByTier { tiers })
            }
            Visibility::Individual { user_ids } => Ok(Targets::Users {
                user_ids: dedup_preserving_order(non_blank(user_ids).map(str::to_string)),
            }),
            Visibility::CustomGroup { group_ids } => Ok(Targets::Users {
                user_ids: expand_groups(
                    lookup,
                    &non_blank(group_ids).map(str::to_string).collect::<Vec<_>>(),
                )?,
            }),
        }
    }
}

/// Expand groups into their members; a user in several groups appears once.
pub fn expand_groups(lookup: &dyn MembershipLookup, group_ids: &[String]) -> Result<Vec<String>> {
    let mut members = Vec::new();
    for group_id in group_ids {
        members.extend(lookup.group_members(group_id)?);
    }
    Ok(dedup_preserving_order(members))
}

/// Assignment targets: trimmed non-blank `user_ids` followed by the members
/// of `group_ids`, each user once in first-seen order.
pub fn collect_targets(
    lookup: &dyn MembershipLookup,
    user_ids: &[String],
    group_ids: &[String],
) -> Result<Vec<String>> {
    let mut targets: Vec<String> = non_blank(user_ids).map(str::to_string).collect();
    targets.extend(expand_groups(lookup, group_ids)?);
    Ok(dedup_preserving_order(targets))
}

pub fn dedup_preserving_order(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

fn non_blank(ids: &[String]) -> impl Iterator<Item = &str> {
    ids.iter().map(|s| s.trim()).filter(|s| !s.is_empty())
}
