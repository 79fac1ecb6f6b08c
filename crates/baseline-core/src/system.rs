//! Systems mapped to baselines, and their cached inventory groups.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An inventory group as cached on a mapped system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemGroup {
  pub id:   String,
  #[serde(default)]
  pub name: String,
}

/// Association between a baseline and an inventory system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedSystem {
  pub baseline_id: Uuid,
  pub system_id:   Uuid,
  pub groups:      Vec<SystemGroup>,
}

/// Group filter for mapped-system listings.
///
/// A system matches when any of its groups has one of `group_ids` or one of
/// `group_names`. An empty string in either list matches systems with no
/// groups at all. With both lists empty, everything matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupFilter {
  pub group_ids:   Vec<String>,
  pub group_names: Vec<String>,
}

impl GroupFilter {
  pub fn is_empty(&self) -> bool {
    self.group_ids.is_empty() && self.group_names.is_empty()
  }

  pub fn matches(&self, system: &MappedSystem) -> bool {
    if self.is_empty() {
      return true;
    }
    if system.groups.is_empty() {
      return self.group_ids.iter().any(String::is_empty)
        || self.group_names.iter().any(String::is_empty);
    }
    system.groups.iter().any(|g| {
      self.group_ids.contains(&g.id) || self.group_names.contains(&g.name)
    })
  }
}

/// Partial update of a mapped system. Fields left `None` are untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedSystemUpdate {
  #[serde(default)]
  pub groups: Option<Vec<SystemGroup>>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn system(groups: &[(&str, &str)]) -> MappedSystem {
    MappedSystem {
      baseline_id: Uuid::nil(),
      system_id:   Uuid::new_v4(),
      groups:      groups
        .iter()
        .map(|(id, name)| SystemGroup {
          id:   id.to_string(),
          name: name.to_string(),
        })
        .collect(),
    }
  }

  #[test]
  fn empty_filter_matches_everything() {
    assert!(GroupFilter::default().matches(&system(&[])));
    assert!(GroupFilter::default().matches(&system(&[("g1", "web")])));
  }

  #[test]
  fn ids_and_names_combine_as_union() {
    let filter = GroupFilter {
      group_ids:   vec!["g1".into()],
      group_names: vec!["db".into()],
    };
    assert!(filter.matches(&system(&[("g1", "web")])));
    assert!(filter.matches(&system(&[("g2", "db")])));
    assert!(!filter.matches(&system(&[("g3", "cache")])));
    assert!(!filter.matches(&system(&[])));
  }

  #[test]
  fn empty_string_selects_ungrouped() {
    let filter = GroupFilter {
      group_names: vec!["".into()],
      ..Default::default()
    };
    assert!(filter.matches(&system(&[])));
    assert!(!filter.matches(&system(&[("g1", "web")])));
  }

  #[test]
  fn update_without_groups_deserialises_to_none() {
    let update: MappedSystemUpdate = serde_json::from_str("{}").unwrap();
    assert_eq!(update.groups, None);
  }
}
