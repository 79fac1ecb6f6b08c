//! The baseline entity and list-query types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fact::Fact;

/// A named, account-scoped snapshot of configuration facts.
///
/// `baseline_facts` is always held in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
  pub id:             Uuid,
  pub account:        String,
  pub display_name:   String,
  pub baseline_facts: Vec<Fact>,
  pub created_on:     DateTime<Utc>,
  pub modified_on:    DateTime<Utc>,
}

impl Baseline {
  /// Number of leaf facts in the whole tree.
  pub fn fact_count(&self) -> usize {
    self.baseline_facts.iter().map(Fact::leaf_count).sum()
  }
}

/// Input to [`crate::store::BaselineStore::create_baseline`]. The store
/// assigns the id and both timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBaseline {
  pub account:        String,
  pub display_name:   String,
  pub baseline_facts: Vec<Fact>,
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
  DisplayName,
  #[default]
  Updated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderHow {
  #[serde(rename = "ASC")]
  Asc,
  #[default]
  #[serde(rename = "DESC")]
  Desc,
}

impl OrderBy {
  pub fn as_str(self) -> &'static str {
    match self {
      OrderBy::DisplayName => "display_name",
      OrderBy::Updated => "updated",
    }
  }
}

impl OrderHow {
  pub fn as_str(self) -> &'static str {
    match self {
      OrderHow::Asc => "ASC",
      OrderHow::Desc => "DESC",
    }
  }
}

/// Parameters for [`crate::store::BaselineStore::list_baselines`].
#[derive(Debug, Clone, Default)]
pub struct BaselineQuery {
  /// Case-insensitive substring filter. `%` and `_` match literally; a
  /// blank filter is ignored.
  pub display_name: Option<String>,
  pub order_by:     OrderBy,
  pub order_how:    OrderHow,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

impl BaselineQuery {
  /// The trimmed filter, or `None` when it is absent or blank.
  pub fn display_name_filter(&self) -> Option<&str> {
    self
      .display_name
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
  }
}

/// One page of [`crate::store::BaselineStore::list_baselines`] results.
#[derive(Debug, Clone, Default)]
pub struct BaselinePage {
  pub baselines:       Vec<Baseline>,
  /// Total matching rows before `limit`/`offset` were applied.
  pub total_available: usize,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fact_count_counts_leaves() {
    let now = Utc::now();
    let baseline = Baseline {
      id:             Uuid::new_v4(),
      account:        "1212729".into(),
      display_name:   "web".into(),
      baseline_facts: vec![
        Fact::leaf("arch", "x86_64"),
        Fact::category("cpu", vec![Fact::leaf("cores", "4"), Fact::leaf("sockets", "2")]),
        Fact::category("flags", vec![]),
      ],
      created_on:     now,
      modified_on:    now,
    };
    assert_eq!(baseline.fact_count(), 3);
  }

  #[test]
  fn blank_display_name_filter_ignored() {
    let query = BaselineQuery {
      display_name: Some("   ".into()),
      ..Default::default()
    };
    assert_eq!(query.display_name_filter(), None);

    let query = BaselineQuery {
      display_name: Some(" web ".into()),
      ..Default::default()
    };
    assert_eq!(query.display_name_filter(), Some("web"));
  }

  #[test]
  fn ordering_parses_wire_names() {
    let how: OrderHow = serde_json::from_str("\"ASC\"").unwrap();
    assert_eq!(how, OrderHow::Asc);
    let by: OrderBy = serde_json::from_str("\"display_name\"").unwrap();
    assert_eq!(by, OrderBy::DisplayName);
  }
}
