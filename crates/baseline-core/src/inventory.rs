//! The inventory boundary: system profile documents and fact extraction.
//!
//! Fetching profiles is left to an [`InventoryFetcher`] implementation; this
//! module only defines the contract and turns a fetched profile into facts.

use std::{collections::HashMap, future::Future};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::{
  error::join,
  fact::Fact,
  normalize::{check_name, check_value},
  system::SystemGroup,
};

/// Scalar values an inventory reports when it has nothing to say.
const PLACEHOLDER_VALUES: &[&str] = &["N/A", "None"];

/// Value given to each member of a list-of-scalars category.
pub const ENABLED: &str = "enabled";

// ─── Documents ───────────────────────────────────────────────────────────────

/// A system as returned by the inventory service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemProfileDocument {
  pub id:             Uuid,
  #[serde(default)]
  pub display_name:   Option<String>,
  #[serde(default)]
  pub fqdn:           Option<String>,
  #[serde(default)]
  pub groups:         Vec<SystemGroup>,
  #[serde(default)]
  pub system_profile: Map<String, Value>,
}

impl SystemProfileDocument {
  /// Human-readable label: display name, then FQDN, then the id.
  pub fn label(&self) -> String {
    [&self.display_name, &self.fqdn]
      .into_iter()
      .flatten()
      .map(|s| s.trim())
      .find(|s| !s.is_empty())
      .map(str::to_string)
      .unwrap_or_else(|| self.id.to_string())
  }

  /// Canonical facts extracted from `system_profile`.
  pub fn facts(&self) -> Vec<Fact> { extract_facts(&self.system_profile) }
}

// ─── Fetcher ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FetchError {
  #[error("inventory did not return systems: {}", join(.0))]
  ItemNotReturned(Vec<Uuid>),

  #[error("inventory service error: {0}")]
  Service(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Source of system profiles.
pub trait InventoryFetcher: Send + Sync {
  /// Fetch profiles for `ids`. Implementations may return fewer documents
  /// than requested; callers check for gaps.
  fn fetch<'a>(
    &'a self,
    ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<SystemProfileDocument>, FetchError>> + Send + 'a;
}

/// An inventory backed by a fixed set of documents.
///
/// Used where no live inventory is reachable, e.g. local runs fed from a
/// JSON file.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
  systems: HashMap<Uuid, SystemProfileDocument>,
}

impl StaticInventory {
  pub fn new(systems: impl IntoIterator<Item = SystemProfileDocument>) -> Self {
    Self {
      systems: systems.into_iter().map(|s| (s.id, s)).collect(),
    }
  }

  pub fn len(&self) -> usize { self.systems.len() }

  pub fn is_empty(&self) -> bool { self.systems.is_empty() }
}

impl InventoryFetcher for StaticInventory {
  async fn fetch<'a>(
    &'a self,
    ids: &'a [Uuid],
  ) -> Result<Vec<SystemProfileDocument>, FetchError> {
    Ok(ids.iter().filter_map(|id| self.systems.get(id).cloned()).collect())
  }
}

// ─── Extraction ──────────────────────────────────────────────────────────────

/// Extract canonical facts from a system profile object.
///
/// - top-level `id` and `name` keys are not facts;
/// - `null`, empty strings and placeholder values are dropped;
/// - strings become leaves (trimmed), numbers and booleans their JSON text;
/// - objects become categories, dropped when nothing inside survives;
/// - arrays become categories: scalar members turn into leaves named by the
///   member with value `"enabled"`, object members carrying a `name` turn
///   into sub-categories keyed by that name.
///
/// Names or values that break the fact rules are skipped with a warning.
pub fn extract_facts(profile: &Map<String, Value>) -> Vec<Fact> {
  extract_members(profile, &["id", "name"])
}

fn extract_members(map: &Map<String, Value>, skip: &[&str]) -> Vec<Fact> {
  let facts = map
    .iter()
    .filter(|(key, _)| !skip.contains(&key.as_str()))
    .filter_map(|(key, value)| extract_fact(key, value))
    .collect();
  finish_level(facts)
}

fn extract_fact(name: &str, value: &Value) -> Option<Fact> {
  let name = valid_name(name)?;
  match value {
    Value::Object(map) => {
      non_empty_category(name, extract_members(map, &[]))
    }
    Value::Array(items) => {
      let facts = items.iter().filter_map(extract_member).collect();
      non_empty_category(name, finish_level(facts))
    }
    scalar => leaf(name, &scalar_text(scalar)?),
  }
}

fn extract_member(item: &Value) -> Option<Fact> {
  match item {
    Value::Object(map) => {
      let name = map.get("name").and_then(Value::as_str)?;
      let name = valid_name(name)?;
      non_empty_category(name, extract_members(map, &["name"]))
    }
    Value::Array(_) => None,
    scalar => {
      let name = valid_name(&scalar_text(scalar)?)?;
      Some(Fact::leaf(name, ENABLED))
    }
  }
}

fn scalar_text(value: &Value) -> Option<String> {
  let text = match value {
    Value::String(s) => s.trim().to_string(),
    Value::Number(n) => n.to_string(),
    Value::Bool(b) => b.to_string(),
    _ => return None,
  };
  if text.is_empty() || PLACEHOLDER_VALUES.contains(&text.as_str()) {
    return None;
  }
  Some(text)
}

fn valid_name(name: &str) -> Option<String> {
  let name = name.trim();
  match check_name(name) {
    Ok(()) => Some(name.to_string()),
    Err(err) => {
      warn!(%err, "skipping system profile fact");
      None
    }
  }
}

fn leaf(name: String, value: &str) -> Option<Fact> {
  match check_value(&name, value) {
    Ok(()) => Some(Fact::leaf(name, value)),
    Err(err) => {
      warn!(%err, "skipping system profile fact");
      None
    }
  }
}

fn non_empty_category(name: String, values: Vec<Fact>) -> Option<Fact> {
  (!values.is_empty()).then(|| Fact::category(name, values))
}

/// Keep the first fact of each name, then sort.
fn finish_level(facts: Vec<Fact>) -> Vec<Fact> {
  let mut level: Vec<Fact> = Vec::with_capacity(facts.len());
  for fact in facts {
    if !level.iter().any(|f| f.name() == fact.name()) {
      level.push(fact);
    }
  }
  level.sort_by(|a, b| a.name().cmp(b.name()));
  level
}
