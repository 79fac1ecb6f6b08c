//! Baseline operations built on a [`BaselineStore`] and an
//! [`InventoryFetcher`].
//!
//! Each operation takes the caller's account explicitly; handles are passed
//! in rather than held, so the same functions serve the HTTP layer and tests.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  baseline::{Baseline, BaselinePage, BaselineQuery, NewBaseline},
  diff::{Comparison, FactSet, diff, merge_union},
  error::{Error, Result, ValidationError},
  fact::RawFact,
  inventory::{FetchError, InventoryFetcher, SystemProfileDocument},
  normalize::{DISPLAY_NAME_MAX_CHARS, normalize, normalize_facts, validate_display_name},
  store::BaselineStore,
  system::{GroupFilter, MappedSystem, MappedSystemUpdate},
};

fn store_err<E: Into<Error>>(err: E) -> Error { err.into() }

// ─── Request ids ─────────────────────────────────────────────────────────────

/// Parse a comma-separated id list such as a path segment
/// `"<uuid>,<uuid>"`. Blank entries are ignored.
pub fn parse_ids(raw: &str) -> Result<Vec<Uuid>, ValidationError> {
  let parts: Vec<&str> = raw
    .split(',')
    .map(str::trim)
    .filter(|p| !p.is_empty())
    .collect();
  parse_id_list(&parts)
}

/// Parse a list of id strings, reporting every malformed entry at once.
/// The list must be non-empty and free of duplicates.
pub fn parse_id_list<T: AsRef<str>>(raw: &[T]) -> Result<Vec<Uuid>, ValidationError> {
  let mut ids = Vec::with_capacity(raw.len());
  let mut malformed = Vec::new();
  for part in raw.iter().map(AsRef::as_ref) {
    match Uuid::try_parse(part) {
      Ok(id) => ids.push(id),
      Err(_) => malformed.push(part.to_string()),
    }
  }
  if !malformed.is_empty() {
    return Err(ValidationError::MalformedIds(malformed));
  }
  if ids.is_empty() {
    return Err(ValidationError::NoIds);
  }
  check_unique_ids(&ids)?;
  Ok(ids)
}

/// Parse a single id path segment.
pub fn parse_id(raw: &str) -> Result<Uuid, ValidationError> {
  Uuid::try_parse(raw).map_err(|_| ValidationError::MalformedIds(vec![raw.to_string()]))
}

/// Reject a request that names the same id twice.
pub fn check_unique_ids(ids: &[Uuid]) -> Result<(), ValidationError> {
  let mut seen = HashSet::new();
  let mut dupes: Vec<Uuid> = Vec::new();
  for id in ids {
    if !seen.insert(id) && !dupes.contains(id) {
      dupes.push(*id);
    }
  }
  if dupes.is_empty() {
    Ok(())
  } else {
    Err(ValidationError::DuplicateIds(dupes))
  }
}

// ─── Creation ────────────────────────────────────────────────────────────────

/// A baseline derived from system profiles, with the facts that were left
/// out because the systems disagreed on them.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileBaseline {
  pub baseline:  Baseline,
  pub conflicts: Vec<String>,
}

pub async fn create_from_facts<S: BaselineStore>(
  store: &S,
  account: &str,
  display_name: &str,
  facts: Vec<RawFact>,
) -> Result<Baseline> {
  validate_display_name(display_name)?;
  ensure_name_available(store, account, display_name, None).await?;
  let baseline_facts = normalize(facts)?;

  let baseline = store
    .create_baseline(NewBaseline {
      account: account.to_string(),
      display_name: display_name.to_string(),
      baseline_facts,
    })
    .await
    .map_err(store_err)?;
  info!(account, baseline_id = %baseline.id, facts = baseline.fact_count(), "baseline created");
  Ok(baseline)
}

pub async fn create_from_system_profiles<S, I>(
  store: &S,
  inventory: &I,
  account: &str,
  display_name: &str,
  system_ids: &[Uuid],
) -> Result<ProfileBaseline>
where
  S: BaselineStore,
  I: InventoryFetcher,
{
  validate_display_name(display_name)?;
  if system_ids.is_empty() {
    return Err(ValidationError::NoIds.into());
  }
  check_unique_ids(system_ids)?;
  ensure_name_available(store, account, display_name, None).await?;

  let systems = fetch_systems(inventory, system_ids).await?;
  let labels: Vec<String> = systems.iter().map(SystemProfileDocument::label).collect();
  let facts: Vec<_> = systems.iter().map(SystemProfileDocument::facts).collect();
  let sets: Vec<FactSet<'_>> = labels
    .iter()
    .zip(&facts)
    .map(|(label, facts)| FactSet::new(label, facts))
    .collect();

  // A fact that is a value on one system and a category on another cannot
  // be merged.
  diff(&sets).ensure_comparable()?;
  let merged = merge_union(&sets);
  if !merged.conflicts.is_empty() {
    warn!(
      account,
      conflicts = ?merged.conflicts,
      "system profiles disagree; conflicting facts left out of baseline"
    );
  }
  let baseline_facts = normalize_facts(merged.facts)?;

  let baseline = store
    .create_baseline(NewBaseline {
      account: account.to_string(),
      display_name: display_name.to_string(),
      baseline_facts,
    })
    .await
    .map_err(store_err)?;
  info!(
    account,
    baseline_id = %baseline.id,
    systems = system_ids.len(),
    "baseline created from system profiles"
  );
  Ok(ProfileBaseline {
    baseline,
    conflicts: merged.conflicts,
  })
}

/// Duplicate a baseline's facts under a new id. Without an explicit name the
/// copy is called `Copy of <name>`, then `Copy of <name> (2)` and so on
/// until a free name is found.
pub async fn copy_baseline<S: BaselineStore>(
  store: &S,
  account: &str,
  id: Uuid,
  display_name: Option<&str>,
) -> Result<Baseline> {
  let source = get_baseline(store, account, id).await?;

  let display_name = match display_name {
    Some(name) => {
      validate_display_name(name)?;
      ensure_name_available(store, account, name, None).await?;
      name.to_string()
    }
    None => derive_copy_name(store, account, &source.display_name).await?,
  };

  let copy = store
    .create_baseline(NewBaseline {
      account: account.to_string(),
      display_name,
      baseline_facts: source.baseline_facts,
    })
    .await
    .map_err(store_err)?;
  info!(account, source_id = %id, baseline_id = %copy.id, "baseline copied");
  Ok(copy)
}

async fn derive_copy_name<S: BaselineStore>(
  store: &S,
  account: &str,
  source_name: &str,
) -> Result<String> {
  let base = format!("Copy of {source_name}");
  let mut n = 1;
  loop {
    let candidate = copy_name_candidate(&base, n);
    let taken = store
      .find_by_display_name(account, &candidate)
      .await
      .map_err(store_err)?;
    if taken.is_none() {
      return Ok(candidate);
    }
    n += 1;
  }
}

fn copy_name_candidate(base: &str, n: usize) -> String {
  let suffix = if n == 1 { String::new() } else { format!(" ({n})") };
  let room = DISPLAY_NAME_MAX_CHARS - suffix.chars().count();
  format!("{}{suffix}", truncate_chars(base, room).trim_end())
}

fn truncate_chars(s: &str, max: usize) -> &str {
  match s.char_indices().nth(max) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}

// ─── Reads ───────────────────────────────────────────────────────────────────

pub async fn get_baseline<S: BaselineStore>(
  store: &S,
  account: &str,
  id: Uuid,
) -> Result<Baseline> {
  store
    .get_baseline(account, id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| Error::BaselinesNotFound(vec![id]))
}

/// Fetch baselines in request order. Any missing id fails the whole request.
pub async fn get_baselines<S: BaselineStore>(
  store: &S,
  account: &str,
  ids: &[Uuid],
) -> Result<Vec<Baseline>> {
  check_unique_ids(ids)?;
  let mut found = store.get_baselines(account, ids).await.map_err(store_err)?;

  let missing: Vec<Uuid> = ids
    .iter()
    .filter(|id| !found.iter().any(|b| b.id == **id))
    .copied()
    .collect();
  if !missing.is_empty() {
    return Err(Error::BaselinesNotFound(missing));
  }

  found.sort_by_key(|b| ids.iter().position(|id| *id == b.id));
  Ok(found)
}

pub async fn list_baselines<S: BaselineStore>(
  store: &S,
  account: &str,
  query: &BaselineQuery,
) -> Result<BaselinePage> {
  debug!(account, ?query, "listing baselines");
  store.list_baselines(account, query).await.map_err(store_err)
}

// ─── Mutation ────────────────────────────────────────────────────────────────

/// Changes to apply to a baseline. `None` fields are left alone;
/// `baseline_facts` replaces the whole fact set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaselinePatch {
  #[serde(default)]
  pub display_name:   Option<String>,
  #[serde(default)]
  pub baseline_facts: Option<Vec<RawFact>>,
}

pub async fn patch_baseline<S: BaselineStore>(
  store: &S,
  account: &str,
  id: Uuid,
  patch: BaselinePatch,
) -> Result<Baseline> {
  let mut baseline = get_baseline(store, account, id).await?;

  if let Some(name) = patch.display_name {
    validate_display_name(&name)?;
    ensure_name_available(store, account, &name, Some(id)).await?;
    baseline.display_name = name;
  }
  if let Some(facts) = patch.baseline_facts {
    baseline.baseline_facts = normalize(facts)?;
  }
  baseline.modified_on = Utc::now();

  let updated = store
    .update_baseline(baseline)
    .await
    .map_err(store_err)?
    .ok_or_else(|| Error::BaselinesNotFound(vec![id]))?;
  info!(account, baseline_id = %id, "baseline updated");
  Ok(updated)
}

/// Delete baselines. Nothing is deleted unless every id exists.
pub async fn delete_baselines<S: BaselineStore>(
  store: &S,
  account: &str,
  ids: &[Uuid],
) -> Result<usize> {
  get_baselines(store, account, ids).await?;
  let deleted = store.delete_baselines(account, ids).await.map_err(store_err)?;
  info!(account, ?ids, deleted, "baselines deleted");
  Ok(deleted)
}

async fn ensure_name_available<S: BaselineStore>(
  store: &S,
  account: &str,
  display_name: &str,
  exclude: Option<Uuid>,
) -> Result<()> {
  let existing = store
    .find_by_display_name(account, display_name)
    .await
    .map_err(store_err)?;
  match existing {
    Some(b) if Some(b.id) != exclude => {
      Err(ValidationError::DuplicateDisplayName(display_name.to_string()).into())
    }
    _ => Ok(()),
  }
}

// ─── Comparison ──────────────────────────────────────────────────────────────

/// A compared baseline or system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparedItem {
  pub id:    Uuid,
  /// Column label used in the comparison; unique within the report.
  pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
  pub baselines:  Vec<ComparedItem>,
  pub systems:    Vec<ComparedItem>,
  pub comparison: Comparison,
}

/// Compare baselines and live systems side by side, baselines first.
pub async fn compare<S, I>(
  store: &S,
  inventory: &I,
  account: &str,
  baseline_ids: &[Uuid],
  system_ids: &[Uuid],
) -> Result<ComparisonReport>
where
  S: BaselineStore,
  I: InventoryFetcher,
{
  if baseline_ids.is_empty() && system_ids.is_empty() {
    return Err(ValidationError::NoIds.into());
  }
  let baselines = if baseline_ids.is_empty() {
    Vec::new()
  } else {
    get_baselines(store, account, baseline_ids).await?
  };
  let systems = if system_ids.is_empty() {
    Vec::new()
  } else {
    check_unique_ids(system_ids)?;
    fetch_systems(inventory, system_ids).await?
  };
  debug!(
    account,
    baselines = baselines.len(),
    systems = systems.len(),
    "comparing"
  );

  let mut used = HashSet::new();
  let baseline_items: Vec<ComparedItem> = baselines
    .iter()
    .map(|b| ComparedItem {
      id:    b.id,
      label: unique_label(&mut used, &b.display_name, b.id),
    })
    .collect();
  let system_items: Vec<ComparedItem> = systems
    .iter()
    .map(|s| ComparedItem {
      id:    s.id,
      label: unique_label(&mut used, &s.label(), s.id),
    })
    .collect();

  let system_facts: Vec<_> = systems.iter().map(SystemProfileDocument::facts).collect();
  let sets: Vec<FactSet<'_>> = baseline_items
    .iter()
    .zip(baselines.iter().map(|b| b.baseline_facts.as_slice()))
    .chain(system_items.iter().zip(system_facts.iter().map(Vec::as_slice)))
    .map(|(item, facts)| FactSet::new(&item.label, facts))
    .collect();
  let comparison = diff(&sets);

  Ok(ComparisonReport {
    baselines: baseline_items,
    systems: system_items,
    comparison,
  })
}

fn unique_label(used: &mut HashSet<String>, label: &str, id: Uuid) -> String {
  let label = if used.contains(label) {
    format!("{label} ({id})")
  } else {
    label.to_string()
  };
  used.insert(label.clone());
  label
}

/// Fetch profiles in request order, failing with
/// [`Error::InventoryNotFound`] if the inventory does not return every id.
pub async fn fetch_systems<I: InventoryFetcher>(
  inventory: &I,
  ids: &[Uuid],
) -> Result<Vec<SystemProfileDocument>> {
  debug!(count = ids.len(), "fetching system profiles");
  let mut docs = inventory.fetch(ids).await.map_err(|err| match err {
    FetchError::ItemNotReturned(missing) => Error::InventoryNotFound(missing),
    other => Error::Inventory(other),
  })?;

  let missing: Vec<Uuid> = ids
    .iter()
    .filter(|id| !docs.iter().any(|d| d.id == **id))
    .copied()
    .collect();
  if !missing.is_empty() {
    return Err(Error::InventoryNotFound(missing));
  }

  docs.retain(|d| ids.contains(&d.id));
  docs.sort_by_key(|d| ids.iter().position(|id| *id == d.id));
  docs.dedup_by_key(|d| d.id);
  Ok(docs)
}

// ─── Mapped systems ──────────────────────────────────────────────────────────

/// Map inventory systems to a baseline, caching their groups.
pub async fn associate_systems<S, I>(
  store: &S,
  inventory: &I,
  account: &str,
  baseline_id: Uuid,
  system_ids: &[Uuid],
) -> Result<Vec<MappedSystem>>
where
  S: BaselineStore,
  I: InventoryFetcher,
{
  get_baseline(store, account, baseline_id).await?;
  if system_ids.is_empty() {
    return Err(ValidationError::NoIds.into());
  }
  check_unique_ids(system_ids)?;
  let systems = fetch_systems(inventory, system_ids).await?;

  let mapped = store
    .add_mapped_systems(
      account,
      baseline_id,
      systems.into_iter().map(|s| (s.id, s.groups)).collect(),
    )
    .await
    .map_err(store_err)?;
  info!(account, %baseline_id, added = system_ids.len(), "systems mapped");
  Ok(mapped)
}

pub async fn list_mapped_systems<S: BaselineStore>(
  store: &S,
  account: &str,
  baseline_id: Uuid,
  filter: &GroupFilter,
) -> Result<Vec<MappedSystem>> {
  get_baseline(store, account, baseline_id).await?;
  let systems = store
    .list_mapped_systems(account, baseline_id)
    .await
    .map_err(store_err)?;
  Ok(systems.into_iter().filter(|s| filter.matches(s)).collect())
}

/// Unmap systems from one baseline. Every id must currently be mapped.
pub async fn remove_mapped_systems<S: BaselineStore>(
  store: &S,
  account: &str,
  baseline_id: Uuid,
  system_ids: &[Uuid],
) -> Result<usize> {
  get_baseline(store, account, baseline_id).await?;
  check_unique_ids(system_ids)?;
  let mapped = store
    .list_mapped_systems(account, baseline_id)
    .await
    .map_err(store_err)?;

  let not_mapped: Vec<Uuid> = system_ids
    .iter()
    .filter(|id| !mapped.iter().any(|m| m.system_id == **id))
    .copied()
    .collect();
  if !not_mapped.is_empty() {
    return Err(
      ValidationError::SystemsNotMapped {
        baseline:   baseline_id,
        system_ids: not_mapped,
      }
      .into(),
    );
  }

  let removed = store
    .delete_mapped_systems(account, baseline_id, system_ids)
    .await
    .map_err(store_err)?;
  info!(account, %baseline_id, removed, "systems unmapped");
  Ok(removed)
}

/// Unmap systems from every baseline, e.g. after they leave the inventory.
pub async fn remove_systems_everywhere<S: BaselineStore>(
  store: &S,
  account: &str,
  system_ids: &[Uuid],
) -> Result<usize> {
  check_unique_ids(system_ids)?;
  let removed = store
    .delete_systems(account, system_ids)
    .await
    .map_err(store_err)?;
  info!(account, ?system_ids, removed, "systems unmapped from all baselines");
  Ok(removed)
}

pub async fn baselines_for_system<S: BaselineStore>(
  store: &S,
  account: &str,
  system_id: Uuid,
) -> Result<Vec<Uuid>> {
  store
    .baselines_for_system(account, system_id)
    .await
    .map_err(store_err)
}

/// Apply a partial update to every mapping of `system_id`. Returns the ids
/// of the baselines the system is mapped to.
pub async fn update_system_groups<S: BaselineStore>(
  store: &S,
  account: &str,
  system_id: Uuid,
  update: MappedSystemUpdate,
) -> Result<Vec<Uuid>> {
  let baseline_ids = baselines_for_system(store, account, system_id).await?;
  if baseline_ids.is_empty() {
    return Err(Error::MappedSystemNotFound(system_id));
  }

  if let Some(groups) = update.groups {
    let touched = store
      .update_system_groups(account, system_id, groups)
      .await
      .map_err(store_err)?;
    info!(account, %system_id, touched, "system groups refreshed");
  }
  Ok(baseline_ids)
}
