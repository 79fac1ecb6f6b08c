//! The `BaselineStore` trait.
//!
//! Implemented by storage backends (e.g. `baseline-store-sqlite`). Every
//! method is scoped to an account: rows owned by other accounts are invisible.

use std::{collections::HashMap, future::Future};

use uuid::Uuid;

use crate::{
  baseline::{Baseline, BaselinePage, BaselineQuery, NewBaseline},
  system::{MappedSystem, SystemGroup},
};

/// Abstraction over a baseline store backend.
///
/// Backend errors convert into [`crate::Error`]; a backend that enforces
/// display-name uniqueness itself should map that failure to
/// [`crate::ValidationError::DuplicateDisplayName`].
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait BaselineStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  // ── Baselines ─────────────────────────────────────────────────────────

  /// Persist a new baseline. The store assigns the id and timestamps.
  ///
  /// Fails if the account already has a baseline with this display name.
  fn create_baseline(
    &self,
    input: NewBaseline,
  ) -> impl Future<Output = Result<Baseline, Self::Error>> + Send + '_;

  fn get_baseline<'a>(
    &'a self,
    account: &'a str,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Baseline>, Self::Error>> + Send + 'a;

  /// Fetch the baselines among `ids` that exist. Order is unspecified.
  fn get_baselines<'a>(
    &'a self,
    account: &'a str,
    ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<Baseline>, Self::Error>> + Send + 'a;

  /// Filter, sort and page the account's baselines.
  fn list_baselines<'a>(
    &'a self,
    account: &'a str,
    query: &'a BaselineQuery,
  ) -> impl Future<Output = Result<BaselinePage, Self::Error>> + Send + 'a;

  /// Exact-match lookup by display name.
  fn find_by_display_name<'a>(
    &'a self,
    account: &'a str,
    display_name: &'a str,
  ) -> impl Future<Output = Result<Option<Baseline>, Self::Error>> + Send + 'a;

  /// Overwrite `display_name`, `baseline_facts` and `modified_on` of an
  /// existing baseline. Returns `None` if it no longer exists.
  fn update_baseline(
    &self,
    baseline: Baseline,
  ) -> impl Future<Output = Result<Option<Baseline>, Self::Error>> + Send + '_;

  /// Delete the given baselines (and their mapped systems) in one
  /// transaction. Returns the number deleted.
  fn delete_baselines<'a>(
    &'a self,
    account: &'a str,
    ids: &'a [Uuid],
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  // ── Mapped systems ────────────────────────────────────────────────────

  /// Number of mapped systems per baseline. Baselines with none are absent
  /// from the map.
  fn mapped_system_counts<'a>(
    &'a self,
    account: &'a str,
    baseline_ids: &'a [Uuid],
  ) -> impl Future<Output = Result<HashMap<Uuid, usize>, Self::Error>> + Send + 'a;

  /// Map systems to a baseline. Already-mapped systems get their groups
  /// replaced. Returns every system now mapped to the baseline.
  fn add_mapped_systems<'a>(
    &'a self,
    account: &'a str,
    baseline_id: Uuid,
    systems: Vec<(Uuid, Vec<SystemGroup>)>,
  ) -> impl Future<Output = Result<Vec<MappedSystem>, Self::Error>> + Send + 'a;

  fn list_mapped_systems<'a>(
    &'a self,
    account: &'a str,
    baseline_id: Uuid,
  ) -> impl Future<Output = Result<Vec<MappedSystem>, Self::Error>> + Send + 'a;

  /// Unmap systems from one baseline. Returns the number removed.
  fn delete_mapped_systems<'a>(
    &'a self,
    account: &'a str,
    baseline_id: Uuid,
    system_ids: &'a [Uuid],
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Unmap systems from every baseline of the account.
  fn delete_systems<'a>(
    &'a self,
    account: &'a str,
    system_ids: &'a [Uuid],
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Ids of the baselines a system is mapped to.
  fn baselines_for_system<'a>(
    &'a self,
    account: &'a str,
    system_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + 'a;

  /// Replace the cached groups on every mapping of `system_id`. Returns the
  /// number of mappings touched.
  fn update_system_groups<'a>(
    &'a self,
    account: &'a str,
    system_id: Uuid,
    groups: Vec<SystemGroup>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;
}
