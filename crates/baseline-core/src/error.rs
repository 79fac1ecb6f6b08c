//! Error types for `baseline-core`.

use std::fmt::Display;

use thiserror::Error;
use uuid::Uuid;

use crate::inventory::FetchError;

/// A rule broken by caller-supplied facts, names, or ids.
///
/// Every variant names the offending fact, baseline, or id so the message can
/// be handed to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  // ── Facts ───────────────────────────────────────────────────────────────
  #[error("fact name cannot be empty")]
  EmptyFactName,

  #[error("fact name {0} is over 500 characters")]
  FactNameTooLong(String),

  #[error("Fact name {0:?} cannot have leading or trailing whitespace.")]
  FactNameWhitespace(String),

  #[error("value for {0} cannot be empty")]
  EmptyValue(String),

  #[error("value for {0} is over 1000 characters")]
  ValueTooLong(String),

  #[error("Value for {0} cannot have leading or trailing whitespace.")]
  ValueWhitespace(String),

  #[error("fact {0} cannot have value and values defined")]
  ValueAndValues(String),

  #[error("fact {0} must define value or values")]
  MissingValue(String),

  #[error("A fact with this name already exists: {0}")]
  DuplicateFactName(String),

  #[error(
    "baseline holds {0} facts, over the limit of {max}",
    max = crate::normalize::FACT_SET_MAX_FACTS
  )]
  TooManyFacts(usize),

  // ── Baselines ───────────────────────────────────────────────────────────
  #[error("baseline name cannot be empty")]
  EmptyDisplayName,

  #[error("baseline name {0} is over 200 characters")]
  DisplayNameTooLong(String),

  #[error("Baseline name {0:?} cannot have leading or trailing whitespace.")]
  DisplayNameWhitespace(String),

  #[error("A baseline with this name already exists: {0}")]
  DuplicateDisplayName(String),

  #[error("exactly one of baseline_facts or inventory_uuids must be provided")]
  AmbiguousSource,

  // ── Request ids ─────────────────────────────────────────────────────────
  #[error("malformed UUIDs requested ({})", join(.0))]
  MalformedIds(Vec<String>),

  #[error("duplicate IDs requested: {}", join(.0))]
  DuplicateIds(Vec<Uuid>),

  #[error("no ids requested")]
  NoIds,

  #[error("systems [{}] are not mapped to baseline {baseline}", join(.system_ids))]
  SystemsNotMapped {
    baseline:   Uuid,
    system_ids: Vec<Uuid>,
  },
}

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("ids [{}] not available to display", join(.0))]
  BaselinesNotFound(Vec<Uuid>),

  #[error("inventory UUID {} not available", join(.0))]
  InventoryNotFound(Vec<Uuid>),

  #[error("system {0} is not mapped to any baseline")]
  MappedSystemNotFound(Uuid),

  /// A fact is a plain value on one side of a comparison and a category on
  /// another.
  #[error("fact {0} cannot be compared: value on one side, category on another")]
  TypeMismatch(String),

  #[error("inventory error: {0}")]
  Inventory(#[source] FetchError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box any backend error into [`Error::Store`].
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) fn join<T: Display>(items: &[T]) -> String {
  items
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join(", ")
}
