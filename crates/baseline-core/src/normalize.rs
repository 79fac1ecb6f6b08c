//! Fact validation and canonicalisation.
//!
//! Validation is fail-fast and runs level by level: duplicate names across a
//! whole sibling list are reported before any individual fact on that list is
//! examined, then each fact is checked in input order, descending into a
//! category before moving on to its next sibling. Every level of a valid tree
//! is then sorted by name using ordinal (byte-wise) comparison.

use std::collections::HashSet;

use crate::{
  error::ValidationError,
  fact::{Fact, RawBody, RawFact},
};

pub const FACT_NAME_MAX_CHARS: usize = 500;
pub const FACT_VALUE_MAX_CHARS: usize = 1000;
pub const DISPLAY_NAME_MAX_CHARS: usize = 200;
/// Most facts one baseline may hold, counting categories as well as their
/// members.
pub const FACT_SET_MAX_FACTS: usize = 10_000;

/// Validate request-body facts and return their canonical form.
///
/// A set holding more than [`FACT_SET_MAX_FACTS`] facts is rejected before
/// any per-fact rule is checked.
pub fn normalize(raw: Vec<RawFact>) -> Result<Vec<Fact>, ValidationError> {
  let count = count_facts(&raw);
  if count > FACT_SET_MAX_FACTS {
    return Err(ValidationError::TooManyFacts(count));
  }
  normalize_level(raw)
}

fn count_facts(raw: &[RawFact]) -> usize {
  raw
    .iter()
    .map(|f| 1 + f.values.as_deref().map_or(0, count_facts))
    .sum()
}

fn normalize_level(raw: Vec<RawFact>) -> Result<Vec<Fact>, ValidationError> {
  check_unique_names(raw.iter().map(|f| f.name.as_str()))?;

  let mut facts = Vec::with_capacity(raw.len());
  for fact in raw {
    check_name(&fact.name)?;
    let fact = match fact.into_body()? {
      (name, RawBody::Value(value)) => {
        check_value(&name, &value)?;
        Fact::Leaf { name, value }
      }
      (name, RawBody::Values(values)) => Fact::Category {
        name,
        values: normalize_level(values)?,
      },
    };
    facts.push(fact);
  }

  sort_level(&mut facts);
  Ok(facts)
}

/// Validate and canonicalise facts that are already well-formed, such as
/// facts extracted from a system profile or loaded from storage.
pub fn normalize_facts(facts: Vec<Fact>) -> Result<Vec<Fact>, ValidationError> {
  normalize(facts.into_iter().map(RawFact::from).collect())
}

/// Check a baseline display name: non-blank, no surrounding whitespace, at
/// most [`DISPLAY_NAME_MAX_CHARS`] characters.
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
  if name.trim().is_empty() {
    return Err(ValidationError::EmptyDisplayName);
  }
  if name.trim() != name {
    return Err(ValidationError::DisplayNameWhitespace(name.to_string()));
  }
  if name.chars().count() > DISPLAY_NAME_MAX_CHARS {
    return Err(ValidationError::DisplayNameTooLong(name.to_string()));
  }
  Ok(())
}

/// Check a fact name against the naming rules.
pub fn check_name(name: &str) -> Result<(), ValidationError> {
  if name.is_empty() {
    return Err(ValidationError::EmptyFactName);
  }
  if name.chars().count() > FACT_NAME_MAX_CHARS {
    return Err(ValidationError::FactNameTooLong(name.to_string()));
  }
  if name.trim() != name {
    return Err(ValidationError::FactNameWhitespace(name.to_string()));
  }
  Ok(())
}

/// Check a leaf value. Errors cite the owning fact's name.
pub fn check_value(name: &str, value: &str) -> Result<(), ValidationError> {
  if value.is_empty() {
    return Err(ValidationError::EmptyValue(name.to_string()));
  }
  if value.chars().count() > FACT_VALUE_MAX_CHARS {
    return Err(ValidationError::ValueTooLong(name.to_string()));
  }
  if value.trim() != value {
    return Err(ValidationError::ValueWhitespace(name.to_string()));
  }
  Ok(())
}

fn check_unique_names<'a>(
  names: impl Iterator<Item = &'a str>,
) -> Result<(), ValidationError> {
  let mut seen = HashSet::new();
  for name in names {
    if !seen.insert(name) {
      return Err(ValidationError::DuplicateFactName(name.to_string()));
    }
  }
  Ok(())
}

fn sort_level(facts: &mut [Fact]) {
  facts.sort_by(|a, b| a.name().cmp(b.name()));
}
