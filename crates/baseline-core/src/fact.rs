//! Fact types: the unit of configuration state a baseline records.
//!
//! A fact is either a named value or a named category of nested facts. The
//! wire shape (`{"name", "value"}` / `{"name", "values"}`) leaves room for a
//! record carrying both or neither; [`RawFact`] models that boundary shape and
//! [`Fact`] is what every other part of the crate works with.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ─── Fact ────────────────────────────────────────────────────────────────────

/// A well-formed fact: a leaf value or a category, never both.
///
/// Serialises to the same untagged shape it is read from, so canonical fact
/// trees can be stored and returned as plain JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fact {
  /// A named scalar value, e.g. `arch = x86_64`.
  Leaf { name: String, value: String },
  /// A named group of nested facts, e.g. `cpu_flags`.
  Category { name: String, values: Vec<Fact> },
}

impl Fact {
  pub fn leaf(name: impl Into<String>, value: impl Into<String>) -> Self {
    Self::Leaf {
      name:  name.into(),
      value: value.into(),
    }
  }

  pub fn category(name: impl Into<String>, values: Vec<Fact>) -> Self {
    Self::Category {
      name: name.into(),
      values,
    }
  }

  pub fn name(&self) -> &str {
    match self {
      Self::Leaf { name, .. } | Self::Category { name, .. } => name,
    }
  }

  /// The scalar value, if this is a leaf.
  pub fn value(&self) -> Option<&str> {
    match self {
      Self::Leaf { value, .. } => Some(value),
      Self::Category { .. } => None,
    }
  }

  /// The nested facts, if this is a category.
  pub fn values(&self) -> Option<&[Fact]> {
    match self {
      Self::Leaf { .. } => None,
      Self::Category { values, .. } => Some(values),
    }
  }

  pub fn is_category(&self) -> bool { matches!(self, Self::Category { .. }) }

  /// Number of leaves at or below this fact.
  pub fn leaf_count(&self) -> usize {
    match self {
      Self::Leaf { .. } => 1,
      Self::Category { values, .. } => values.iter().map(Fact::leaf_count).sum(),
    }
  }
}

// ─── RawFact ─────────────────────────────────────────────────────────────────

/// A fact exactly as it arrives in a request body.
///
/// `name` defaults to empty so a missing name is reported by validation as
/// "fact name cannot be empty" rather than as a deserialisation failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFact {
  #[serde(default)]
  pub name:   String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub value:  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub values: Option<Vec<RawFact>>,
}

/// The payload of a raw fact once the value/values exclusivity is settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawBody {
  Value(String),
  Values(Vec<RawFact>),
}

impl RawFact {
  pub fn leaf(name: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      name:   name.into(),
      value:  Some(value.into()),
      values: None,
    }
  }

  pub fn category(name: impl Into<String>, values: Vec<RawFact>) -> Self {
    Self {
      name:   name.into(),
      value:  None,
      values: Some(values),
    }
  }

  /// Split off the payload, enforcing that exactly one of `value` and
  /// `values` is present. Only this level is checked.
  pub fn into_body(self) -> Result<(String, RawBody), ValidationError> {
    match (self.value, self.values) {
      (Some(_), Some(_)) => Err(ValidationError::ValueAndValues(self.name)),
      (None, None) => Err(ValidationError::MissingValue(self.name)),
      (Some(value), None) => Ok((self.name, RawBody::Value(value))),
      (None, Some(values)) => Ok((self.name, RawBody::Values(values))),
    }
  }

  /// Convert into a [`Fact`], checking value/values exclusivity at every
  /// depth. Names and values are not otherwise validated; see
  /// [`crate::normalize`] for that.
  pub fn into_fact(self) -> Result<Fact, ValidationError> {
    match self.into_body()? {
      (name, RawBody::Value(value)) => Ok(Fact::Leaf { name, value }),
      (name, RawBody::Values(values)) => Ok(Fact::Category {
        name,
        values: values
          .into_iter()
          .map(RawFact::into_fact)
          .collect::<Result<_, _>>()?,
      }),
    }
  }
}

impl From<Fact> for RawFact {
  fn from(fact: Fact) -> Self {
    match fact {
      Fact::Leaf { name, value } => Self::leaf(name, value),
      Fact::Category { name, values } => {
        Self::category(name, values.into_iter().map(Self::from).collect())
      }
    }
  }
}
