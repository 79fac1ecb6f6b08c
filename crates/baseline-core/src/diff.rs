//! Structural comparison of canonical fact trees.
//!
//! Any number of labelled fact sets can be compared at once. Each fact name in
//! the union of all sets produces one [`FactComparison`], classified as
//! [`FactState::Same`], [`FactState::Different`], [`FactState::Incomparable`]
//! or [`FactState::OnlyIn`], with categories compared child by child.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{error::Error, fact::Fact};

/// One side of a comparison: a label (baseline or system name) and its facts.
#[derive(Debug, Clone, Copy)]
pub struct FactSet<'a> {
  pub label: &'a str,
  pub facts: &'a [Fact],
}

impl<'a> FactSet<'a> {
  pub fn new(label: &'a str, facts: &'a [Fact]) -> Self { Self { label, facts } }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FactState {
  Same,
  Different,
  /// A plain value on one side and a category on another.
  Incomparable,
  /// Present on exactly one side; `side` is that side's label.
  OnlyIn { side: String },
}

/// What a single side holds under a given fact name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideEntry {
  Absent,
  Leaf { value: String },
  Category,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactComparison {
  pub name:     String,
  #[serde(flatten)]
  pub state:    FactState,
  /// One entry per input side, in input order.
  pub sides:    Vec<SideEntry>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub children: Vec<FactComparison>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comparison {
  pub sides: Vec<String>,
  pub facts: Vec<FactComparison>,
}

impl Comparison {
  /// Fail with [`Error::TypeMismatch`] naming the first incomparable fact by
  /// its dotted path.
  pub fn ensure_comparable(&self) -> Result<(), Error> {
    match first_incomparable(&self.facts, "") {
      Some(path) => Err(Error::TypeMismatch(path)),
      None => Ok(()),
    }
  }

  /// True when every fact compares [`FactState::Same`].
  pub fn all_same(&self) -> bool {
    self.facts.iter().all(|f| f.state == FactState::Same)
  }
}

/// Compare the given fact sets.
pub fn diff(sets: &[FactSet<'_>]) -> Comparison {
  let labels: Vec<&str> = sets.iter().map(|s| s.label).collect();
  let levels: Vec<&[Fact]> = sets.iter().map(|s| s.facts).collect();
  Comparison {
    sides: labels.iter().map(|l| l.to_string()).collect(),
    facts: compare_level(&levels, &labels),
  }
}

// ─── Comparison ──────────────────────────────────────────────────────────────

fn lookup(level: &[Fact]) -> BTreeMap<&str, &Fact> {
  level.iter().map(|f| (f.name(), f)).collect()
}

fn compare_level(levels: &[&[Fact]], labels: &[&str]) -> Vec<FactComparison> {
  let lookups: Vec<_> = levels.iter().map(|l| lookup(l)).collect();
  let names: BTreeSet<&str> = lookups.iter().flat_map(|m| m.keys().copied()).collect();

  names
    .into_iter()
    .map(|name| {
      let found: Vec<Option<&Fact>> =
        lookups.iter().map(|m| m.get(name).copied()).collect();
      compare_fact(name, &found, labels)
    })
    .collect()
}

fn compare_fact(
  name: &str,
  found: &[Option<&Fact>],
  labels: &[&str],
) -> FactComparison {
  let sides = found
    .iter()
    .map(|f| match f {
      None => SideEntry::Absent,
      Some(Fact::Leaf { value, .. }) => SideEntry::Leaf {
        value: value.clone(),
      },
      Some(Fact::Category { .. }) => SideEntry::Category,
    })
    .collect();

  let present = found.iter().flatten().count();
  let categories = found.iter().flatten().filter(|f| f.is_category()).count();
  let leaves = present - categories;

  // Absent and leaf sides contribute an empty child level.
  let children = if categories > 0 {
    let child_levels: Vec<&[Fact]> = found
      .iter()
      .map(|f| f.and_then(Fact::values).unwrap_or(&[]))
      .collect();
    compare_level(&child_levels, labels)
  } else {
    Vec::new()
  };

  let state = if present == 1 && found.len() > 1 {
    let idx = found.iter().position(Option::is_some).unwrap_or_default();
    FactState::OnlyIn {
      side: labels[idx].to_string(),
    }
  } else if leaves > 0 && categories > 0 {
    FactState::Incomparable
  } else if present < found.len() {
    FactState::Different
  } else if categories > 0 {
    if children.iter().all(|c| c.state == FactState::Same) {
      FactState::Same
    } else {
      FactState::Different
    }
  } else {
    let mut values = found.iter().flatten().filter_map(|f| f.value());
    let first = values.next();
    if values.all(|v| Some(v) == first) {
      FactState::Same
    } else {
      FactState::Different
    }
  };

  FactComparison {
    name: name.to_string(),
    state,
    sides,
    children,
  }
}

fn join_path(prefix: &str, name: &str) -> String {
  if prefix.is_empty() {
    name.to_string()
  } else {
    format!("{prefix}.{name}")
  }
}

fn first_incomparable(facts: &[FactComparison], prefix: &str) -> Option<String> {
  facts.iter().find_map(|f| {
    let path = join_path(prefix, &f.name);
    if f.state == FactState::Incomparable {
      Some(path)
    } else {
      first_incomparable(&f.children, &path)
    }
  })
}

// ─── Union merge ─────────────────────────────────────────────────────────────

/// The union of several fact sets, minus the facts they disagree on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergedFacts {
  /// Canonically ordered merged facts.
  pub facts:     Vec<Fact>,
  /// Dotted paths of facts withheld because sides disagreed on the value or
  /// on whether the fact is a category.
  pub conflicts: Vec<String>,
}

/// Merge fact sets by union. Leaves held with the same value wherever they
/// appear are kept; categories are merged child by child. Leaves with
/// differing values and leaf/category clashes are dropped and reported.
pub fn merge_union(sets: &[FactSet<'_>]) -> MergedFacts {
  let levels: Vec<&[Fact]> = sets.iter().map(|s| s.facts).collect();
  let mut conflicts = Vec::new();
  let facts = merge_level(&levels, "", &mut conflicts);
  MergedFacts { facts, conflicts }
}

fn merge_level(
  levels: &[&[Fact]],
  prefix: &str,
  conflicts: &mut Vec<String>,
) -> Vec<Fact> {
  let lookups: Vec<_> = levels.iter().map(|l| lookup(l)).collect();
  let names: BTreeSet<&str> = lookups.iter().flat_map(|m| m.keys().copied()).collect();

  let mut merged = Vec::new();
  for name in names {
    let path = join_path(prefix, name);
    let present: Vec<&Fact> = lookups.iter().filter_map(|m| m.get(name).copied()).collect();

    if present.iter().all(|f| f.is_category()) {
      let child_levels: Vec<&[Fact]> =
        present.iter().filter_map(|f| f.values()).collect();
      let values = merge_level(&child_levels, &path, conflicts);
      merged.push(Fact::category(name, values));
    } else if present.iter().any(|f| f.is_category()) {
      conflicts.push(path);
    } else {
      let mut values = present.iter().filter_map(|f| f.value());
      match values.next() {
        Some(first) if values.all(|v| v == first) => merged.push(Fact::leaf(name, first)),
        _ => conflicts.push(path),
      }
    }
  }
  merged
}

#[cfg(test)]
mod tests {
  use proptest::prelude::*;

  use super::*;

  fn state_of<'a>(cmp: &'a Comparison, name: &str) -> &'a FactComparison {
    cmp.facts.iter().find(|f| f.name == name).unwrap()
  }

  #[test]
  fn differing_leaf_values_retained() {
    let a = vec![Fact::leaf("arch", "x86")];
    let b = vec![Fact::leaf("arch", "arm")];
    let cmp = diff(&[FactSet::new("A", &a), FactSet::new("B", &b)]);

    let arch = state_of(&cmp, "arch");
    assert_eq!(arch.state, FactState::Different);
    assert_eq!(arch.sides, vec![
      SideEntry::Leaf { value: "x86".into() },
      SideEntry::Leaf { value: "arm".into() },
    ]);
  }

  #[test]
  fn leaf_against_category_is_incomparable() {
    let a = vec![Fact::category("cpu", vec![Fact::leaf("sockets", "2")])];
    let b = vec![Fact::leaf("cpu", "2")];
    let cmp = diff(&[FactSet::new("A", &a), FactSet::new("B", &b)]);

    assert_eq!(state_of(&cmp, "cpu").state, FactState::Incomparable);
    assert!(matches!(cmp.ensure_comparable(), Err(Error::TypeMismatch(p)) if p == "cpu"));
  }

  #[test]
  fn nested_incomparable_reported_by_path() {
    let a = vec![Fact::category("net", vec![Fact::leaf("eth0", "up")])];
    let b = vec![Fact::category("net", vec![Fact::category("eth0", vec![])])];
    let cmp = diff(&[FactSet::new("A", &a), FactSet::new("B", &b)]);

    assert_eq!(state_of(&cmp, "net").state, FactState::Different);
    assert!(matches!(cmp.ensure_comparable(), Err(Error::TypeMismatch(p)) if p == "net.eth0"));
  }

  #[test]
  fn only_in_names_the_side() {
    let a = vec![Fact::leaf("arch", "x86"), Fact::leaf("kernel", "5.14")];
    let b = vec![Fact::leaf("arch", "x86")];
    let cmp = diff(&[FactSet::new("A", &a), FactSet::new("B", &b)]);

    assert_eq!(state_of(&cmp, "arch").state, FactState::Same);
    assert_eq!(state_of(&cmp, "kernel").state, FactState::OnlyIn {
      side: "A".into(),
    });
    assert_eq!(state_of(&cmp, "kernel").sides[1], SideEntry::Absent);
  }

  #[test]
  fn missing_from_some_of_three_sides_is_different() {
    let a = vec![Fact::leaf("arch", "x86")];
    let b = vec![Fact::leaf("arch", "x86")];
    let c = vec![];
    let cmp = diff(&[
      FactSet::new("A", &a),
      FactSet::new("B", &b),
      FactSet::new("C", &c),
    ]);
    assert_eq!(state_of(&cmp, "arch").state, FactState::Different);
  }

  #[test]
  fn category_with_changed_child_is_different() {
    let a = vec![Fact::category("cpu", vec![
      Fact::leaf("cores", "4"),
      Fact::leaf("sockets", "2"),
    ])];
    let b = vec![Fact::category("cpu", vec![
      Fact::leaf("cores", "4"),
      Fact::leaf("sockets", "1"),
    ])];
    let cmp = diff(&[FactSet::new("A", &a), FactSet::new("B", &b)]);

    let cpu = state_of(&cmp, "cpu");
    assert_eq!(cpu.state, FactState::Different);
    assert_eq!(cpu.sides, vec![SideEntry::Category, SideEntry::Category]);
    assert_eq!(cpu.children[0].state, FactState::Same);
    assert_eq!(cpu.children[1].state, FactState::Different);
  }

  #[test]
  fn empty_inputs_yield_empty_diff() {
    let cmp = diff(&[FactSet::new("A", &[]), FactSet::new("B", &[])]);
    assert!(cmp.facts.is_empty());
    assert_eq!(cmp.sides, vec!["A", "B"]);
  }

  #[test]
  fn single_side_is_all_same() {
    let a = vec![Fact::leaf("arch", "x86"), Fact::category("cpu", vec![])];
    let cmp = diff(&[FactSet::new("A", &a)]);
    assert!(cmp.all_same());
  }

  #[test]
  fn comparison_serialises_flat_state() {
    let a = vec![Fact::leaf("arch", "x86")];
    let cmp = diff(&[FactSet::new("A", &a), FactSet::new("B", &[])]);
    let json = serde_json::to_value(&cmp.facts[0]).unwrap();
    assert_eq!(json["state"], "only_in");
    assert_eq!(json["side"], "A");
    assert_eq!(json["sides"][1]["kind"], "absent");
  }

  // ── Union merge ───────────────────────────────────────────────────────

  #[test]
  fn merge_keeps_agreeing_and_one_sided_facts() {
    let a = vec![
      Fact::leaf("arch", "x86"),
      Fact::leaf("kernel", "5.14"),
      Fact::category("cpu", vec![Fact::leaf("sockets", "2")]),
    ];
    let b = vec![
      Fact::leaf("arch", "x86"),
      Fact::leaf("kernel", "6.1"),
      Fact::category("cpu", vec![Fact::leaf("cores", "4")]),
      Fact::leaf("os", "rhel"),
    ];
    let merged = merge_union(&[FactSet::new("a", &a), FactSet::new("b", &b)]);

    assert_eq!(merged.facts, vec![
      Fact::leaf("arch", "x86"),
      Fact::category("cpu", vec![Fact::leaf("cores", "4"), Fact::leaf("sockets", "2")]),
      Fact::leaf("os", "rhel"),
    ]);
    assert_eq!(merged.conflicts, vec!["kernel"]);
  }

  #[test]
  fn merge_reports_nested_and_type_conflicts() {
    let a = vec![
      Fact::category("cpu", vec![Fact::leaf("sockets", "2")]),
      Fact::leaf("net", "none"),
    ];
    let b = vec![
      Fact::category("cpu", vec![Fact::leaf("sockets", "1")]),
      Fact::category("net", vec![]),
    ];
    let merged = merge_union(&[FactSet::new("a", &a), FactSet::new("b", &b)]);
    assert_eq!(merged.facts, vec![Fact::category("cpu", vec![])]);
    assert_eq!(merged.conflicts, vec!["cpu.sockets", "net"]);
  }

  // ── Properties ────────────────────────────────────────────────────────

  fn arb_facts() -> impl Strategy<Value = Vec<Fact>> {
    let leaf = ("[a-d]{1,2}", "[0-9]{1,2}").prop_map(|(n, v)| Fact::leaf(n, v));
    let fact = leaf.prop_recursive(2, 16, 3, |inner| {
      ("[a-d]{1,2}", prop::collection::vec(inner, 0..3))
        .prop_map(|(n, vs)| Fact::category(n, vs))
    });
    prop::collection::vec(fact, 0..5).prop_filter_map("duplicate names", |facts| {
      crate::normalize::normalize_facts(facts).ok()
    })
  }

  fn swap_only_in(facts: &[FactComparison]) -> Vec<FactComparison> {
    facts
      .iter()
      .map(|f| FactComparison {
        name:     f.name.clone(),
        state:    match &f.state {
          FactState::OnlyIn { side } if side == "A" => FactState::OnlyIn { side: "B".into() },
          FactState::OnlyIn { .. } => FactState::OnlyIn { side: "A".into() },
          other => other.clone(),
        },
        sides:    f.sides.iter().rev().cloned().collect(),
        children: swap_only_in(&f.children),
      })
      .collect()
  }

  proptest! {
    #[test]
    fn diff_is_reflexive(facts in arb_facts()) {
      let cmp = diff(&[FactSet::new("A", &facts), FactSet::new("B", &facts)]);
      prop_assert!(cmp.all_same());
    }

    #[test]
    fn swapping_sides_swaps_only_in(a in arb_facts(), b in arb_facts()) {
      let ab = diff(&[FactSet::new("A", &a), FactSet::new("B", &b)]);
      let ba = diff(&[FactSet::new("A", &b), FactSet::new("B", &a)]);
      prop_assert_eq!(swap_only_in(&ab.facts), ba.facts);
    }
  }
}
