//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings, and
//! fact trees and group lists compact JSON.

use baseline_core::{
  baseline::Baseline,
  fact::Fact,
  system::{MappedSystem, SystemGroup},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_facts(facts: &[Fact]) -> Result<String> {
  Ok(serde_json::to_string(facts)?)
}

pub fn encode_groups(groups: &[SystemGroup]) -> Result<String> {
  Ok(serde_json::to_string(groups)?)
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE
/// '\'` pattern, and wrap in `%` for substring matching.
pub fn like_pattern(filter: &str) -> String {
  let mut pattern = String::with_capacity(filter.len() + 2);
  pattern.push('%');
  for c in filter.chars() {
    if matches!(c, '%' | '_' | '\\') {
      pattern.push('\\');
    }
    pattern.push(c);
  }
  pattern.push('%');
  pattern
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const BASELINE_COLUMNS: &str =
  "id, account, display_name, created_on, modified_on, baseline_facts";

/// Raw strings read directly from a `system_baselines` row.
pub struct RawBaseline {
  pub id:             String,
  pub account:        String,
  pub display_name:   String,
  pub created_on:     String,
  pub modified_on:    String,
  pub baseline_facts: String,
}

impl RawBaseline {
  /// Read a row selected with [`BASELINE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      account:        row.get(1)?,
      display_name:   row.get(2)?,
      created_on:     row.get(3)?,
      modified_on:    row.get(4)?,
      baseline_facts: row.get(5)?,
    })
  }

  pub fn into_baseline(self) -> Result<Baseline> {
    Ok(Baseline {
      id:             decode_uuid(&self.id)?,
      account:        self.account,
      display_name:   self.display_name,
      baseline_facts: serde_json::from_str(&self.baseline_facts)?,
      created_on:     decode_dt(&self.created_on)?,
      modified_on:    decode_dt(&self.modified_on)?,
    })
  }
}

/// Raw strings read directly from a `system_baseline_mapped_systems` row.
pub struct RawMappedSystem {
  pub baseline_id: String,
  pub system_id:   String,
  pub groups:      String,
}

impl RawMappedSystem {
  pub fn into_mapped_system(self) -> Result<MappedSystem> {
    Ok(MappedSystem {
      baseline_id: decode_uuid(&self.baseline_id)?,
      system_id:   decode_uuid(&self.system_id)?,
      groups:      serde_json::from_str(&self.groups)?,
    })
  }
}
