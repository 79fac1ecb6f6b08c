//! [`SqliteStore`], the SQLite implementation of [`BaselineStore`].

use std::{collections::HashMap, path::Path};

use baseline_core::{
  baseline::{Baseline, BaselinePage, BaselineQuery, NewBaseline, OrderBy},
  store::BaselineStore,
  system::{MappedSystem, SystemGroup},
};
use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    BASELINE_COLUMNS, RawBaseline, RawMappedSystem, decode_uuid, encode_dt,
    encode_facts, encode_groups, encode_uuid, like_pattern,
  },
  error::is_unique_violation,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A baseline store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Map a failed baseline write, turning a uniqueness violation into
/// [`Error::DuplicateDisplayName`].
fn write_error(err: tokio_rusqlite::Error, display_name: &str) -> Error {
  if is_unique_violation(&err) {
    Error::DuplicateDisplayName(display_name.to_string())
  } else {
    Error::Database(err)
  }
}

/// `?2, ?3, …` placeholders for an `IN` list following `offset` fixed
/// parameters.
fn placeholders(offset: usize, count: usize) -> String {
  (1..=count)
    .map(|i| format!("?{}", offset + i))
    .collect::<Vec<_>>()
    .join(", ")
}

fn account_and_ids(account: &str, ids: &[Uuid]) -> Vec<String> {
  std::iter::once(account.to_string())
    .chain(ids.iter().copied().map(encode_uuid))
    .collect()
}

fn order_clause(query: &BaselineQuery) -> String {
  let column = match query.order_by {
    OrderBy::DisplayName => "display_name",
    OrderBy::Updated => "modified_on",
  };
  let direction = query.order_how.as_str();
  format!("ORDER BY {column} {direction}, id {direction}")
}

// ─── BaselineStore impl ──────────────────────────────────────────────────────

impl BaselineStore for SqliteStore {
  type Error = Error;

  // ── Baselines ─────────────────────────────────────────────────────────────

  async fn create_baseline(&self, input: NewBaseline) -> Result<Baseline> {
    let now = Utc::now();
    let baseline = Baseline {
      id:             Uuid::new_v4(),
      account:        input.account,
      display_name:   input.display_name,
      baseline_facts: input.baseline_facts,
      created_on:     now,
      modified_on:    now,
    };

    let id_str    = encode_uuid(baseline.id);
    let account   = baseline.account.clone();
    let name      = baseline.display_name.clone();
    let at_str    = encode_dt(now);
    let facts_str = encode_facts(&baseline.baseline_facts)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO system_baselines
             (id, account, display_name, created_on, modified_on, baseline_facts)
           VALUES (?1, ?2, ?3, ?4, ?4, ?5)",
          rusqlite::params![id_str, account, name, at_str, facts_str],
        )?;
        Ok(())
      })
      .await
      .map_err(|e| write_error(e, &baseline.display_name))?;

    debug!(baseline_id = %baseline.id, "inserted baseline row");
    Ok(baseline)
  }

  async fn get_baseline<'a>(&'a self, account: &'a str, id: Uuid) -> Result<Option<Baseline>> {
    let account = account.to_string();
    let id_str = encode_uuid(id);

    let raw: Option<RawBaseline> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {BASELINE_COLUMNS} FROM system_baselines
               WHERE account = ?1 AND id = ?2"
            ),
            rusqlite::params![account, id_str],
            RawBaseline::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawBaseline::into_baseline).transpose()
  }

  async fn get_baselines<'a>(
    &'a self,
    account: &'a str,
    ids: &'a [Uuid],
  ) -> Result<Vec<Baseline>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let params = account_and_ids(account, ids);
    let sql = format!(
      "SELECT {BASELINE_COLUMNS} FROM system_baselines
       WHERE account = ?1 AND id IN ({})",
      placeholders(1, ids.len())
    );

    let raws: Vec<RawBaseline> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawBaseline::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBaseline::into_baseline).collect()
  }

  async fn list_baselines<'a>(
    &'a self,
    account: &'a str,
    query: &'a BaselineQuery,
  ) -> Result<BaselinePage> {
    let account = account.to_string();
    let pattern = query.display_name_filter().map(like_pattern);
    // Counts past i64::MAX clamp rather than wrap; a negative LIMIT would
    // mean "no limit" to SQLite.
    let limit_val = query
      .limit
      .map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
    let offset_val = i64::try_from(query.offset.unwrap_or(0)).unwrap_or(i64::MAX);
    let order = order_clause(query);

    let (total, raws): (i64, Vec<RawBaseline>) = self
      .conn
      .call(move |conn| {
        let filter = "account = ?1 AND (?2 IS NULL OR display_name LIKE ?2 ESCAPE '\\')";

        let total: i64 = conn.query_row(
          &format!("SELECT COUNT(*) FROM system_baselines WHERE {filter}"),
          rusqlite::params![account, pattern],
          |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
          "SELECT {BASELINE_COLUMNS} FROM system_baselines
           WHERE {filter}
           {order}
           LIMIT ?3 OFFSET ?4"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![account, pattern, limit_val, offset_val],
            RawBaseline::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total, rows))
      })
      .await?;

    Ok(BaselinePage {
      baselines:       raws
        .into_iter()
        .map(RawBaseline::into_baseline)
        .collect::<Result<_>>()?,
      total_available: total as usize,
    })
  }

  async fn find_by_display_name<'a>(
    &'a self,
    account: &'a str,
    display_name: &'a str,
  ) -> Result<Option<Baseline>> {
    let account = account.to_string();
    let name = display_name.to_string();

    let raw: Option<RawBaseline> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {BASELINE_COLUMNS} FROM system_baselines
               WHERE account = ?1 AND display_name = ?2"
            ),
            rusqlite::params![account, name],
            RawBaseline::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawBaseline::into_baseline).transpose()
  }

  async fn update_baseline(&self, baseline: Baseline) -> Result<Option<Baseline>> {
    let id_str    = encode_uuid(baseline.id);
    let account   = baseline.account.clone();
    let name      = baseline.display_name.clone();
    let at_str    = encode_dt(baseline.modified_on);
    let facts_str = encode_facts(&baseline.baseline_facts)?;

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE system_baselines
           SET display_name = ?3, baseline_facts = ?4, modified_on = ?5
           WHERE account = ?1 AND id = ?2",
          rusqlite::params![account, id_str, name, facts_str, at_str],
        )?)
      })
      .await
      .map_err(|e| write_error(e, &baseline.display_name))?;

    Ok((changed > 0).then_some(baseline))
  }

  async fn delete_baselines<'a>(&'a self, account: &'a str, ids: &'a [Uuid]) -> Result<usize> {
    let account = account.to_string();
    let id_strs: Vec<String> = ids.iter().copied().map(encode_uuid).collect();

    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for id in &id_strs {
          deleted += tx.execute(
            "DELETE FROM system_baselines WHERE account = ?1 AND id = ?2",
            rusqlite::params![account, id],
          )?;
        }
        tx.commit()?;
        Ok(deleted)
      })
      .await?;

    Ok(deleted)
  }

  // ── Mapped systems ────────────────────────────────────────────────────────

  async fn mapped_system_counts<'a>(
    &'a self,
    account: &'a str,
    baseline_ids: &'a [Uuid],
  ) -> Result<HashMap<Uuid, usize>> {
    if baseline_ids.is_empty() {
      return Ok(HashMap::new());
    }
    let params = account_and_ids(account, baseline_ids);
    let sql = format!(
      "SELECT system_baseline_id, COUNT(*) FROM system_baseline_mapped_systems
       WHERE account = ?1 AND system_baseline_id IN ({})
       GROUP BY system_baseline_id",
      placeholders(1, baseline_ids.len())
    );

    let rows: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok((row.get(0)?, row.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(id, count)| -> Result<(Uuid, usize)> {
        Ok((decode_uuid(&id)?, count as usize))
      })
      .collect()
  }

  async fn add_mapped_systems<'a>(
    &'a self,
    account: &'a str,
    baseline_id: Uuid,
    systems: Vec<(Uuid, Vec<SystemGroup>)>,
  ) -> Result<Vec<MappedSystem>> {
    let owner = account.to_string();
    let baseline_str = encode_uuid(baseline_id);
    let rows = systems
      .iter()
      .map(|(system_id, groups)| Ok((encode_uuid(*system_id), encode_groups(groups)?)))
      .collect::<Result<Vec<_>>>()?;

    let found = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM system_baselines WHERE account = ?1 AND id = ?2",
            rusqlite::params![owner, baseline_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(false);
        }

        for (system_id, groups) in &rows {
          tx.execute(
            "INSERT INTO system_baseline_mapped_systems
               (id, account, system_baseline_id, system_id, system_groups)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (system_baseline_id, system_id)
             DO UPDATE SET system_groups = excluded.system_groups",
            rusqlite::params![
              encode_uuid(Uuid::new_v4()),
              owner,
              baseline_str,
              system_id,
              groups
            ],
          )?;
        }
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !found {
      return Err(Error::BaselineNotFound(baseline_id));
    }
    self.list_mapped_systems(account, baseline_id).await
  }

  async fn list_mapped_systems<'a>(
    &'a self,
    account: &'a str,
    baseline_id: Uuid,
  ) -> Result<Vec<MappedSystem>> {
    let account = account.to_string();
    let baseline_str = encode_uuid(baseline_id);

    let raws: Vec<RawMappedSystem> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT system_baseline_id, system_id, system_groups
           FROM system_baseline_mapped_systems
           WHERE account = ?1 AND system_baseline_id = ?2
           ORDER BY system_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![account, baseline_str], |row| {
            Ok(RawMappedSystem {
              baseline_id: row.get(0)?,
              system_id:   row.get(1)?,
              groups:      row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMappedSystem::into_mapped_system).collect()
  }

  async fn delete_mapped_systems<'a>(
    &'a self,
    account: &'a str,
    baseline_id: Uuid,
    system_ids: &'a [Uuid],
  ) -> Result<usize> {
    let account = account.to_string();
    let baseline_str = encode_uuid(baseline_id);
    let system_strs: Vec<String> = system_ids.iter().copied().map(encode_uuid).collect();

    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for system_id in &system_strs {
          deleted += tx.execute(
            "DELETE FROM system_baseline_mapped_systems
             WHERE account = ?1 AND system_baseline_id = ?2 AND system_id = ?3",
            rusqlite::params![account, baseline_str, system_id],
          )?;
        }
        tx.commit()?;
        Ok(deleted)
      })
      .await?;

    Ok(deleted)
  }

  async fn delete_systems<'a>(&'a self, account: &'a str, system_ids: &'a [Uuid]) -> Result<usize> {
    let account = account.to_string();
    let system_strs: Vec<String> = system_ids.iter().copied().map(encode_uuid).collect();

    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for system_id in &system_strs {
          deleted += tx.execute(
            "DELETE FROM system_baseline_mapped_systems
             WHERE account = ?1 AND system_id = ?2",
            rusqlite::params![account, system_id],
          )?;
        }
        tx.commit()?;
        Ok(deleted)
      })
      .await?;

    Ok(deleted)
  }

  async fn baselines_for_system<'a>(&'a self, account: &'a str, system_id: Uuid) -> Result<Vec<Uuid>> {
    let account = account.to_string();
    let system_str = encode_uuid(system_id);

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT system_baseline_id FROM system_baseline_mapped_systems
           WHERE account = ?1 AND system_id = ?2
           ORDER BY system_baseline_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![account, system_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids.iter().map(String::as_str).map(decode_uuid).collect()
  }

  async fn update_system_groups<'a>(
    &'a self,
    account: &'a str,
    system_id: Uuid,
    groups: Vec<SystemGroup>,
  ) -> Result<usize> {
    let account = account.to_string();
    let system_str = encode_uuid(system_id);
    let groups_str = encode_groups(&groups)?;

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE system_baseline_mapped_systems SET system_groups = ?3
           WHERE account = ?1 AND system_id = ?2",
          rusqlite::params![account, system_str, groups_str],
        )?)
      })
      .await?;

    Ok(changed)
  }
}
