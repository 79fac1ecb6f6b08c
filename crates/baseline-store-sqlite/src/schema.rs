//! SQL schema for the baseline SQLite store.
//!
//! Executed once at connection startup; `PRAGMA user_version` records the
//! schema revision.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS system_baselines (
    id             TEXT PRIMARY KEY,
    account        TEXT NOT NULL,
    display_name   TEXT NOT NULL,
    created_on     TEXT NOT NULL,   -- RFC 3339 UTC
    modified_on    TEXT NOT NULL,   -- RFC 3339 UTC
    baseline_facts TEXT NOT NULL,   -- canonical JSON fact tree
    UNIQUE (account, display_name)
);

CREATE TABLE IF NOT EXISTS system_baseline_mapped_systems (
    id                 TEXT PRIMARY KEY,
    account            TEXT NOT NULL,
    system_baseline_id TEXT NOT NULL
                       REFERENCES system_baselines(id) ON DELETE CASCADE,
    system_id          TEXT NOT NULL,
    system_groups      TEXT NOT NULL DEFAULT '[]',   -- JSON [{id, name}]
    UNIQUE (system_baseline_id, system_id)
);

CREATE INDEX IF NOT EXISTS baselines_account_idx ON system_baselines(account);
CREATE INDEX IF NOT EXISTS mapped_system_idx     ON system_baseline_mapped_systems(system_id);

PRAGMA user_version = 1;
";
