//! Server configuration and startup helpers for the `server` binary.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use baseline_api::MountConfig;
use baseline_core::inventory::{StaticInventory, SystemProfileDocument};
use serde::Deserialize;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Settings read from `config.toml` and `BASELINE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  #[serde(default = "default_store_path")]
  pub store_path:           PathBuf,
  #[serde(default = "default_path_prefix")]
  pub path_prefix:          String,
  #[serde(default = "default_internal_path_prefix")]
  pub internal_path_prefix: String,
  /// JSON array of system profile documents served as the inventory. Without
  /// it the inventory is empty and every system lookup reports not found.
  #[serde(default)]
  pub inventory_path:       Option<PathBuf>,
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/system-baseline/baselines.db") }

fn default_path_prefix() -> String { MountConfig::default().path_prefix }

fn default_internal_path_prefix() -> String { MountConfig::default().internal_path_prefix }

impl ServerConfig {
  pub fn mount(&self) -> MountConfig {
    MountConfig {
      path_prefix:          self.path_prefix.clone(),
      internal_path_prefix: self.internal_path_prefix.clone(),
    }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Layer the optional config file under `BASELINE_*` environment variables.
pub fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("BASELINE"))
    .build()
    .context("failed to read config file")?
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}

// ─── Inventory ────────────────────────────────────────────────────────────────

/// Load the static inventory, or an empty one when no path is configured.
pub fn load_inventory(path: Option<&Path>) -> anyhow::Result<StaticInventory> {
  let Some(path) = path else {
    return Ok(StaticInventory::default());
  };
  let path = expand_tilde(path);
  let raw = std::fs::read(&path)
    .with_context(|| format!("failed to read inventory at {path:?}"))?;
  let systems: Vec<SystemProfileDocument> = serde_json::from_slice(&raw)
    .with_context(|| format!("failed to parse inventory at {path:?}"))?;
  Ok(StaticInventory::new(systems))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
