//! Handlers for the systems mapped to a baseline.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/baselines/{id}/systems` | Optional `?group_ids=..&group_names=..` |
//! | `POST`   | `/baselines/{id}/systems` | Body: `{"system_ids":[..]}` |
//! | `POST`   | `/baselines/{id}/systems/deletion_request` | Body: `{"system_ids":[..]}` |
//! | `DELETE` | `/baselines/{id}/systems/{system_ids}` | Comma-separated ids |
//!
//! Listings carry a top-level `system_ids` array alongside the page, so a
//! client can post it straight back to a `deletion_request`.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use baseline_core::{
  inventory::InventoryFetcher,
  service,
  store::BaselineStore,
  system::{GroupFilter, MappedSystem},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  AppState,
  error::ApiError,
  identity::{Caller, Permission},
  links::Page,
};

/// Split a comma-separated filter. Empty entries are kept: they select
/// systems without any group.
fn split_filter(raw: Option<&str>) -> Vec<String> {
  raw
    .map(|s| s.split(',').map(|p| p.trim().to_string()).collect())
    .unwrap_or_default()
}

/// Mapped systems plus their bare ids.
#[derive(Debug, Serialize)]
pub struct MappedSystems {
  pub system_ids: Vec<Uuid>,
  #[serde(flatten)]
  pub page:       Page<MappedSystem>,
}

impl From<Vec<MappedSystem>> for MappedSystems {
  fn from(systems: Vec<MappedSystem>) -> Self {
    Self {
      system_ids: systems.iter().map(|s| s.system_id).collect(),
      page:       Page::all(systems),
    }
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub group_ids:   Option<String>,
  pub group_names: Option<String>,
}

/// `GET /baselines/{id}/systems[?group_ids=..&group_names=..]`
pub async fn list<S, I>(
  State(state): State<AppState<S, I>>,
  caller: Caller,
  Path(id): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Json<MappedSystems>, ApiError>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  caller.require(&*state.access, &[Permission::BaselinesRead])?;
  let id = service::parse_id(&id)?;
  let filter = GroupFilter {
    group_ids:   split_filter(params.group_ids.as_deref()),
    group_names: split_filter(params.group_names.as_deref()),
  };
  let systems = service::list_mapped_systems(&*state.store, &caller.account, id, &filter).await?;
  Ok(Json(systems.into()))
}

// ─── Add ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SystemIds {
  pub system_ids: Vec<String>,
}

/// `POST /baselines/{id}/systems`, body: `{"system_ids":[..]}`
pub async fn add<S, I>(
  State(state): State<AppState<S, I>>,
  caller: Caller,
  Path(id): Path<String>,
  Json(body): Json<SystemIds>,
) -> Result<Json<MappedSystems>, ApiError>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  caller.require(&*state.access, &[
    Permission::BaselinesWrite,
    Permission::InventoryRead,
  ])?;
  let id = service::parse_id(&id)?;
  let system_ids = service::parse_id_list(&body.system_ids)?;
  let mapped = service::associate_systems(
    &*state.store,
    &*state.inventory,
    &caller.account,
    id,
    &system_ids,
  )
  .await?;
  Ok(Json(mapped.into()))
}

// ─── Remove ───────────────────────────────────────────────────────────────────

async fn remove_ids<S: BaselineStore>(
  store: &S,
  account: &str,
  baseline_id: Uuid,
  system_ids: &[Uuid],
) -> Result<Json<Value>, ApiError> {
  let removed = service::remove_mapped_systems(store, account, baseline_id, system_ids).await?;
  Ok(Json(json!({ "deleted": removed })))
}

/// `DELETE /baselines/{id}/systems/{system_ids}`
pub async fn remove<S, I>(
  State(state): State<AppState<S, I>>,
  caller: Caller,
  Path((id, system_ids)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  caller.require(&*state.access, &[Permission::BaselinesWrite])?;
  let id = service::parse_id(&id)?;
  let system_ids = service::parse_ids(&system_ids)?;
  remove_ids(&*state.store, &caller.account, id, &system_ids).await
}

/// `POST /baselines/{id}/systems/deletion_request`, body: `{"system_ids":[..]}`
pub async fn deletion_request<S, I>(
  State(state): State<AppState<S, I>>,
  caller: Caller,
  Path(id): Path<String>,
  Json(body): Json<SystemIds>,
) -> Result<Json<Value>, ApiError>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  caller.require(&*state.access, &[Permission::BaselinesWrite])?;
  let id = service::parse_id(&id)?;
  let system_ids = service::parse_id_list(&body.system_ids)?;
  remove_ids(&*state.store, &caller.account, id, &system_ids).await
}
