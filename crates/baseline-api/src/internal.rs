//! Internal endpoints for other platform services. Mounted under the
//! internal prefix.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/baselines?system_id=..` | Ids of baselines a system is mapped to |
//! | `POST`   | `/systems/deletion_request` | Body: `{"system_ids":[..]}` |
//! | `PATCH`  | `/systems/{id}` | Body: `{"groups":[..]}`; omitted fields untouched |
//! | `DELETE` | `/systems/{ids}` | Unmap from every baseline |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use baseline_core::{
  inventory::InventoryFetcher,
  service,
  store::BaselineStore,
  system::MappedSystemUpdate,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  AppState,
  error::ApiError,
  identity::{Caller, Permission},
  systems::SystemIds,
};

#[derive(Debug, Deserialize)]
pub struct SystemParams {
  pub system_id: String,
}

/// `GET /baselines?system_id=..`
pub async fn baselines_for_system<S, I>(
  State(state): State<AppState<S, I>>,
  caller: Caller,
  Query(params): Query<SystemParams>,
) -> Result<Json<Vec<Uuid>>, ApiError>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  caller.require(&*state.access, &[Permission::BaselinesRead])?;
  let system_id = service::parse_id(params.system_id.trim())?;
  let ids = service::baselines_for_system(&*state.store, &caller.account, system_id).await?;
  Ok(Json(ids))
}

/// `DELETE /systems/{ids}`
pub async fn delete_systems<S, I>(
  State(state): State<AppState<S, I>>,
  caller: Caller,
  Path(ids): Path<String>,
) -> Result<Json<Value>, ApiError>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  caller.require(&*state.access, &[Permission::BaselinesWrite])?;
  let ids = service::parse_ids(&ids)?;
  let removed = service::remove_systems_everywhere(&*state.store, &caller.account, &ids).await?;
  Ok(Json(json!({ "deleted": removed })))
}

/// `POST /systems/deletion_request`, body: `{"system_ids":[..]}`
pub async fn deletion_request<S, I>(
  State(state): State<AppState<S, I>>,
  caller: Caller,
  Json(body): Json<SystemIds>,
) -> Result<Json<Value>, ApiError>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  caller.require(&*state.access, &[Permission::BaselinesWrite])?;
  let ids = service::parse_id_list(&body.system_ids)?;
  let removed = service::remove_systems_everywhere(&*state.store, &caller.account, &ids).await?;
  Ok(Json(json!({ "deleted": removed })))
}

/// `PATCH /systems/{id}`, body: `{"groups":[{"id":..,"name":..}]}`
///
/// Responds with the ids of the baselines the system is mapped to.
pub async fn update_system<S, I>(
  State(state): State<AppState<S, I>>,
  caller: Caller,
  Path(id): Path<String>,
  Json(update): Json<MappedSystemUpdate>,
) -> Result<Json<Vec<Uuid>>, ApiError>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  caller.require(&*state.access, &[Permission::BaselinesWrite])?;
  let system_id = service::parse_id(&id)?;
  let baseline_ids =
    service::update_system_groups(&*state.store, &caller.account, system_id, update).await?;
  Ok(Json(baseline_ids))
}
