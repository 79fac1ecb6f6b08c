//! Handlers for `/baselines` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/baselines` | Filter, sort and page; summaries only |
//! | `POST`   | `/baselines` | Body: `display_name` plus `baseline_facts` or `inventory_uuids` |
//! | `POST`   | `/baselines/deletion_request` | Body: `{"baseline_ids":[..]}` |
//! | `GET`    | `/baselines/{ids}` | Comma-separated ids, full facts |
//! | `POST`   | `/baselines/{id}` | Copy; optional `?display_name=` |
//! | `PATCH`  | `/baselines/{id}` | Body: `{"display_name":..,"baseline_facts":[..]}` |
//! | `DELETE` | `/baselines/{ids}` | All-or-nothing |

use axum::{
  Json,
  extract::{OriginalUri, Path, Query, State},
};
use baseline_core::{
  ValidationError,
  baseline::{Baseline, BaselineQuery, OrderBy, OrderHow},
  fact::{Fact, RawFact},
  inventory::InventoryFetcher,
  service::{self, BaselinePatch},
  store::BaselineStore,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  AppState,
  error::{ApiError, store_error},
  identity::{Caller, Permission},
  links::{DEFAULT_LIMIT, MAX_LIMIT, Meta, Page, page_links},
};

// ─── Views ────────────────────────────────────────────────────────────────────

/// A baseline as returned over the wire. `baseline_facts` is omitted from
/// list summaries.
#[derive(Debug, Clone, Serialize)]
pub struct BaselineView {
  pub id:                  Uuid,
  pub account:             String,
  pub display_name:        String,
  pub fact_count:          usize,
  pub mapped_system_count: usize,
  pub created:             DateTime<Utc>,
  pub updated:             DateTime<Utc>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub baseline_facts:      Option<Vec<Fact>>,
}

impl BaselineView {
  fn new(baseline: Baseline, mapped_system_count: usize, with_facts: bool) -> Self {
    Self {
      id: baseline.id,
      fact_count: baseline.fact_count(),
      mapped_system_count,
      created: baseline.created_on,
      updated: baseline.modified_on,
      baseline_facts: with_facts.then_some(baseline.baseline_facts),
      account: baseline.account,
      display_name: baseline.display_name,
    }
  }
}

/// Attach mapped-system counts to each baseline.
async fn views<S: BaselineStore>(
  store: &S,
  account: &str,
  baselines: Vec<Baseline>,
  with_facts: bool,
) -> Result<Vec<BaselineView>, ApiError> {
  let ids: Vec<Uuid> = baselines.iter().map(|b| b.id).collect();
  let counts = store
    .mapped_system_counts(account, &ids)
    .await
    .map_err(store_error)?;
  Ok(
    baselines
      .into_iter()
      .map(|b| {
        let count = counts.get(&b.id).copied().unwrap_or(0);
        BaselineView::new(b, count, with_facts)
      })
      .collect(),
  )
}

async fn view<S: BaselineStore>(
  store: &S,
  account: &str,
  baseline: Baseline,
) -> Result<BaselineView, ApiError> {
  let counts = store
    .mapped_system_counts(account, &[baseline.id])
    .await
    .map_err(store_error)?;
  let count = counts.get(&baseline.id).copied().unwrap_or(0);
  Ok(BaselineView::new(baseline, count, true))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub display_name: Option<String>,
  pub order_by:     Option<OrderBy>,
  pub order_how:    Option<OrderHow>,
  pub limit:        Option<usize>,
  pub offset:       Option<usize>,
}

/// `GET /baselines[?display_name=..&order_by=..&order_how=..&limit=..&offset=..]`
pub async fn list<S, I>(
  State(state): State<AppState<S, I>>,
  caller: Caller,
  OriginalUri(uri): OriginalUri,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<BaselineView>>, ApiError>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  caller.require(&*state.access, &[Permission::BaselinesRead])?;

  let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
  let offset = params.offset.unwrap_or(0);
  if !(1..=MAX_LIMIT).contains(&limit) {
    return Err(ApiError::BadRequest(format!(
      "limit must be between 1 and {MAX_LIMIT}"
    )));
  }

  let query = BaselineQuery {
    display_name: params.display_name.clone(),
    order_by: params.order_by.unwrap_or_default(),
    order_how: params.order_how.unwrap_or_default(),
    limit: Some(limit),
    offset: Some(offset),
  };
  let page = service::list_baselines(&*state.store, &caller.account, &query).await?;
  let data = views(&*state.store, &caller.account, page.baselines, false).await?;

  let mut link_params = Vec::new();
  if let Some(name) = query.display_name_filter() {
    link_params.push(("display_name", name.to_string()));
  }
  link_params.push(("order_by", query.order_by.as_str().to_string()));
  link_params.push(("order_how", query.order_how.as_str().to_string()));

  Ok(Json(Page {
    meta: Meta {
      count:           data.len(),
      total_available: page.total_available,
    },
    links: Some(page_links(
      uri.path(),
      &link_params,
      limit,
      offset,
      page.total_available,
    )),
    data,
  }))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub display_name:    String,
  #[serde(default)]
  pub baseline_facts:  Option<Vec<RawFact>>,
  #[serde(default)]
  pub inventory_uuids: Option<Vec<String>>,
}

/// A freshly created baseline plus any facts withheld because the source
/// systems disagreed on them.
#[derive(Debug, Serialize)]
pub struct CreatedBaseline {
  #[serde(flatten)]
  pub baseline:  BaselineView,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub conflicts: Vec<String>,
}

/// `POST /baselines`
pub async fn create<S, I>(
  State(state): State<AppState<S, I>>,
  caller: Caller,
  Json(body): Json<CreateBody>,
) -> Result<Json<CreatedBaseline>, ApiError>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  caller.require(&*state.access, &[Permission::BaselinesWrite])?;

  let (baseline, conflicts) = match (body.baseline_facts, body.inventory_uuids) {
    (Some(facts), None) => {
      let baseline =
        service::create_from_facts(&*state.store, &caller.account, &body.display_name, facts)
          .await?;
      (baseline, Vec::new())
    }
    (None, Some(raw_ids)) => {
      caller.require(&*state.access, &[Permission::InventoryRead])?;
      let ids = service::parse_id_list(&raw_ids)?;
      let created = service::create_from_system_profiles(
        &*state.store,
        &*state.inventory,
        &caller.account,
        &body.display_name,
        &ids,
      )
      .await?;
      (created.baseline, created.conflicts)
    }
    _ => return Err(ValidationError::AmbiguousSource.into()),
  };

  let baseline = view(&*state.store, &caller.account, baseline).await?;
  Ok(Json(CreatedBaseline {
    baseline,
    conflicts,
  }))
}

// ─── Get many ─────────────────────────────────────────────────────────────────

/// `GET /baselines/{ids}`
pub async fn get_many<S, I>(
  State(state): State<AppState<S, I>>,
  caller: Caller,
  Path(ids): Path<String>,
) -> Result<Json<Page<BaselineView>>, ApiError>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  caller.require(&*state.access, &[Permission::BaselinesRead])?;
  let ids = service::parse_ids(&ids)?;
  let baselines = service::get_baselines(&*state.store, &caller.account, &ids).await?;
  let data = views(&*state.store, &caller.account, baselines, true).await?;
  Ok(Json(Page::all(data)))
}

// ─── Copy ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CopyParams {
  pub display_name: Option<String>,
}

/// `POST /baselines/{id}[?display_name=..]`
pub async fn copy<S, I>(
  State(state): State<AppState<S, I>>,
  caller: Caller,
  Path(id): Path<String>,
  Query(params): Query<CopyParams>,
) -> Result<Json<BaselineView>, ApiError>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  caller.require(&*state.access, &[Permission::BaselinesWrite])?;
  let id = service::parse_id(&id)?;
  let copy = service::copy_baseline(
    &*state.store,
    &caller.account,
    id,
    params.display_name.as_deref(),
  )
  .await?;
  Ok(Json(BaselineView::new(copy, 0, true)))
}

// ─── Patch ────────────────────────────────────────────────────────────────────

/// `PATCH /baselines/{id}`
pub async fn patch_one<S, I>(
  State(state): State<AppState<S, I>>,
  caller: Caller,
  Path(id): Path<String>,
  Json(patch): Json<BaselinePatch>,
) -> Result<Json<BaselineView>, ApiError>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  caller.require(&*state.access, &[Permission::BaselinesWrite])?;
  let id = service::parse_id(&id)?;
  let baseline = service::patch_baseline(&*state.store, &caller.account, id, patch).await?;
  Ok(Json(view(&*state.store, &caller.account, baseline).await?))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

async fn delete_ids<S: BaselineStore>(
  store: &S,
  account: &str,
  ids: &[Uuid],
) -> Result<Json<Value>, ApiError> {
  let deleted = service::delete_baselines(store, account, ids).await?;
  Ok(Json(json!({ "deleted": deleted })))
}

/// `DELETE /baselines/{ids}`
pub async fn delete_many<S, I>(
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
  delete_ids(&*state.store, &caller.account, &ids).await
}

#[derive(Debug, Deserialize)]
pub struct DeletionRequest {
  pub baseline_ids: Vec<String>,
}

/// `POST /baselines/deletion_request`, body: `{"baseline_ids":[..]}`
pub async fn deletion_request<S, I>(
  State(state): State<AppState<S, I>>,
  caller: Caller,
  Json(body): Json<DeletionRequest>,
) -> Result<Json<Value>, ApiError>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  caller.require(&*state.access, &[Permission::BaselinesWrite])?;
  let ids = service::parse_id_list(&body.baseline_ids)?;
  delete_ids(&*state.store, &caller.account, &ids).await
}
