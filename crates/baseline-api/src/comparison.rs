//! Handler for `GET /comparison_report`.

use axum::{
  Json,
  extract::{Query, State},
};
use baseline_core::{
  ValidationError,
  inventory::InventoryFetcher,
  service::{self, ComparisonReport},
  store::BaselineStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState,
  error::ApiError,
  identity::{Caller, Permission},
};

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
  pub baseline_ids: Option<String>,
  pub system_ids:   Option<String>,
}

/// An absent or blank list means "none of this kind".
fn optional_ids(raw: Option<&str>) -> Result<Vec<Uuid>, ValidationError> {
  match raw.map(str::trim) {
    None | Some("") => Ok(Vec::new()),
    Some(raw) => service::parse_ids(raw),
  }
}

/// `GET /comparison_report?baseline_ids=..&system_ids=..`
///
/// Either list may be omitted, but not both.
pub async fn report<S, I>(
  State(state): State<AppState<S, I>>,
  caller: Caller,
  Query(params): Query<ReportParams>,
) -> Result<Json<ComparisonReport>, ApiError>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  let baseline_ids = optional_ids(params.baseline_ids.as_deref())?;
  let system_ids = optional_ids(params.system_ids.as_deref())?;

  caller.require(&*state.access, &[Permission::BaselinesRead])?;
  if !system_ids.is_empty() {
    caller.require(&*state.access, &[Permission::InventoryRead])?;
  }

  let report = service::compare(
    &*state.store,
    &*state.inventory,
    &caller.account,
    &baseline_ids,
    &system_ids,
  )
  .await?;
  Ok(Json(report))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blank_lists_are_empty() {
    assert_eq!(optional_ids(None), Ok(vec![]));
    assert_eq!(optional_ids(Some(" ")), Ok(vec![]));
    let id = Uuid::new_v4();
    assert_eq!(optional_ids(Some(&id.to_string())), Ok(vec![id]));
    assert!(matches!(
      optional_ids(Some("nope")),
      Err(ValidationError::MalformedIds(_))
    ));
  }
}
