//! JSON REST API for system baselines.
//!
//! Exposes an axum [`Router`] backed by any
//! [`baseline_core::store::BaselineStore`] and
//! [`baseline_core::inventory::InventoryFetcher`]. TLS and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = baseline_api::router(state, &MountConfig::default());
//! axum::serve(listener, app).await?;
//! ```

pub mod baselines;
pub mod comparison;
pub mod error;
pub mod identity;
pub mod internal;
pub mod links;
pub mod systems;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, post},
};
use baseline_core::{inventory::InventoryFetcher, store::BaselineStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use identity::{AccessControl, AllowAll, Caller, Permission};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Where the public and internal routes are mounted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MountConfig {
  #[serde(default = "default_path_prefix")]
  pub path_prefix:          String,
  #[serde(default = "default_internal_path_prefix")]
  pub internal_path_prefix: String,
}

fn default_path_prefix() -> String { "/api/system-baseline/v1".into() }

fn default_internal_path_prefix() -> String {
  "/api/system-baseline/internal/v1".into()
}

impl Default for MountConfig {
  fn default() -> Self {
    Self {
      path_prefix:          default_path_prefix(),
      internal_path_prefix: default_internal_path_prefix(),
    }
  }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// Shared handler state.
pub struct AppState<S, I> {
  pub store:     Arc<S>,
  pub inventory: Arc<I>,
  pub access:    Arc<dyn AccessControl>,
}

impl<S, I> AppState<S, I> {
  pub fn new(store: S, inventory: I, access: impl AccessControl + 'static) -> Self {
    Self {
      store:     Arc::new(store),
      inventory: Arc::new(inventory),
      access:    Arc::new(access),
    }
  }
}

impl<S, I> Clone for AppState<S, I> {
  fn clone(&self) -> Self {
    Self {
      store:     Arc::clone(&self.store),
      inventory: Arc::clone(&self.inventory),
      access:    Arc::clone(&self.access),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Public baseline routes, relative to the mount prefix.
pub fn api_router<S, I>() -> Router<AppState<S, I>>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  Router::new()
    // Baselines
    .route(
      "/baselines",
      get(baselines::list::<S, I>).post(baselines::create::<S, I>),
    )
    .route(
      "/baselines/deletion_request",
      post(baselines::deletion_request::<S, I>),
    )
    .route(
      "/baselines/{id}",
      get(baselines::get_many::<S, I>)
        .post(baselines::copy::<S, I>)
        .patch(baselines::patch_one::<S, I>)
        .delete(baselines::delete_many::<S, I>),
    )
    // Mapped systems
    .route(
      "/baselines/{id}/systems",
      get(systems::list::<S, I>).post(systems::add::<S, I>),
    )
    .route(
      "/baselines/{id}/systems/deletion_request",
      post(systems::deletion_request::<S, I>),
    )
    .route(
      "/baselines/{id}/systems/{system_ids}",
      axum::routing::delete(systems::remove::<S, I>),
    )
    // Comparison
    .route("/comparison_report", get(comparison::report::<S, I>))
}

/// Internal routes used by other platform services.
pub fn internal_router<S, I>() -> Router<AppState<S, I>>
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  Router::new()
    .route("/baselines", get(internal::baselines_for_system::<S, I>))
    .route(
      "/systems/deletion_request",
      post(internal::deletion_request::<S, I>),
    )
    .route(
      "/systems/{ids}",
      patch(internal::update_system::<S, I>).delete(internal::delete_systems::<S, I>),
    )
}

/// Build the full application: both route sets nested under their prefixes,
/// wrapped in request tracing.
pub fn router<S, I>(state: AppState<S, I>, mount: &MountConfig) -> Router
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  Router::new()
    .nest(&mount.path_prefix, api_router::<S, I>())
    .nest(&mount.internal_path_prefix, internal_router::<S, I>())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests;
