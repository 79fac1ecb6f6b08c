//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use baseline_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

use crate::identity::Permission;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] CoreError),

  #[error("{0}")]
  BadRequest(String),

  #[error("{0}")]
  Unauthorized(String),

  #[error("insufficient permissions: {0} is required")]
  Forbidden(Permission),
}

impl From<baseline_core::ValidationError> for ApiError {
  fn from(err: baseline_core::ValidationError) -> Self { Self::Core(err.into()) }
}

/// Convert a store backend error through [`baseline_core::Error`].
pub(crate) fn store_error<E: Into<CoreError>>(err: E) -> ApiError {
  ApiError::Core(err.into())
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Core(err) => match err {
        CoreError::Validation(_) | CoreError::TypeMismatch(_) => StatusCode::BAD_REQUEST,
        CoreError::BaselinesNotFound(_)
        | CoreError::InventoryNotFound(_)
        | CoreError::MappedSystemNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Inventory(_) => StatusCode::BAD_GATEWAY,
        CoreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      },
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    } else {
      tracing::debug!(error = %self, %status, "request rejected");
    }
    (status, Json(json!({ "message": self.to_string() }))).into_response()
  }
}
