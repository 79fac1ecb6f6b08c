//! Caller identity and access-control delegation.
//!
//! The platform gateway forwards a base64-encoded JSON identity in the
//! `x-rh-identity` header. The account it names scopes every store lookup;
//! whether the caller may perform an action is delegated to an
//! [`AccessControl`] implementation.

use std::fmt;

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use baseline_core::{inventory::InventoryFetcher, store::BaselineStore};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

pub const IDENTITY_HEADER: &str = "x-rh-identity";

// ─── Identity ────────────────────────────────────────────────────────────────

/// The decoded `identity` object of the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  #[serde(default)]
  pub account_number: Option<String>,
  #[serde(default)]
  pub org_id:         Option<String>,
  #[serde(default, rename = "type")]
  pub kind:           Option<String>,
}

#[derive(Deserialize)]
struct Envelope {
  identity: Identity,
}

impl Identity {
  /// The tenant this caller acts for: the account number, or the org id
  /// for callers that carry no account.
  pub fn account(&self) -> Option<&str> {
    [&self.account_number, &self.org_id]
      .into_iter()
      .flatten()
      .map(String::as_str)
      .find(|s| !s.trim().is_empty())
  }
}

/// An authenticated caller: the identity plus its resolved account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
  pub account:  String,
  pub identity: Identity,
}

/// Decode and validate the identity header.
pub fn decode_identity(headers: &HeaderMap) -> Result<Caller, ApiError> {
  let encoded = headers
    .get(IDENTITY_HEADER)
    .and_then(|v| v.to_str().ok())
    .ok_or_else(|| ApiError::Unauthorized(format!("{IDENTITY_HEADER} header is missing")))?;

  let invalid = || ApiError::Unauthorized(format!("{IDENTITY_HEADER} header is invalid"));
  let decoded = B64.decode(encoded.trim()).map_err(|_| invalid())?;
  let envelope: Envelope = serde_json::from_slice(&decoded).map_err(|_| invalid())?;

  let account = envelope
    .identity
    .account()
    .ok_or_else(|| ApiError::Unauthorized("identity carries no account".into()))?
    .to_string();

  Ok(Caller {
    account,
    identity: envelope.identity,
  })
}

impl<S, I> FromRequestParts<AppState<S, I>> for Caller
where
  S: BaselineStore + 'static,
  I: InventoryFetcher + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &AppState<S, I>,
  ) -> Result<Self, Self::Rejection> {
    decode_identity(&parts.headers)
  }
}

// ─── Access control ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
  BaselinesRead,
  BaselinesWrite,
  InventoryRead,
}

impl fmt::Display for Permission {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Permission::BaselinesRead => "drift:baselines:read",
      Permission::BaselinesWrite => "drift:baselines:write",
      Permission::InventoryRead => "inventory:hosts:read",
    })
  }
}

/// Decides whether an identity holds a permission. Policy lives outside this
/// crate; handlers only consult it.
pub trait AccessControl: Send + Sync {
  fn permits(&self, identity: &Identity, permission: Permission) -> bool;
}

/// Grants everything. For deployments where the gateway already enforces
/// access.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessControl for AllowAll {
  fn permits(&self, _identity: &Identity, _permission: Permission) -> bool { true }
}

impl Caller {
  /// Fail with 403 unless `access` grants every permission in `required`.
  pub fn require(
    &self,
    access: &dyn AccessControl,
    required: &[Permission],
  ) -> Result<(), ApiError> {
    match required
      .iter()
      .find(|p| !access.permits(&self.identity, **p))
    {
      Some(missing) => Err(ApiError::Forbidden(*missing)),
      None => Ok(()),
    }
  }
}
