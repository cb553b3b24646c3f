//! Request principals.
//!
//! Identity is owned by an upstream provider; it attaches the authenticated
//! buyer as trusted `x-buyer-*` headers. The admin surface is guarded by a
//! shared token, a stand-in for the out-of-scope admin auth layer.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::Error;
use crate::state::AppState;
use crate::sv::checkout::Buyer;

fn header(parts: &Parts, name: &str) -> Option<String> {
  parts.headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned)
}

impl<S> FromRequestParts<S> for Buyer
where
  S: Send + Sync,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    let (Some(id), Some(email)) =
      (header(parts, "x-buyer-id"), header(parts, "x-buyer-email"))
    else {
      return Err(Error::Unauthorized);
    };

    Ok(Buyer {
      id: Some(id),
      email,
      name: header(parts, "x-buyer-name").unwrap_or_default(),
    })
  }
}

/// Extractor proving the request carried the admin token.
pub struct AdminToken;

impl FromRequestParts<Arc<AppState>> for AdminToken {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &Arc<AppState>,
  ) -> Result<Self, Self::Rejection> {
    let expected = state.config.admin_token.as_str();
    let provided = header(parts, "x-admin-token");

    if !expected.is_empty() && provided.as_deref() == Some(expected) {
      Ok(AdminToken)
    } else {
      Err(Error::Unauthorized)
    }
  }
}
