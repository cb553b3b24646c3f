//! Error types for the storefront server

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] sea_orm::DbErr),

  #[error("product not found")]
  ProductNotFound,

  #[error("plan not found")]
  PlanNotFound,

  #[error("stock key not found")]
  StockNotFound,

  #[error("sale not found")]
  SaleNotFound,

  #[error("coupon not found")]
  CouponNotFound,

  #[error("coupon invalid or expired")]
  CouponInvalid,

  #[error("coupon code already exists")]
  CouponExists,

  #[error("key already exists")]
  KeyExists,

  #[error("stock key already reserved")]
  KeyAlreadyUsed,

  #[error("stock key has already been used")]
  KeyConsumed,

  #[error("key space exhausted, could not generate a unique key")]
  KeyCollisionExhausted,

  #[error("catalog unavailable: {0}")]
  Catalog(String),

  #[error("{0}")]
  Validation(String),

  #[error("unauthorized")]
  Unauthorized,
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::Database(_) | Error::KeyCollisionExhausted => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
      Error::ProductNotFound
      | Error::PlanNotFound
      | Error::StockNotFound
      | Error::SaleNotFound
      | Error::CouponNotFound
      | Error::CouponInvalid => StatusCode::NOT_FOUND,
      Error::KeyExists | Error::KeyAlreadyUsed | Error::CouponExists => {
        StatusCode::CONFLICT
      }
      Error::KeyConsumed | Error::Validation(_) => StatusCode::BAD_REQUEST,
      Error::Catalog(_) => StatusCode::BAD_GATEWAY,
      Error::Unauthorized => StatusCode::UNAUTHORIZED,
    };

    let body = json::json!({
      "success": false,
      "error": self.to_string(),
    });

    (status, Json(body)).into_response()
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
