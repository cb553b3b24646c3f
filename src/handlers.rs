//! HTTP handlers for the checkout, stock, coupon and sales surface.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};

use crate::auth::AdminToken;
use crate::entity::{SaleStatus, coupon, sale, stock_key};
use crate::prelude::*;
use crate::state::AppState;
use crate::sv::checkout::{Buyer, CartLine};
use crate::sv::coupon::UpdateCoupon;
use crate::sv::sale::{DashboardStats, NewSale};
use crate::sv::stock::StockStats;

pub async fn health() -> &'static str {
  "OK"
}

// --- checkout ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReq {
  pub items: Vec<CartLine>,
  #[serde(default)]
  pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutRes {
  pub success: bool,
  pub sales: Vec<sale::Model>,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub errors: Option<Vec<String>>,
}

pub async fn checkout(
  State(app): State<Arc<AppState>>,
  buyer: Buyer,
  Json(req): Json<CheckoutReq>,
) -> Result<(StatusCode, Json<CheckoutRes>)> {
  let outcome = app
    .checkout()
    .process(&buyer, &req.items, req.coupon_code.as_deref())
    .await?;

  let failed = outcome.failed();
  let message = if failed {
    "no sales were created".to_owned()
  } else {
    format!("{} unit(s) purchased", outcome.sales.len())
  };

  let status = if failed { StatusCode::BAD_REQUEST } else { StatusCode::CREATED };
  let res = CheckoutRes {
    success: !failed,
    message,
    errors: (!outcome.errors.is_empty()).then_some(outcome.errors),
    sales: outcome.sales,
  };

  Ok((status, Json(res)))
}

// --- stock ---

#[derive(Debug, Deserialize)]
pub struct StockFilter {
  pub product: Option<String>,
  pub plan: Option<String>,
  pub used: Option<bool>,
}

pub async fn list_stock(
  _admin: AdminToken,
  State(app): State<Arc<AppState>>,
  Query(filter): Query<StockFilter>,
) -> Result<Json<Vec<stock_key::Model>>> {
  let stock = app
    .sv()
    .stock
    .list(filter.product.as_deref(), filter.plan.as_deref(), filter.used)
    .await?;
  Ok(Json(stock))
}

pub async fn stock_stats(
  _admin: AdminToken,
  State(app): State<Arc<AppState>>,
  Query(filter): Query<StockFilter>,
) -> Result<Json<StockStats>> {
  let stats = app
    .sv()
    .stock
    .stats(filter.product.as_deref(), filter.plan.as_deref())
    .await?;
  Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableQuery {
  pub plan_id: Option<String>,
}

pub async fn available_stock(
  State(app): State<Arc<AppState>>,
  Path(product_id): Path<String>,
  Query(query): Query<AvailableQuery>,
) -> Result<Json<stock_key::Model>> {
  app
    .sv()
    .stock
    .find_available(&product_id, query.plan_id.as_deref())
    .await?
    .map(Json)
    .ok_or(Error::StockNotFound)
}

#[derive(Debug, Deserialize)]
pub struct AddStockReq {
  pub keys: Vec<String>,
  pub product: String,
  #[serde(default)]
  pub plan: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddStockRes {
  pub success: bool,
  pub added: usize,
  pub keys: Vec<stock_key::Model>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub errors: Option<Vec<String>>,
}

pub async fn add_stock(
  _admin: AdminToken,
  State(app): State<Arc<AppState>>,
  Json(req): Json<AddStockReq>,
) -> Result<(StatusCode, Json<AddStockRes>)> {
  if req.keys.is_empty() {
    return Err(Error::Validation("keys list is required".into()));
  }

  // resolve product/plan against the catalog before touching inventory
  app.catalog.product(&req.product).await?.ok_or(Error::ProductNotFound)?;
  if let Some(plan_id) = &req.plan {
    let plan = app.catalog.plan(plan_id).await?.ok_or(Error::PlanNotFound)?;
    if plan.product_id != req.product {
      return Err(Error::PlanNotFound);
    }
  }

  let outcome = app
    .sv()
    .stock
    .bulk_add(&req.keys, &req.product, req.plan.as_deref())
    .await?;

  let status = if outcome.added.is_empty() {
    StatusCode::BAD_REQUEST
  } else {
    StatusCode::CREATED
  };
  let res = AddStockRes {
    success: !outcome.added.is_empty(),
    added: outcome.added.len(),
    keys: outcome.added,
    errors: (!outcome.errors.is_empty()).then_some(outcome.errors),
  };

  Ok((status, Json(res)))
}

pub async fn remove_stock(
  _admin: AdminToken,
  State(app): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<json::Value>> {
  app.sv().stock.remove(&id).await?;
  Ok(Json(json::json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct EditStockReq {
  pub key: String,
}

pub async fn edit_stock(
  _admin: AdminToken,
  State(app): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(req): Json<EditStockReq>,
) -> Result<Json<stock_key::Model>> {
  Ok(Json(app.sv().stock.edit(&id, &req.key).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseStockReq {
  #[serde(default)]
  pub sale_id: Option<String>,
}

pub async fn use_stock(
  _admin: AdminToken,
  State(app): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(req): Json<UseStockReq>,
) -> Result<Json<stock_key::Model>> {
  Ok(Json(app.sv().stock.reserve(&id, req.sale_id.as_deref()).await?))
}

// --- coupons ---

#[derive(Debug, Serialize)]
pub struct CouponValidity {
  pub valid: bool,
  pub code: String,
  pub percentage: Decimal,
}

pub async fn validate_coupon(
  State(app): State<Arc<AppState>>,
  Path(code): Path<String>,
) -> Result<Json<CouponValidity>> {
  let coupon = app.sv().coupon.validate(&code).await?;
  Ok(Json(CouponValidity {
    valid: true,
    code: coupon.code,
    percentage: coupon.percentage,
  }))
}

pub async fn list_coupons(
  _admin: AdminToken,
  State(app): State<Arc<AppState>>,
) -> Result<Json<Vec<coupon::Model>>> {
  Ok(Json(app.sv().coupon.list().await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponReq {
  pub code: String,
  pub percentage: Decimal,
  #[serde(default)]
  pub expires_at: Option<DateTime>,
}

pub async fn create_coupon(
  _admin: AdminToken,
  State(app): State<Arc<AppState>>,
  Json(req): Json<CreateCouponReq>,
) -> Result<(StatusCode, Json<coupon::Model>)> {
  let coupon = app
    .sv()
    .coupon
    .create(&req.code, req.percentage, req.expires_at)
    .await?;
  Ok((StatusCode::CREATED, Json(coupon)))
}

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
  T: Deserialize<'de>,
  D: Deserializer<'de>,
{
  Deserialize::deserialize(de).map(Some)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCouponReq {
  #[serde(default)]
  pub percentage: Option<Decimal>,
  #[serde(default)]
  pub active: Option<bool>,
  #[serde(default, deserialize_with = "double_option")]
  pub expires_at: Option<Option<DateTime>>,
}

pub async fn update_coupon(
  _admin: AdminToken,
  State(app): State<Arc<AppState>>,
  Path(code): Path<String>,
  Json(req): Json<UpdateCouponReq>,
) -> Result<Json<coupon::Model>> {
  let changes = UpdateCoupon {
    percentage: req.percentage,
    active: req.active,
    expires_at: req.expires_at,
  };
  Ok(Json(app.sv().coupon.update(&code, changes).await?))
}

pub async fn delete_coupon(
  _admin: AdminToken,
  State(app): State<Arc<AppState>>,
  Path(code): Path<String>,
) -> Result<Json<json::Value>> {
  app.sv().coupon.delete(&code).await?;
  Ok(Json(json::json!({ "success": true })))
}

// --- sales ---

pub async fn list_sales(
  _admin: AdminToken,
  State(app): State<Arc<AppState>>,
) -> Result<Json<Vec<sale::Model>>> {
  Ok(Json(app.sv().sale.list().await?))
}

pub async fn get_sale(
  _admin: AdminToken,
  State(app): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<sale::Model>> {
  Ok(Json(app.sv().sale.by_id(&id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleReq {
  pub key: String,
  pub product: String,
  #[serde(default)]
  pub plan: Option<String>,
  pub user_email: String,
  #[serde(default)]
  pub user_name: Option<String>,
  pub value: Decimal,
  #[serde(default)]
  pub status: Option<SaleStatus>,
}

pub async fn create_sale(
  _admin: AdminToken,
  State(app): State<Arc<AppState>>,
  Json(req): Json<CreateSaleReq>,
) -> Result<(StatusCode, Json<sale::Model>)> {
  app.catalog.product(&req.product).await?.ok_or(Error::ProductNotFound)?;
  if let Some(plan_id) = &req.plan {
    app.catalog.plan(plan_id).await?.ok_or(Error::PlanNotFound)?;
  }

  let sale = app
    .sv()
    .sale
    .create(NewSale {
      key: req.key,
      product_id: req.product,
      plan_id: req.plan,
      buyer_id: None,
      buyer_email: req.user_email,
      buyer_name: req.user_name.unwrap_or_default(),
      value: req.value,
      status: req.status.unwrap_or_default(),
    })
    .await?;

  Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn sales_dashboard(
  _admin: AdminToken,
  State(app): State<Arc<AppState>>,
) -> Result<Json<DashboardStats>> {
  Ok(Json(app.sv().sale.dashboard_stats().await?))
}
