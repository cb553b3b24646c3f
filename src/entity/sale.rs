//! Sale entity - one completed unit of purchase.
//!
//! `key` is unique across the sales table AND the stock_keys table; both
//! collections delegate the cross-namespace check to `sv::Registry`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
  Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
  #[sea_orm(string_value = "pending")]
  Pending,
  #[sea_orm(string_value = "completed")]
  Completed,
  #[sea_orm(string_value = "cancelled")]
  Cancelled,
}

impl Default for SaleStatus {
  fn default() -> Self {
    Self::Completed
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  #[sea_orm(unique)]
  pub key: String,
  pub product_id: String,
  pub plan_id: Option<String>,
  /// None for system-created sales without a buyer.
  pub buyer_id: Option<String>,
  pub buyer_email: String,
  pub buyer_name: String,
  /// Per-unit price after proportional discount, not the cart subtotal.
  pub value: Decimal,
  pub status: SaleStatus,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
