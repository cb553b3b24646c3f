//! Coupon entity - a named percentage discount, keyed by canonical code
//! (upper-cased and trimmed).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub code: String,
  #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
  pub percentage: Decimal,
  pub active: bool,
  pub expires_at: Option<DateTime>,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
