//! Stock key entity - one pre-provisioned, sellable credential.
//!
//! A row transitions `used` false -> true exactly once, when the allocation
//! engine consumes it. Used rows are immutable.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_keys")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub id: String,
  #[sea_orm(unique)]
  pub key: String,
  pub product_id: String,
  pub plan_id: Option<String>,
  pub used: bool,
  pub used_at: Option<DateTime>,
  pub sale_id: Option<String>,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "super::sale::Entity",
    from = "Column::SaleId",
    to = "super::sale::Column::Id"
  )]
  Sale,
}

impl Related<super::sale::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Sale.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
