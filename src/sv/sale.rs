//! Sale ledger - append-mostly record of completed transactions.
//!
//! The allocation engine is the only writer during checkout; `create` exists
//! for admin/system-created sales and still goes through the key registry.

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::entity::{SaleStatus, sale};
use crate::prelude::*;
use crate::sv;

#[derive(Debug)]
pub struct NewSale {
  pub key: String,
  pub product_id: String,
  pub plan_id: Option<String>,
  pub buyer_id: Option<String>,
  pub buyer_email: String,
  pub buyer_name: String,
  pub value: Decimal,
  pub status: SaleStatus,
}

#[derive(Debug, Serialize)]
pub struct MonthlyRevenue {
  pub year: i32,
  pub month: u32,
  pub total: Decimal,
  pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
  pub total_sales: u64,
  pub total_revenue: Decimal,
  pub revenue_by_month: Vec<MonthlyRevenue>,
}

pub struct Sale<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Sale<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn list(&self) -> Result<Vec<sale::Model>> {
    Ok(
      sale::Entity::find()
        .order_by_desc(sale::Column::CreatedAt)
        .all(self.db)
        .await?,
    )
  }

  pub async fn by_id(&self, id: &str) -> Result<sale::Model> {
    sale::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::SaleNotFound)
  }

  pub async fn create(&self, new: NewSale) -> Result<sale::Model> {
    let key = new.key.trim();
    if key.is_empty() {
      return Err(Error::Validation("key must not be empty".into()));
    }

    if sv::Registry::new(self.db).is_taken(key).await? {
      return Err(Error::KeyExists);
    }

    let now = Utc::now().naive_utc();
    let model = sale::ActiveModel {
      id: Set(Uuid::new_v4().to_string()),
      key: Set(key.to_owned()),
      product_id: Set(new.product_id),
      plan_id: Set(new.plan_id),
      buyer_id: Set(new.buyer_id),
      buyer_email: Set(new.buyer_email),
      buyer_name: Set(new.buyer_name),
      value: Set(new.value),
      status: Set(new.status),
      created_at: Set(now),
    };

    match model.insert(self.db).await {
      Ok(sale) => Ok(sale),
      Err(err)
        if matches!(
          err.sql_err(),
          Some(SqlErr::UniqueConstraintViolation(_))
        ) =>
      {
        Err(Error::KeyExists)
      }
      Err(err) => Err(err.into()),
    }
  }

  /// Completed-sales totals plus revenue grouped by month, newest first.
  pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
    let completed = sale::Entity::find()
      .filter(sale::Column::Status.eq(SaleStatus::Completed))
      .all(self.db)
      .await?;

    let total_sales = completed.len() as u64;
    let total_revenue = completed.iter().map(|sale| sale.value).sum();

    let mut months: BTreeMap<(i32, u32), (Decimal, u64)> = BTreeMap::new();
    for sale in &completed {
      let slot = months
        .entry((sale.created_at.year(), sale.created_at.month()))
        .or_insert((Decimal::ZERO, 0));
      slot.0 += sale.value;
      slot.1 += 1;
    }

    let revenue_by_month = months
      .into_iter()
      .rev()
      .take(12)
      .map(|((year, month), (total, count))| MonthlyRevenue {
        year,
        month,
        total,
        count,
      })
      .collect();

    Ok(DashboardStats { total_sales, total_revenue, revenue_by_month })
  }
}

#[cfg(test)]
mod tests {
  use sea_orm::{ConnectionTrait, Database, DbBackend, Schema};

  use super::*;
  use crate::entity::{coupon, stock_key};

  async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();

    let schema = Schema::new(DbBackend::Sqlite);

    let stmt = schema.create_table_from_entity(sale::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(stock_key::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(coupon::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    db
  }

  fn new_sale(key: &str, value: Decimal) -> NewSale {
    NewSale {
      key: key.to_owned(),
      product_id: "p1".into(),
      plan_id: None,
      buyer_id: None,
      buyer_email: "ops@store".into(),
      buyer_name: String::new(),
      value,
      status: SaleStatus::Completed,
    }
  }

  #[tokio::test]
  async fn test_create_rejects_taken_key() {
    let db = setup_test_db().await;
    let sv = Sale::new(&db);

    sv.create(new_sale("TAKEN000", Decimal::ZERO)).await.unwrap();

    assert!(matches!(
      sv.create(new_sale("TAKEN000", Decimal::ZERO)).await,
      Err(Error::KeyExists)
    ));

    // a stock key occupies the same namespace
    crate::sv::Stock::new(&db)
      .bulk_add(&["STOCKED0".to_owned()], "p1", None)
      .await
      .unwrap();
    assert!(matches!(
      sv.create(new_sale("STOCKED0", Decimal::ZERO)).await,
      Err(Error::KeyExists)
    ));
  }

  #[tokio::test]
  async fn test_dashboard_stats_sums_completed_only() {
    let db = setup_test_db().await;
    let sv = Sale::new(&db);

    sv.create(new_sale("A0000001", Decimal::new(1000, 2))).await.unwrap();
    sv.create(new_sale("A0000002", Decimal::new(2550, 2))).await.unwrap();

    let mut cancelled = new_sale("A0000003", Decimal::new(9900, 2));
    cancelled.status = SaleStatus::Cancelled;
    sv.create(cancelled).await.unwrap();

    let stats = sv.dashboard_stats().await.unwrap();
    assert_eq!(stats.total_sales, 2);
    assert_eq!(stats.total_revenue, Decimal::new(3550, 2));
    assert_eq!(stats.revenue_by_month.len(), 1);
    assert_eq!(stats.revenue_by_month[0].count, 2);
  }
}
