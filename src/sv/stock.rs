//! Stock inventory - holds and dispenses unused keys.
//!
//! Reservation is a conditional UPDATE filtered on `used = false`; concurrent
//! checkouts racing on the same row are decided by rows_affected.

use sea_orm::sea_query::Expr;
use serde::Serialize;
use uuid::Uuid;

use crate::entity::stock_key;
use crate::prelude::*;
use crate::sv;

#[derive(Debug, Serialize)]
pub struct StockStats {
  pub total: u64,
  pub available: u64,
  pub used: u64,
}

#[derive(Debug, Default)]
pub struct BulkAddOutcome {
  pub added: Vec<stock_key::Model>,
  pub errors: Vec<String>,
}

pub struct Stock<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Stock<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// At most one unused key with an exact (product, plan) match. A `None`
  /// plan matches only rows whose plan is NULL, never any-plan.
  pub async fn find_available(
    &self,
    product_id: &str,
    plan_id: Option<&str>,
  ) -> Result<Option<stock_key::Model>> {
    let query = stock_key::Entity::find()
      .filter(stock_key::Column::ProductId.eq(product_id))
      .filter(stock_key::Column::Used.eq(false));

    let query = match plan_id {
      Some(plan) => query.filter(stock_key::Column::PlanId.eq(plan)),
      None => query.filter(stock_key::Column::PlanId.is_null()),
    };

    Ok(query.one(self.db).await?)
  }

  /// Atomically transition `used` false -> true, stamping `used_at` (and
  /// `sale_id` when already known). A row that was consumed in the meantime
  /// yields a conflict, a missing row yields not-found.
  pub async fn reserve(
    &self,
    id: &str,
    sale_id: Option<&str>,
  ) -> Result<stock_key::Model> {
    let now = Utc::now().naive_utc();

    let mut update = stock_key::Entity::update_many()
      .col_expr(stock_key::Column::Used, Expr::value(true))
      .col_expr(stock_key::Column::UsedAt, Expr::value(Some(now)));

    if let Some(sale_id) = sale_id {
      update = update.col_expr(
        stock_key::Column::SaleId,
        Expr::value(Some(sale_id.to_owned())),
      );
    }

    let res = update
      .filter(stock_key::Column::Id.eq(id))
      .filter(stock_key::Column::Used.eq(false))
      .exec(self.db)
      .await?;

    if res.rows_affected == 0 {
      return match stock_key::Entity::find_by_id(id).one(self.db).await? {
        Some(_) => Err(Error::KeyAlreadyUsed),
        None => Err(Error::StockNotFound),
      };
    }

    stock_key::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::StockNotFound)
  }

  /// Complete the cross-link for a key reserved before its sale existed.
  pub async fn link_sale(&self, id: &str, sale_id: &str) -> Result<()> {
    let model = stock_key::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::StockNotFound)?;

    stock_key::ActiveModel {
      sale_id: Set(Some(sale_id.to_owned())),
      ..model.into()
    }
    .update(self.db)
    .await?;

    Ok(())
  }

  /// Import a batch of raw keys. Empty entries and duplicates (against both
  /// the stock and sale namespaces) are reported per item, never fatal to
  /// the rest of the batch.
  pub async fn bulk_add(
    &self,
    raw_keys: &[String],
    product_id: &str,
    plan_id: Option<&str>,
  ) -> Result<BulkAddOutcome> {
    let registry = sv::Registry::new(self.db);
    let mut outcome = BulkAddOutcome::default();

    for raw in raw_keys {
      let key = raw.trim();
      if key.is_empty() {
        outcome.errors.push("empty key skipped".to_owned());
        continue;
      }

      if registry.is_taken(key).await? {
        outcome.errors.push(format!("key \"{key}\" already exists"));
        continue;
      }

      let now = Utc::now().naive_utc();
      let model = stock_key::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        key: Set(key.to_owned()),
        product_id: Set(product_id.to_owned()),
        plan_id: Set(plan_id.map(str::to_owned)),
        used: Set(false),
        used_at: Set(None),
        sale_id: Set(None),
        created_at: Set(now),
      };

      match model.insert(self.db).await {
        Ok(model) => outcome.added.push(model),
        // the registry check raced a concurrent writer
        Err(err)
          if matches!(
            err.sql_err(),
            Some(SqlErr::UniqueConstraintViolation(_))
          ) =>
        {
          outcome.errors.push(format!("key \"{key}\" already exists"));
        }
        Err(err) => return Err(err.into()),
      }
    }

    Ok(outcome)
  }

  /// Delete an unused key. Consumed keys are immutable.
  pub async fn remove(&self, id: &str) -> Result<()> {
    let res = stock_key::Entity::delete_many()
      .filter(stock_key::Column::Id.eq(id))
      .filter(stock_key::Column::Used.eq(false))
      .exec(self.db)
      .await?;

    if res.rows_affected == 0 {
      return match stock_key::Entity::find_by_id(id).one(self.db).await? {
        Some(_) => Err(Error::KeyConsumed),
        None => Err(Error::StockNotFound),
      };
    }

    Ok(())
  }

  /// Rename an unused key. The new value must be free in both namespaces.
  pub async fn edit(&self, id: &str, new_key: &str) -> Result<stock_key::Model> {
    let new_key = new_key.trim();
    if new_key.is_empty() {
      return Err(Error::Validation("key must not be empty".into()));
    }

    let model = stock_key::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::StockNotFound)?;

    if model.used {
      return Err(Error::KeyConsumed);
    }

    if new_key != model.key
      && sv::Registry::new(self.db).is_taken(new_key).await?
    {
      return Err(Error::KeyExists);
    }

    let res = stock_key::Entity::update_many()
      .col_expr(stock_key::Column::Key, Expr::value(new_key.to_owned()))
      .filter(stock_key::Column::Id.eq(id))
      .filter(stock_key::Column::Used.eq(false))
      .exec(self.db)
      .await;

    match res {
      Ok(res) if res.rows_affected == 0 => Err(Error::KeyConsumed),
      Ok(_) => stock_key::Entity::find_by_id(id)
        .one(self.db)
        .await?
        .ok_or(Error::StockNotFound),
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

  pub async fn stats(
    &self,
    product_id: Option<&str>,
    plan_id: Option<&str>,
  ) -> Result<StockStats> {
    let total = Self::filtered(product_id, plan_id).count(self.db).await?;
    let available = Self::filtered(product_id, plan_id)
      .filter(stock_key::Column::Used.eq(false))
      .count(self.db)
      .await?;
    let used = Self::filtered(product_id, plan_id)
      .filter(stock_key::Column::Used.eq(true))
      .count(self.db)
      .await?;

    Ok(StockStats { total, available, used })
  }

  pub async fn list(
    &self,
    product_id: Option<&str>,
    plan_id: Option<&str>,
    used: Option<bool>,
  ) -> Result<Vec<stock_key::Model>> {
    let mut query = Self::filtered(product_id, plan_id)
      .order_by_desc(stock_key::Column::CreatedAt);

    if let Some(used) = used {
      query = query.filter(stock_key::Column::Used.eq(used));
    }

    Ok(query.all(self.db).await?)
  }

  // Absent filters mean no constraint here (unlike `find_available`, which
  // treats a missing plan as an exact NULL match).
  fn filtered(
    product_id: Option<&str>,
    plan_id: Option<&str>,
  ) -> sea_orm::Select<stock_key::Entity> {
    let mut query = stock_key::Entity::find();

    if let Some(product) = product_id {
      query = query.filter(stock_key::Column::ProductId.eq(product));
    }
    if let Some(plan) = plan_id {
      query = query.filter(stock_key::Column::PlanId.eq(plan));
    }

    query
  }
}

#[cfg(test)]
mod tests {
  use sea_orm::{ConnectionTrait, Database, DbBackend, Schema};

  use super::*;
  use crate::entity::{SaleStatus, coupon, sale};

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

  async fn seed_sale(db: &DatabaseConnection, id: &str, key: &str) {
    sale::ActiveModel {
      id: Set(id.to_owned()),
      key: Set(key.to_owned()),
      product_id: Set("p1".into()),
      plan_id: Set(None),
      buyer_id: Set(None),
      buyer_email: Set("a@b.c".into()),
      buyer_name: Set(String::new()),
      value: Set(Decimal::ZERO),
      status: Set(SaleStatus::Completed),
      created_at: Set(Utc::now().naive_utc()),
    }
    .insert(db)
    .await
    .unwrap();
  }

  #[tokio::test]
  async fn test_bulk_add_reports_duplicates_and_empties() {
    let db = setup_test_db().await;
    let stock = Stock::new(&db);

    seed_sale(&db, "sale-0", "SOLD0000SOLD0000").await;

    let keys = vec![
      "KEY1".to_owned(),
      " KEY1 ".to_owned(),
      "  ".to_owned(),
      "SOLD0000SOLD0000".to_owned(),
      "KEY2".to_owned(),
    ];
    let outcome = stock.bulk_add(&keys, "p1", None).await.unwrap();

    assert_eq!(outcome.added.len(), 2);
    assert_eq!(outcome.errors.len(), 3);
    assert_eq!(outcome.added[0].key, "KEY1");
    assert_eq!(outcome.added[1].key, "KEY2");
  }

  #[tokio::test]
  async fn test_find_available_matches_plan_exactly() {
    let db = setup_test_db().await;
    let stock = Stock::new(&db);

    stock
      .bulk_add(&["PLANNED0".to_owned()], "p1", Some("plan-a"))
      .await
      .unwrap();
    stock.bulk_add(&["PLANLESS".to_owned()], "p1", None).await.unwrap();

    let hit = stock.find_available("p1", Some("plan-a")).await.unwrap();
    assert_eq!(hit.unwrap().key, "PLANNED0");

    let hit = stock.find_available("p1", None).await.unwrap();
    assert_eq!(hit.unwrap().key, "PLANLESS");

    assert!(stock.find_available("p1", Some("plan-b")).await.unwrap().is_none());
    assert!(stock.find_available("p2", None).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_reserve_is_exclusive() {
    let db = setup_test_db().await;
    let stock = Stock::new(&db);

    seed_sale(&db, "sale-1", "SALE0001SALE0001").await;
    seed_sale(&db, "sale-2", "SALE0002SALE0002").await;

    let outcome =
      stock.bulk_add(&["ONCE0000".to_owned()], "p1", None).await.unwrap();
    let id = outcome.added[0].id.clone();

    let reserved = stock.reserve(&id, Some("sale-1")).await.unwrap();
    assert!(reserved.used);
    assert!(reserved.used_at.is_some());
    assert_eq!(reserved.sale_id.as_deref(), Some("sale-1"));

    // second reservation loses
    assert!(matches!(
      stock.reserve(&id, Some("sale-2")).await,
      Err(Error::KeyAlreadyUsed)
    ));

    // and the consumed key is invisible to lookups
    assert!(stock.find_available("p1", None).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_used_key_is_immutable() {
    let db = setup_test_db().await;
    let stock = Stock::new(&db);

    let outcome =
      stock.bulk_add(&["BURNT000".to_owned()], "p1", None).await.unwrap();
    let id = outcome.added[0].id.clone();
    stock.reserve(&id, None).await.unwrap();

    assert!(matches!(
      stock.edit(&id, "CHANGED0").await,
      Err(Error::KeyConsumed)
    ));
    assert!(matches!(stock.remove(&id).await, Err(Error::KeyConsumed)));

    let model =
      stock_key::Entity::find_by_id(&id).one(&db).await.unwrap().unwrap();
    assert_eq!(model.key, "BURNT000");
    assert!(model.used);
  }

  #[tokio::test]
  async fn test_edit_rejects_cross_namespace_collision() {
    let db = setup_test_db().await;
    let stock = Stock::new(&db);

    seed_sale(&db, "sale-0", "SOLD0000SOLD0000").await;
    let outcome =
      stock.bulk_add(&["FREE0000".to_owned()], "p1", None).await.unwrap();
    let id = outcome.added[0].id.clone();

    assert!(matches!(
      stock.edit(&id, "SOLD0000SOLD0000").await,
      Err(Error::KeyExists)
    ));

    let edited = stock.edit(&id, "FRESH000").await.unwrap();
    assert_eq!(edited.key, "FRESH000");
  }

  #[tokio::test]
  async fn test_stats() {
    let db = setup_test_db().await;
    let stock = Stock::new(&db);

    let outcome = stock
      .bulk_add(&["A1".to_owned(), "A2".to_owned()], "p1", None)
      .await
      .unwrap();
    stock.bulk_add(&["B1".to_owned()], "p2", None).await.unwrap();
    stock.reserve(&outcome.added[0].id, None).await.unwrap();

    let stats = stock.stats(None, None).await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.available, 2);
    assert_eq!(stats.used, 1);

    let stats = stock.stats(Some("p1"), None).await.unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.used, 1);
  }
}
