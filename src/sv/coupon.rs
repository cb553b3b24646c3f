//! Coupon validation and admin CRUD.
//!
//! Codes are canonical upper-cased/trimmed. Validity is re-checked on every
//! use; "missing", "inactive" and "expired" are one error class to callers.

use crate::entity::coupon;
use crate::prelude::*;

#[derive(Debug, Default)]
pub struct UpdateCoupon {
  pub percentage: Option<Decimal>,
  pub active: Option<bool>,
  /// `Some(None)` clears the expiry, `None` leaves it untouched.
  pub expires_at: Option<Option<DateTime>>,
}

pub struct Coupon<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Coupon<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub fn canonical(code: &str) -> String {
    code.trim().to_uppercase()
  }

  fn check_percentage(percentage: Decimal) -> Result<()> {
    if percentage >= Decimal::ZERO && percentage <= Decimal::ONE_HUNDRED {
      Ok(())
    } else {
      Err(Error::Validation("percentage must be between 0 and 100".into()))
    }
  }

  /// A coupon is usable iff it exists, is active, and has not expired.
  pub async fn validate(&self, code: &str) -> Result<coupon::Model> {
    let code = Self::canonical(code);
    let coupon = coupon::Entity::find_by_id(code)
      .one(self.db)
      .await?
      .ok_or(Error::CouponInvalid)?;

    if !coupon.active {
      return Err(Error::CouponInvalid);
    }

    let now = Utc::now().naive_utc();
    if let Some(expires_at) = coupon.expires_at
      && expires_at < now
    {
      return Err(Error::CouponInvalid);
    }

    Ok(coupon)
  }

  pub async fn create(
    &self,
    code: &str,
    percentage: Decimal,
    expires_at: Option<DateTime>,
  ) -> Result<coupon::Model> {
    Self::check_percentage(percentage)?;

    let code = Self::canonical(code);
    if code.is_empty() {
      return Err(Error::Validation("code must not be empty".into()));
    }

    let now = Utc::now().naive_utc();
    let model = coupon::ActiveModel {
      code: Set(code),
      percentage: Set(percentage),
      active: Set(true),
      expires_at: Set(expires_at),
      created_at: Set(now),
    };

    match model.insert(self.db).await {
      Ok(coupon) => Ok(coupon),
      Err(err)
        if matches!(
          err.sql_err(),
          Some(SqlErr::UniqueConstraintViolation(_))
        ) =>
      {
        Err(Error::CouponExists)
      }
      Err(err) => Err(err.into()),
    }
  }

  pub async fn update(
    &self,
    code: &str,
    changes: UpdateCoupon,
  ) -> Result<coupon::Model> {
    if let Some(percentage) = changes.percentage {
      Self::check_percentage(percentage)?;
    }

    let model = coupon::Entity::find_by_id(Self::canonical(code))
      .one(self.db)
      .await?
      .ok_or(Error::CouponNotFound)?;

    // nothing to change, skip the empty UPDATE
    if changes.percentage.is_none()
      && changes.active.is_none()
      && changes.expires_at.is_none()
    {
      return Ok(model);
    }

    let mut active_model: coupon::ActiveModel = model.into();
    if let Some(percentage) = changes.percentage {
      active_model.percentage = Set(percentage);
    }
    if let Some(active) = changes.active {
      active_model.active = Set(active);
    }
    if let Some(expires_at) = changes.expires_at {
      active_model.expires_at = Set(expires_at);
    }

    Ok(active_model.update(self.db).await?)
  }

  pub async fn delete(&self, code: &str) -> Result<()> {
    let res = coupon::Entity::delete_by_id(Self::canonical(code))
      .exec(self.db)
      .await?;

    if res.rows_affected == 0 {
      return Err(Error::CouponNotFound);
    }

    Ok(())
  }

  pub async fn list(&self) -> Result<Vec<coupon::Model>> {
    Ok(
      coupon::Entity::find()
        .order_by_desc(coupon::Column::CreatedAt)
        .all(self.db)
        .await?,
    )
  }
}

#[cfg(test)]
mod tests {
  use sea_orm::{ConnectionTrait, Database, DbBackend, Schema};

  use super::*;

  async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();

    let schema = Schema::new(DbBackend::Sqlite);
    let stmt = schema.create_table_from_entity(coupon::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    db
  }

  #[tokio::test]
  async fn test_create_canonicalizes_code() {
    let db = setup_test_db().await;
    let sv = Coupon::new(&db);

    let coupon = sv.create(" radiant ", Decimal::from(10), None).await.unwrap();
    assert_eq!(coupon.code, "RADIANT");

    // lookups canonicalize too
    let validated = sv.validate("radiant").await.unwrap();
    assert_eq!(validated.percentage, Decimal::from(10));
  }

  #[tokio::test]
  async fn test_fractional_percentage_roundtrips() {
    let db = setup_test_db().await;
    let sv = Coupon::new(&db);

    sv.create("HALF", Decimal::new(125, 1), None).await.unwrap();

    let validated = sv.validate("HALF").await.unwrap();
    assert_eq!(validated.percentage, Decimal::new(125, 1));
  }

  #[tokio::test]
  async fn test_duplicate_code_rejected() {
    let db = setup_test_db().await;
    let sv = Coupon::new(&db);

    sv.create("TEN", Decimal::from(10), None).await.unwrap();

    assert!(matches!(
      sv.create("ten", Decimal::from(20), None).await,
      Err(Error::CouponExists)
    ));
  }

  #[tokio::test]
  async fn test_percentage_range() {
    let db = setup_test_db().await;
    let sv = Coupon::new(&db);

    assert!(matches!(
      sv.create("BAD", Decimal::new(1005, 1), None).await,
      Err(Error::Validation(_))
    ));
    assert!(matches!(
      sv.create("BAD", Decimal::from(-1), None).await,
      Err(Error::Validation(_))
    ));
  }

  #[tokio::test]
  async fn test_expired_coupon_invalid_even_if_active() {
    let db = setup_test_db().await;
    let sv = Coupon::new(&db);

    let past = Utc::now().naive_utc() - chrono::Duration::days(1);
    sv.create("OLD", Decimal::from(15), Some(past)).await.unwrap();

    assert!(matches!(sv.validate("OLD").await, Err(Error::CouponInvalid)));
  }

  #[tokio::test]
  async fn test_inactive_coupon_invalid() {
    let db = setup_test_db().await;
    let sv = Coupon::new(&db);

    sv.create("PAUSED", Decimal::from(15), None).await.unwrap();
    sv.update(
      "PAUSED",
      UpdateCoupon { active: Some(false), ..Default::default() },
    )
    .await
    .unwrap();

    assert!(matches!(sv.validate("PAUSED").await, Err(Error::CouponInvalid)));
  }

  #[tokio::test]
  async fn test_update_clears_expiry() {
    let db = setup_test_db().await;
    let sv = Coupon::new(&db);

    let past = Utc::now().naive_utc() - chrono::Duration::days(1);
    sv.create("BACK", Decimal::from(5), Some(past)).await.unwrap();

    sv.update(
      "BACK",
      UpdateCoupon { expires_at: Some(None), ..Default::default() },
    )
    .await
    .unwrap();

    assert!(sv.validate("BACK").await.is_ok());
  }

  #[tokio::test]
  async fn test_delete_missing() {
    let db = setup_test_db().await;
    let sv = Coupon::new(&db);

    assert!(matches!(sv.delete("GHOST").await, Err(Error::CouponNotFound)));
  }
}
