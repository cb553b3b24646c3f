//! Key registry - the shared uniqueness domain of stock keys and sale keys.
//!
//! Both collections delegate collision checks here so the cross-namespace
//! invariant lives in one place. The check-then-insert sequence is not atomic;
//! writers close the race with the unique index on the `key` columns and
//! treat a unique violation as "regenerate and retry".

use rand::Rng;

use crate::entity::{sale, stock_key};
use crate::prelude::*;

pub const KEY_LENGTH: usize = 16;
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Bounded retries keep namespace exhaustion detectable instead of spinning.
pub const MAX_MINT_ATTEMPTS: usize = 10;

/// Candidate source for [`Registry::mint`].
pub type KeyGen = fn() -> String;

/// Uniformly random key over the shared alphabet.
pub fn candidate() -> String {
  let mut rng = rand::thread_rng();
  (0..KEY_LENGTH)
    .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
    .collect()
}

pub struct Registry<'a> {
  db: &'a DatabaseConnection,
  generate: KeyGen,
}

impl<'a> Registry<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self::with_generator(db, candidate)
  }

  pub fn with_generator(db: &'a DatabaseConnection, generate: KeyGen) -> Self {
    Self { db, generate }
  }

  /// True if `key` exists in either namespace.
  pub async fn is_taken(&self, key: &str) -> Result<bool> {
    let in_stock = stock_key::Entity::find()
      .filter(stock_key::Column::Key.eq(key))
      .count(self.db)
      .await?;
    if in_stock > 0 {
      return Ok(true);
    }

    let in_sales = sale::Entity::find()
      .filter(sale::Column::Key.eq(key))
      .count(self.db)
      .await?;
    Ok(in_sales > 0)
  }

  /// Mint a key free in both namespaces, regenerating on collision.
  pub async fn mint(&self) -> Result<String> {
    for _ in 0..MAX_MINT_ATTEMPTS {
      let key = (self.generate)();
      if !self.is_taken(&key).await? {
        return Ok(key);
      }
    }

    error!("key generation exhausted after {MAX_MINT_ATTEMPTS} attempts");
    Err(Error::KeyCollisionExhausted)
  }
}

#[cfg(test)]
mod tests {
  use sea_orm::{ConnectionTrait, Database, DbBackend, Schema};
  use uuid::Uuid;

  use super::*;
  use crate::entity::{SaleStatus, coupon, sale, stock_key};

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

  #[test]
  fn test_candidate_shape() {
    let key = candidate();

    assert_eq!(key.len(), KEY_LENGTH);
    assert!(key.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
  }

  #[tokio::test]
  async fn test_is_taken_covers_both_namespaces() {
    let db = setup_test_db().await;
    let now = Utc::now().naive_utc();

    stock_key::ActiveModel {
      id: Set(Uuid::new_v4().to_string()),
      key: Set("STOCKED0STOCKED0".into()),
      product_id: Set("p1".into()),
      plan_id: Set(None),
      used: Set(false),
      used_at: Set(None),
      sale_id: Set(None),
      created_at: Set(now),
    }
    .insert(&db)
    .await
    .unwrap();

    sale::ActiveModel {
      id: Set(Uuid::new_v4().to_string()),
      key: Set("SOLD0000SOLD0000".into()),
      product_id: Set("p1".into()),
      plan_id: Set(None),
      buyer_id: Set(None),
      buyer_email: Set("a@b.c".into()),
      buyer_name: Set(String::new()),
      value: Set(Decimal::ZERO),
      status: Set(SaleStatus::Completed),
      created_at: Set(now),
    }
    .insert(&db)
    .await
    .unwrap();

    let registry = Registry::new(&db);
    assert!(registry.is_taken("STOCKED0STOCKED0").await.unwrap());
    assert!(registry.is_taken("SOLD0000SOLD0000").await.unwrap());
    assert!(!registry.is_taken("FREE0000FREE0000").await.unwrap());
  }

  #[tokio::test]
  async fn test_mint_returns_free_key() {
    let db = setup_test_db().await;
    let registry = Registry::new(&db);

    let key = registry.mint().await.unwrap();

    assert_eq!(key.len(), KEY_LENGTH);
    assert!(!registry.is_taken(&key).await.unwrap());
  }

  #[tokio::test]
  async fn test_mint_gives_up_after_bounded_attempts() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static ATTEMPTS: AtomicUsize = AtomicUsize::new(0);

    fn stuck() -> String {
      ATTEMPTS.fetch_add(1, Ordering::SeqCst);
      "SOLD0000SOLD0000".into()
    }

    let db = setup_test_db().await;
    let now = Utc::now().naive_utc();

    sale::ActiveModel {
      id: Set(Uuid::new_v4().to_string()),
      key: Set("SOLD0000SOLD0000".into()),
      product_id: Set("p1".into()),
      plan_id: Set(None),
      buyer_id: Set(None),
      buyer_email: Set("a@b.c".into()),
      buyer_name: Set(String::new()),
      value: Set(Decimal::ZERO),
      status: Set(SaleStatus::Completed),
      created_at: Set(now),
    }
    .insert(&db)
    .await
    .unwrap();

    let registry = Registry::with_generator(&db, stuck);

    assert!(matches!(
      registry.mint().await,
      Err(Error::KeyCollisionExhausted)
    ));
    assert_eq!(ATTEMPTS.load(Ordering::SeqCst), MAX_MINT_ATTEMPTS);
  }
}
