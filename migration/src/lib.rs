//! Database migrations using SeaORM

pub use sea_orm_migration::prelude::*;

mod m20260815_000001_create_sales;
mod m20260815_000002_create_stock_keys;
mod m20260815_000003_create_coupons;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20260815_000001_create_sales::Migration),
      Box::new(m20260815_000002_create_stock_keys::Migration),
      Box::new(m20260815_000003_create_coupons::Migration),
    ]
  }
}
