use migration::{Migrator, MigratorTrait};

use crate::catalog::{Catalog, HttpCatalog};
use crate::prelude::*;
use crate::sv;

#[derive(Debug, Clone)]
pub struct Config {
  pub catalog_url: String,
  pub admin_token: String,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      catalog_url: String::from("http://localhost:4000/api"),
      admin_token: String::new(),
    }
  }
}

pub struct Services<'a> {
  pub stock: sv::Stock<'a>,
  pub coupon: sv::Coupon<'a>,
  pub sale: sv::Sale<'a>,
}

pub struct AppState {
  pub db: DatabaseConnection,
  pub catalog: Box<dyn Catalog>,
  pub config: Config,
}

impl AppState {
  pub async fn new(db_url: &str, config: Config) -> Self {
    info!("Connecting to database...");
    let db =
      Database::connect(db_url).await.expect("Failed to connect to database");

    info!("Running migrations...");
    Migrator::up(&db, None).await.expect("Failed to run migrations");

    let catalog = Box::new(HttpCatalog::new(config.catalog_url.clone()));

    Self { db, catalog, config }
  }

  pub fn sv(&self) -> Services<'_> {
    Services {
      stock: sv::Stock::new(&self.db),
      coupon: sv::Coupon::new(&self.db),
      sale: sv::Sale::new(&self.db),
    }
  }

  pub fn checkout(&self) -> sv::Checkout<'_> {
    sv::Checkout::new(&self.db, self.catalog.as_ref())
  }
}
