//! Read-only product/plan catalog boundary.
//!
//! The catalog is an external service; the allocation engine only ever needs
//! `product(id)` and `plan(id)` lookups, so that is the whole trait.

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::prelude::*;

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct Product {
  pub id: String,
  pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct Plan {
  pub id: String,
  pub product_id: String,
  pub name: String,
  pub value: Decimal,
}

#[async_trait]
pub trait Catalog: Send + Sync {
  async fn product(&self, id: &str) -> Result<Option<Product>>;
  async fn plan(&self, id: &str) -> Result<Option<Plan>>;
}

/// Catalog client over the storefront's catalog service HTTP API.
pub struct HttpCatalog {
  http: reqwest::Client,
  base: String,
}

impl HttpCatalog {
  pub fn new(base: impl Into<String>) -> Self {
    let base: String = base.into();
    Self {
      http: reqwest::Client::new(),
      base: base.trim_end_matches('/').to_owned(),
    }
  }

  async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
    let url = format!("{}/{}", self.base, path);
    let res = self
      .http
      .get(&url)
      .send()
      .await
      .map_err(|err| Error::Catalog(err.to_string()))?;

    if res.status() == reqwest::StatusCode::NOT_FOUND {
      return Ok(None);
    }

    let res =
      res.error_for_status().map_err(|err| Error::Catalog(err.to_string()))?;
    let value =
      res.json::<T>().await.map_err(|err| Error::Catalog(err.to_string()))?;

    Ok(Some(value))
  }
}

#[async_trait]
impl Catalog for HttpCatalog {
  async fn product(&self, id: &str) -> Result<Option<Product>> {
    self.fetch(&format!("products/{id}")).await
  }

  async fn plan(&self, id: &str) -> Result<Option<Plan>> {
    self.fetch(&format!("plans/{id}")).await
  }
}

#[cfg(test)]
pub mod memory {
  use std::collections::HashMap;

  use super::*;

  /// In-memory catalog for tests.
  #[derive(Default)]
  pub struct MemoryCatalog {
    products: HashMap<String, Product>,
    plans: HashMap<String, Plan>,
  }

  impl MemoryCatalog {
    pub fn with_product(mut self, id: &str, name: &str) -> Self {
      self.products.insert(
        id.to_owned(),
        Product { id: id.to_owned(), name: name.to_owned() },
      );
      self
    }

    pub fn with_plan(
      mut self,
      id: &str,
      product_id: &str,
      value: Decimal,
    ) -> Self {
      self.plans.insert(
        id.to_owned(),
        Plan {
          id: id.to_owned(),
          product_id: product_id.to_owned(),
          name: id.to_owned(),
          value,
        },
      );
      self
    }
  }

  #[async_trait]
  impl Catalog for MemoryCatalog {
    async fn product(&self, id: &str) -> Result<Option<Product>> {
      Ok(self.products.get(id).cloned())
    }

    async fn plan(&self, id: &str) -> Result<Option<Plan>> {
      Ok(self.plans.get(id).cloned())
    }
  }
}
