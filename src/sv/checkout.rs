//! Allocation engine - turns cart units into uniquely-keyed sales.
//!
//! Each unit is processed sequentially (stock consumed by unit i must be
//! invisible to unit i+1) and independently: a failed unit is recorded and
//! never rolls back units that already reached a sale.

use rust_decimal::RoundingStrategy;
use serde::Deserialize;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::entity::{SaleStatus, sale, stock_key};
use crate::prelude::*;
use crate::sv;
use crate::sv::registry::{self, MAX_MINT_ATTEMPTS};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
  pub product_id: String,
  pub plan_id: Option<String>,
  pub quantity: u32,
}

/// Authenticated principal attached to the checkout request. `id` is `None`
/// only for system-created sales going through the ledger directly.
#[derive(Clone, Debug)]
pub struct Buyer {
  pub id: Option<String>,
  pub email: String,
  pub name: String,
}

#[derive(Debug, Default)]
pub struct CheckoutOutcome {
  pub sales: Vec<sale::Model>,
  pub errors: Vec<String>,
}

impl CheckoutOutcome {
  /// Nothing was sold and at least one unit failed.
  pub fn failed(&self) -> bool {
    self.sales.is_empty() && !self.errors.is_empty()
  }
}

/// Per-unit price after the proportional coupon discount, rounded half-up to
/// currency precision. Discounts are per unit, never cart-level, so refunds
/// and stock reports stay consistent across mixed carts.
pub fn unit_price(base: Decimal, percentage: Option<Decimal>) -> Decimal {
  match percentage {
    None => base,
    Some(pct) => (base * (Decimal::ONE_HUNDRED - pct) / Decimal::ONE_HUNDRED)
      .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
  }
}

pub struct Checkout<'a> {
  db: &'a DatabaseConnection,
  catalog: &'a dyn Catalog,
  generate: registry::KeyGen,
}

impl<'a> Checkout<'a> {
  pub fn new(db: &'a DatabaseConnection, catalog: &'a dyn Catalog) -> Self {
    Self { db, catalog, generate: registry::candidate }
  }

  #[cfg(test)]
  pub fn with_generator(
    db: &'a DatabaseConnection,
    catalog: &'a dyn Catalog,
    generate: registry::KeyGen,
  ) -> Self {
    Self { db, catalog, generate }
  }

  /// Fulfill a cart. Request-level problems (empty cart, unusable coupon)
  /// abort before any unit runs; line and unit problems are collected into
  /// the outcome while the rest of the cart proceeds.
  pub async fn process(
    &self,
    buyer: &Buyer,
    lines: &[CartLine],
    coupon_code: Option<&str>,
  ) -> Result<CheckoutOutcome> {
    if lines.is_empty() {
      return Err(Error::Validation("cart is empty".into()));
    }

    // validity is re-checked per call, never cached across a session
    let discount = match coupon_code {
      Some(code) => {
        Some(sv::Coupon::new(self.db).validate(code).await?.percentage)
      }
      None => None,
    };

    let mut outcome = CheckoutOutcome::default();

    for line in lines {
      let product = match self.catalog.product(&line.product_id).await {
        Ok(Some(product)) => product,
        Ok(None) => {
          outcome
            .errors
            .push(format!("product {} not found", line.product_id));
          continue;
        }
        Err(err) => {
          outcome.errors.push(format!("product {}: {err}", line.product_id));
          continue;
        }
      };

      let base = match &line.plan_id {
        Some(plan_id) => match self.catalog.plan(plan_id).await {
          Ok(Some(plan)) if plan.product_id == product.id => plan.value,
          Ok(Some(_)) => {
            outcome.errors.push(format!(
              "plan {plan_id} does not belong to product {}",
              product.id
            ));
            continue;
          }
          Ok(None) => {
            outcome.errors.push(format!("plan {plan_id} not found"));
            continue;
          }
          Err(err) => {
            outcome.errors.push(format!("plan {plan_id}: {err}"));
            continue;
          }
        },
        None => Decimal::ZERO,
      };

      if line.quantity == 0 {
        outcome.errors.push(format!(
          "product {}: quantity must be at least 1",
          line.product_id
        ));
        continue;
      }

      let value = unit_price(base, discount);

      for _ in 0..line.quantity {
        match self.allocate_unit(buyer, line, value).await {
          Ok(sale) => outcome.sales.push(sale),
          Err(err) => {
            outcome.errors.push(format!("product {}: {err}", line.product_id));
          }
        }
      }
    }

    info!(
      sold = outcome.sales.len(),
      failed = outcome.errors.len(),
      "checkout processed"
    );

    Ok(outcome)
  }

  /// One requested unit -> exactly one sale. Stock-first: an unused stock key
  /// is reserved when one exists; a lost reservation race or an empty pool
  /// falls back to a generated key.
  async fn allocate_unit(
    &self,
    buyer: &Buyer,
    line: &CartLine,
    value: Decimal,
  ) -> Result<sale::Model> {
    let stock = sv::Stock::new(self.db);

    let mut reserved: Option<stock_key::Model> = None;
    if let Some(hit) = stock
      .find_available(&line.product_id, line.plan_id.as_deref())
      .await?
    {
      match stock.reserve(&hit.id, None).await {
        Ok(model) => reserved = Some(model),
        // lost the race to a concurrent checkout, fall through to generation
        Err(Error::KeyAlreadyUsed | Error::StockNotFound) => {
          debug!(stock_key = %hit.id, "reservation lost, generating instead");
        }
        Err(err) => return Err(err),
      }
    }

    let registry = sv::Registry::with_generator(self.db, self.generate);

    for _ in 0..MAX_MINT_ATTEMPTS {
      let key = match &reserved {
        Some(stock_key) => stock_key.key.clone(),
        None => registry.mint().await?,
      };

      let now = Utc::now().naive_utc();
      let model = sale::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        key: Set(key),
        product_id: Set(line.product_id.clone()),
        plan_id: Set(line.plan_id.clone()),
        buyer_id: Set(buyer.id.clone()),
        buyer_email: Set(buyer.email.clone()),
        buyer_name: Set(buyer.name.clone()),
        value: Set(value),
        status: Set(SaleStatus::Completed),
        created_at: Set(now),
      };

      match model.insert(self.db).await {
        Ok(sale) => {
          // the sale is recorded; a broken back-link must not fail the unit
          if let Some(stock_key) = &reserved
            && let Err(err) = stock.link_sale(&stock_key.id, &sale.id).await
          {
            warn!(
              sale = %sale.id,
              stock_key = %stock_key.id,
              "sale recorded but stock back-link failed: {err}"
            );
          }
          return Ok(sale);
        }
        Err(err)
          if matches!(
            err.sql_err(),
            Some(SqlErr::UniqueConstraintViolation(_))
          ) =>
        {
          if reserved.is_some() {
            // a reserved stock key colliding with an existing sale means the
            // shared namespace was violated out of band; do not spin on it
            return Err(Error::KeyExists);
          }
          // generated key lost the insert race, mint another
        }
        Err(err) => return Err(err.into()),
      }
    }

    Err(Error::KeyCollisionExhausted)
  }
}
