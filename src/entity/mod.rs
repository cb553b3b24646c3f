//! SeaORM entity definitions for the storefront core.

pub mod coupon;
pub mod sale;
pub mod stock_key;

pub use sale::SaleStatus;
