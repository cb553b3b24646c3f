pub mod checkout;
pub mod coupon;
pub mod registry;
pub mod sale;
pub mod stock;

pub use checkout::Checkout;
pub use coupon::Coupon;
pub use registry::Registry;
pub use sale::Sale;
pub use stock::Stock;
