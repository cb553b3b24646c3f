pub use chrono::{Datelike, NaiveDateTime as DateTime, Utc};
pub use rust_decimal::Decimal;
pub use sea_orm::{
  ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait,
  PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr,
};
pub use tracing::{debug, error, info, warn};

pub use crate::error::{Error, Result};
