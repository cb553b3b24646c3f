//! Storefront Server - key inventory and order fulfillment
//!
//! Architecture:
//! - SeaORM for database access (SQLite)
//! - Axum for HTTP API with rate limiting
//! - External catalog service for product/plan read models
//! - Tokio for async runtime

mod auth;
mod catalog;
mod entity;
mod error;
mod handlers;
mod prelude;
mod state;
mod sv;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{delete, get, patch, post, put};
use tower::ServiceBuilder;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::prelude::*;
use crate::state::{AppState, Config};

#[tokio::main]
async fn main() {
  dotenvy::dotenv().ok();

  // Initialize tracing
  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "storefront=debug,tower_http=debug,axum=trace,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  // Load configuration from environment
  let db_url = env::var("DATABASE_URL")
    .unwrap_or_else(|_| "sqlite:storefront.db?mode=rwc".into());
  let config = Config {
    catalog_url: env::var("CATALOG_URL").expect("CATALOG_URL not set"),
    admin_token: env::var("ADMIN_TOKEN").expect("ADMIN_TOKEN not set"),
  };

  info!("Starting Storefront Server v{}", env!("CARGO_PKG_VERSION"));

  // Initialize application state
  let app_state = Arc::new(AppState::new(&db_url, config).await);

  // Configure rate limiting (100 requests per minute per IP)
  let governor_conf = Arc::new(
    GovernorConfigBuilder::default()
      .per_second(2)
      .burst_size(100)
      .finish()
      .expect("Failed to build rate limiter config"),
  );

  let governor_limiter = governor_conf.limiter().clone();

  // Spawn rate limiter cleanup task
  tokio::spawn(async move {
    loop {
      tokio::time::sleep(Duration::from_secs(60)).await;
      governor_limiter.retain_recent();
    }
  });

  // Build router with middleware
  let app = Router::new()
    // checkout
    .route("/api/checkout", post(handlers::checkout))
    // stock inventory
    .route("/api/stock", get(handlers::list_stock).post(handlers::add_stock))
    .route("/api/stock/stats", get(handlers::stock_stats))
    .route(
      "/api/stock/available/{product_id}",
      get(handlers::available_stock),
    )
    .route(
      "/api/stock/{id}",
      delete(handlers::remove_stock).patch(handlers::edit_stock),
    )
    .route("/api/stock/{id}/use", patch(handlers::use_stock))
    // coupons
    .route("/api/coupons", post(handlers::create_coupon))
    .route("/api/coupons/admin", get(handlers::list_coupons))
    .route("/api/coupons/validate/{code}", get(handlers::validate_coupon))
    .route(
      "/api/coupons/{code}",
      put(handlers::update_coupon).delete(handlers::delete_coupon),
    )
    // sales ledger
    .route("/api/sales", get(handlers::list_sales).post(handlers::create_sale))
    .route("/api/sales/stats/dashboard", get(handlers::sales_dashboard))
    .route("/api/sales/{id}", get(handlers::get_sale))
    .route("/health", get(handlers::health))
    // Middleware
    .layer(
      ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(
          CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        ),
    )
    .with_state(app_state);

  // Start HTTP server
  let port: u16 =
    env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(3000);
  let addr = SocketAddr::from(([0, 0, 0, 0], port));

  info!("HTTP server listening on {}", addr);

  let listener =
    tokio::net::TcpListener::bind(addr).await.expect("Failed to bind");
  axum::serve(listener, app).await.expect("Server error");
}
