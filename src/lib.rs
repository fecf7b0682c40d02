// Purchase Analytics - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod model;
pub mod analytics;
pub mod repository;
pub mod error;
pub mod db;
pub mod feed;
pub mod config;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use model::{Customer, Product, PriceRange, Purchase};
pub use analytics::{AnalyticsReport, PurchaseAnalytics, UNKNOWN_CUSTOMER_DEBT};
pub use repository::{InMemoryRepository, PurchaseRepository, SourceType};
pub use error::{AnalyticsError, ConfigError, RepositoryError};
pub use db::{
    SqlPurchaseRepository,
    setup_database, import_purchase, load_purchases, verify_count,
};
pub use feed::{
    CsvPurchaseRepository, JsonPurchaseRepository, FeedLocation,
    parse_csv, parse_json,
};
pub use config::AppConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialise tracing output for the binaries (`RUST_LOG`, default `info`)
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // Ignore the error when a subscriber is already installed (tests, embedding)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
