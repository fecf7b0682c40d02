// ⚙️ Configuration - pick the purchase source at startup
//
// Read once by the hosting binary; the resulting repository is injected into
// PurchaseAnalytics. Nothing here is global.

use crate::db::SqlPurchaseRepository;
use crate::error::ConfigError;
use crate::feed::{CsvPurchaseRepository, FeedLocation, JsonPurchaseRepository};
use crate::repository::{PurchaseRepository, SourceType};
use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

pub const DEFAULT_DATABASE_PATH: &str = "purchases.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub source: SourceType,
    pub csv_path: Option<String>,
    pub json_path: Option<String>,
    pub database_path: PathBuf,
    pub bind_addr: String,
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment
    pub fn from_env() -> Result<Self> {
        // A missing .env file is normal outside development
        let _ = dotenv::dotenv();
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Build from an explicit variable map (same keys as the environment)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let source: SourceType = get("SOURCE").ok_or(ConfigError::MissingVar("SOURCE"))?.parse()?;
        let config = AppConfig {
            source,
            csv_path: get("CSV_PATH"),
            json_path: get("JSON_PATH"),
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        };

        match config.source {
            SourceType::Csv if config.csv_path.is_none() => {
                Err(ConfigError::MissingVar("CSV_PATH").into())
            }
            SourceType::Json if config.json_path.is_none() => {
                Err(ConfigError::MissingVar("JSON_PATH").into())
            }
            _ => Ok(config),
        }
    }

    /// Construct the repository this configuration selects
    pub fn build_repository(&self) -> Result<Box<dyn PurchaseRepository>> {
        let repository: Box<dyn PurchaseRepository> = match self.source {
            SourceType::Sql => Box::new(SqlPurchaseRepository::open(&self.database_path)?),
            SourceType::Csv => {
                let location = self.csv_path.as_deref().ok_or(ConfigError::MissingVar("CSV_PATH"))?;
                Box::new(CsvPurchaseRepository::new(FeedLocation::parse(location)))
            }
            SourceType::Json => {
                let location = self.json_path.as_deref().ok_or(ConfigError::MissingVar("JSON_PATH"))?;
                Box::new(JsonPurchaseRepository::new(FeedLocation::parse(location)))
            }
            SourceType::Memory => Box::new(crate::repository::InMemoryRepository::new()),
        };

        info!(source = %self.source, "purchase repository ready");
        Ok(repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_sql_defaults() {
        let config = AppConfig::from_vars(&vars(&[("SOURCE", "sql")])).unwrap();

        assert_eq!(config.source, SourceType::Sql);
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DATABASE_PATH));
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
    }

    #[test]
    fn test_feed_requires_location() {
        let err = AppConfig::from_vars(&vars(&[("SOURCE", "csv")])).unwrap_err();
        assert_eq!(err.to_string(), "environment variable CSV_PATH is not set");

        let err = AppConfig::from_vars(&vars(&[("SOURCE", "json"), ("JSON_PATH", "  ")])).unwrap_err();
        assert_eq!(err.to_string(), "environment variable JSON_PATH is not set");

        let config = AppConfig::from_vars(&vars(&[
            ("SOURCE", "json"),
            ("JSON_PATH", "https://example.com/purchases.json"),
            ("BIND_ADDR", "127.0.0.1:8080"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn test_unknown_or_missing_source() {
        assert!(AppConfig::from_vars(&vars(&[])).is_err());

        let err = AppConfig::from_vars(&vars(&[("SOURCE", "xml")])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::UnknownSource(_))
        ));
    }

    #[test]
    fn test_build_repository_selects_adapter() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("purchases.db");

        let config = AppConfig::from_vars(&vars(&[
            ("SOURCE", "sql"),
            ("DATABASE_PATH", db_path.to_str().unwrap()),
        ]))
        .unwrap();
        let repo = config.build_repository().unwrap();
        assert_eq!(repo.source_type(), SourceType::Sql);
        assert!(repo.get_purchases().unwrap().is_empty());

        let config = AppConfig::from_vars(&vars(&[("SOURCE", "csv"), ("CSV_PATH", "feed.csv")])).unwrap();
        assert_eq!(config.build_repository().unwrap().source_type(), SourceType::Csv);

        let config = AppConfig::from_vars(&vars(&[("SOURCE", "memory")])).unwrap();
        let repo = config.build_repository().unwrap();
        assert_eq!(repo.source_type(), SourceType::Memory);
        assert!(repo.get_purchases().unwrap().is_empty());
    }
}
