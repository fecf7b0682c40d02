// Typed errors for repositories, aggregation and configuration.
// All convert into anyhow::Error at call sites via `?`.

use crate::repository::SourceType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The adapter's medium cannot perform this operation (e.g. writing to a CSV feed)
    #[error("{source_type} repository does not support {operation}")]
    Unsupported {
        source_type: SourceType,
        operation: &'static str,
    },

    #[error("malformed {source_type} record at {location}: {reason}")]
    MalformedRecord {
        source_type: SourceType,
        location: String,
        reason: String,
    },

    #[error("feed {location} answered with HTTP {status}")]
    FeedUnavailable { location: String, status: u16 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalyticsError {
    /// A money sum or difference left the range `Decimal` can represent
    #[error("amount overflow while computing {operation}")]
    AmountOverflow { operation: &'static str },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),

    #[error("unsupported repository type: {0:?} (expected sql, csv, json or memory)")]
    UnknownSource(String),
}
