//! Storefront Harvest: a resumable, rate-limit-aware record harvester
//!
//! This crate walks a dense integer identifier space exposed by a record API,
//! stores one record per identifier, and then fans out from those records to a
//! dependent endpoint. Both stages survive being killed and restarted without
//! refetching completed work.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid header configuration: {0}")]
    Header(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// A stored record did not have the shape needed to derive a join key
///
/// These are data errors, never fetch errors: the entry is skipped and never
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataShapeError {
    #[error("missing field '{path}'")]
    MissingField { path: String },

    #[error("field '{path}' has an unsupported type")]
    UnsupportedType { path: String },
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{FetchClient, FetchOutcome, RunSummary, StopReason};
pub use state::{BackoffAction, BackoffController, RunState};
pub use storage::{PurchaseRecord, StoreRecord};
