//! Core error types for screenlimit-core.
//!
//! Components return these internally. The enforcement engine absorbs them
//! at its boundary and logs them, so none of them reach the user as a crash.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for screenlimit-core.
///
/// Host capability failures stay [`PlatformError`]s: every caller absorbs
/// them where they happen.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistent counter store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Key-value store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Read or write failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked by another writer
    #[error("Store is locked")]
    Locked,

    /// A value could not be encoded for storage
    #[error("Failed to encode value for '{key}': {message}")]
    Encode { key: String, message: String },
}

/// Errors reported by a host platform capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The host does not provide this capability
    #[error("{capability} is not available on this host")]
    Unavailable { capability: &'static str },

    /// The capability exists but the call failed
    #[error("{capability} failed: {message}")]
    Failed {
        capability: &'static str,
        message: String,
    },

    /// The user refused the permission the capability needs
    #[error("permission denied for {capability}")]
    PermissionDenied { capability: &'static str },
}

impl PlatformError {
    pub fn failed(capability: &'static str, message: impl Into<String>) -> Self {
        PlatformError::Failed {
            capability,
            message: message.into(),
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors for user-supplied selections.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Monitored set exceeds the configured maximum
    #[error("at most {max} apps can be monitored (got {len})")]
    TooManyApps { max: usize, len: usize },

    /// Blank application identifier
    #[error("application identifier must not be empty")]
    EmptyAppId,

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
