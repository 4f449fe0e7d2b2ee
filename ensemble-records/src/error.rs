//! Error types for ensemble-records.

use std::path::PathBuf;

use ensemble_core::SchemaError;
use thiserror::Error;

/// All errors that can arise from record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record document could not be encoded or decoded.
    #[error("record JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Aggregate or slot name that is not a single path component.
    #[error("'{name}' cannot be used as a store directory name")]
    InvalidName { name: String },

    #[error("record not found at {path}")]
    NotFound { path: PathBuf },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.ensemble/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// All errors that can arise from loading a schema file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error: includes file path and line context from serde_yaml.
    #[error("failed to parse schema file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Aggregate or slot name that cannot name a store directory.
    #[error("invalid name '{name}' in {path}: must be a single path component")]
    InvalidName { path: PathBuf, name: String },

    #[error("schema file not found at {path}")]
    NotFound { path: PathBuf },

    /// The declarations themselves are rejected by the schema builder.
    #[error("invalid schema in {path}: {source}")]
    Schema {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.ensemble/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
