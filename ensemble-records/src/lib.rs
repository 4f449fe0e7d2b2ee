//! File-backed aggregates for ensemble.
//!
//! - [`config`]: YAML schema files → [`ensemble_core::Schema`]
//! - [`record`]: [`Record`], the dynamic sub-model every schema-file slot holds
//! - [`store`]: [`RecordStore`], JSON documents on disk
//! - [`error`]: [`StoreError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod record;
pub mod store;

pub use config::{
    load_schema_file, locate_schema, locate_schema_at, read_schema_file, schema_path,
    schema_path_at, SchemaFile, SlotEntry,
};
pub use error::{ConfigError, StoreError};
pub use record::{Record, RecordSpec};
pub use store::{RecordStore, StoredRecord};
