//! YAML schema files.
//!
//! # File layout
//!
//! ```text
//! ~/.ensemble/
//!   schemas/
//!     <name>.yaml     (one aggregate per file)
//! ```
//!
//! ```yaml
//! name: signup
//! slots:
//!   - name: org
//!     required: [name]
//!   - name: user
//!     required: [name, org]
//!     references: [org]
//! dependencies:
//!   - { from: user, to: org }
//! ```
//!
//! A slot may also be given as a bare name (`- org`). The `to` end of every
//! dependency is added to the `from` slot's references automatically.
//!
//! As in the store, path helpers come in two forms: `fn_at(home, …)` for
//! tests and `fn(…)` deriving home from `dirs::home_dir()`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ensemble_core::{
    AttributeError, Attributes, DependencyDecl, ModelRegistry, Schema, SchemaBuilder, SlotName,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::record::{Record, RecordSpec};
use crate::store::{is_path_component, RecordStore};

// ---------------------------------------------------------------------------
// 1. File format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        required: Vec<String>,
        #[serde(default)]
        references: Vec<SlotName>,
    },
}

impl SlotEntry {
    pub fn name(&self) -> SlotName {
        match self {
            Self::Name(name) | Self::Detailed { name, .. } => SlotName::new(name),
        }
    }

    pub fn required(&self) -> &[String] {
        match self {
            Self::Name(_) => &[],
            Self::Detailed { required, .. } => required,
        }
    }

    pub fn references(&self) -> &[SlotName] {
        match self {
            Self::Name(_) => &[],
            Self::Detailed { references, .. } => references,
        }
    }
}

/// A parsed schema file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFile {
    pub name: String,
    #[serde(default)]
    pub slots: Vec<SlotEntry>,
    #[serde(default)]
    pub dependencies: Vec<DependencyDecl>,
}

impl SchemaFile {
    /// Parse YAML text; `path` is only used for error context.
    pub fn parse(yaml: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Declare every slot and dependency on a fresh builder.
    ///
    /// The schema name and every canonical slot name become store
    /// directories, so each must be a single path component: `../x`,
    /// `/abs` and `Admin::User` (→ `admin/user`) are rejected.
    pub fn builder(&self, path: &Path) -> Result<SchemaBuilder, ConfigError> {
        let slot_names = self.slots.iter().map(|entry| entry.name().as_str().to_owned());
        for name in std::iter::once(self.name.clone()).chain(slot_names) {
            if !is_path_component(&name) {
                return Err(ConfigError::InvalidName {
                    path: path.to_path_buf(),
                    name,
                });
            }
        }

        let mut builder = SchemaBuilder::new(&self.name);
        builder.declare_slots(self.slots.iter().map(SlotEntry::name));
        for decl in &self.dependencies {
            builder
                .declare_dependency(decl.clone())
                .map_err(|source| ConfigError::Schema {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        Ok(builder)
    }

    /// One [`RecordSpec`] per slot, references completed from `builder`'s
    /// dependency edges.
    pub fn record_specs(&self, builder: &SchemaBuilder) -> Vec<RecordSpec> {
        self.slots
            .iter()
            .map(|entry| {
                let slot = entry.name();
                let mut spec = RecordSpec::new(&self.name, slot.clone());
                for field in entry.required() {
                    spec = spec.require(field.clone());
                }
                for reference in entry.references() {
                    spec = spec.reference(reference.clone());
                }
                for (from, to) in builder.dependencies() {
                    if *from == slot {
                        spec = spec.reference(to.clone());
                    }
                }
                spec
            })
            .collect()
    }

    /// Build the schema with a [`Record`] factory registered for each slot.
    ///
    /// Without a store the records validate but fail to save.
    pub fn into_schema(
        self,
        path: &Path,
        store: Option<Arc<RecordStore>>,
    ) -> Result<Schema, ConfigError> {
        let builder = self.builder(path)?;
        let mut registry = ModelRegistry::new();
        for spec in self.record_specs(&builder) {
            let slot = spec.slot.clone();
            let spec = Arc::new(spec);
            let store = store.clone();
            registry.register_with(slot, move |attrs: Option<&Attributes>| {
                build_record(&spec, store.as_ref(), attrs)
            });
        }
        Ok(builder.build(registry))
    }
}

fn build_record(
    spec: &Arc<RecordSpec>,
    store: Option<&Arc<RecordStore>>,
    attrs: Option<&Attributes>,
) -> Result<Record, AttributeError> {
    let mut record = Record::new(Arc::clone(spec));
    if let Some(store) = store {
        record = record.with_store(Arc::clone(store));
    }
    match attrs {
        Some(attrs) => record.with_attributes(attrs.clone()),
        None => Ok(record),
    }
}

// ---------------------------------------------------------------------------
// 2. Paths
// ---------------------------------------------------------------------------

/// `<home>/.ensemble/schemas/<name>.yaml`: pure, no I/O.
pub fn schema_path_at(home: &Path, name: &str) -> PathBuf {
    home.join(".ensemble")
        .join("schemas")
        .join(format!("{name}.yaml"))
}

/// `<home>/.ensemble/schemas/<name>.yaml` (convenience: uses `dirs::home_dir()`).
pub fn schema_path(name: &str) -> Result<PathBuf, ConfigError> {
    Ok(schema_path_at(&home()?, name))
}

/// Resolve a command-line schema argument.
///
/// Anything that looks like a path (an existing file, a `.yaml`/`.yml`
/// suffix, or a path separator) is used as-is; otherwise it names a file
/// under `<home>/.ensemble/schemas/`.
pub fn locate_schema_at(home: &Path, arg: &str) -> PathBuf {
    let candidate = Path::new(arg);
    let looks_like_path = candidate.is_file()
        || arg.ends_with(".yaml")
        || arg.ends_with(".yml")
        || arg.contains(std::path::MAIN_SEPARATOR)
        || arg.contains('/');
    if looks_like_path {
        candidate.to_path_buf()
    } else {
        schema_path_at(home, arg)
    }
}

pub fn locate_schema(arg: &str) -> Result<PathBuf, ConfigError> {
    Ok(locate_schema_at(&home()?, arg))
}

// ---------------------------------------------------------------------------
// 3. Loading
// ---------------------------------------------------------------------------

/// Read and parse a schema file without building it.
pub fn read_schema_file(path: &Path) -> Result<SchemaFile, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    SchemaFile::parse(&contents, path)
}

/// Read a schema file and build its schema, binding every record to `store`.
pub fn load_schema_file(
    path: &Path,
    store: Option<Arc<RecordStore>>,
) -> Result<Schema, ConfigError> {
    let file = read_schema_file(path)?;
    tracing::debug!(path = %path.display(), schema = %file.name, "loaded schema file");
    file.into_schema(path, store)
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
