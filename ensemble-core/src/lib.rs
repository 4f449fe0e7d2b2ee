//! Ensemble core library: schema registry, sub-model contract and the
//! aggregate orchestrator.
//!
//! Public API surface:
//! - [`types`]: slot names, dependency declarations, attribute bundles
//! - [`model`]: [`Model`], [`Validatable`], [`Persistable`], [`ModelRef`]
//! - [`registry`]: [`ModelRegistry`] (name → factory)
//! - [`schema`]: [`SchemaBuilder`] / [`Schema`]
//! - [`ensemble`]: [`Ensemble`] and the [`Aggregate`] trait
//! - [`error`]: [`SchemaError`], [`EnsembleError`], [`ValidationError`]

pub mod ensemble;
pub mod error;
pub mod model;
pub mod registry;
pub mod schema;
pub mod types;

pub use ensemble::{Aggregate, Ensemble};
pub use error::{AttributeError, EnsembleError, ReferenceError, SchemaError, ValidationError};
pub use model::{Model, ModelRef, Persistable, Validatable};
pub use registry::{ModelRegistry, ModelType};
pub use schema::{Schema, SchemaBuilder};
pub use types::{AttributeBundle, Attributes, DependencyDecl, SlotInput, SlotName};
