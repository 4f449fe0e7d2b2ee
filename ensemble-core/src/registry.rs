//! Model registry: explicit name → factory table used to resolve a slot's
//! concrete type.
//!
//! Populate it once at startup and hand it to [`SchemaBuilder::build`].
//!
//! ```
//! use ensemble_core::{ModelRegistry, Model, Validatable};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, Deserialize)]
//! struct Org { name: Option<String> }
//!
//! impl Validatable for Org {
//!     fn is_valid(&mut self, _context: Option<&str>) -> bool { self.name.is_some() }
//! }
//! impl Model for Org {}
//!
//! let mut registry = ModelRegistry::new();
//! registry.register::<Org>();
//! assert!(registry.contains(&"org".into()));
//! ```
//!
//! [`SchemaBuilder::build`]: crate::schema::SchemaBuilder::build

use std::any::TypeId;
use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::AttributeError;
use crate::model::{Model, ModelRef};
use crate::types::{Attributes, SlotName};

type Factory = dyn Fn(Option<&Attributes>) -> Result<ModelRef, AttributeError> + Send + Sync;

/// A registered, constructible model type.
pub struct ModelType {
    type_id: TypeId,
    type_name: &'static str,
    factory: Box<Factory>,
}

impl ModelType {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Build a new instance, default-constructed when `attrs` is `None`.
    pub fn construct(&self, attrs: Option<&Attributes>) -> Result<ModelRef, AttributeError> {
        (self.factory)(attrs)
    }

    /// True when `model` is an instance of this type.
    pub fn accepts(&self, model: &ModelRef) -> bool {
        model.model_type_id() == self.type_id
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelType")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Name → factory table.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    types: BTreeMap<SlotName, ModelType>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its own type name (`UserProfile` → `user_profile`).
    ///
    /// Instances are default-constructed without attributes and deserialized
    /// from the attribute mapping otherwise.
    pub fn register<T>(&mut self) -> &mut Self
    where
        T: Model + Default + DeserializeOwned,
    {
        self.register_as::<T>(SlotName::of::<T>())
    }

    /// Register `T` under an explicit name.
    pub fn register_as<T>(&mut self, name: impl Into<SlotName>) -> &mut Self
    where
        T: Model + Default + DeserializeOwned,
    {
        self.register_with(name, |attrs: Option<&Attributes>| match attrs {
            Some(attrs) => Ok(serde_json::from_value::<T>(Value::Object(attrs.clone()))?),
            None => Ok(T::default()),
        })
    }

    /// Register `T` under `name` with a custom constructor.
    pub fn register_with<T, F>(&mut self, name: impl Into<SlotName>, factory: F) -> &mut Self
    where
        T: Model,
        F: Fn(Option<&Attributes>) -> Result<T, AttributeError> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(model = %name, type_name = std::any::type_name::<T>(), "registered model type");
        self.types.insert(
            name,
            ModelType {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                factory: Box::new(move |attrs| factory(attrs).map(ModelRef::new)),
            },
        );
        self
    }

    pub fn contains(&self, name: &SlotName) -> bool {
        self.types.contains_key(name)
    }

    pub fn resolve(&self, name: &SlotName) -> Option<&ModelType> {
        self.types.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &SlotName> {
        self.types.keys()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
