//! Schema registry: declared slots and dependency edges of one aggregate type.
//!
//! A [`SchemaBuilder`] accumulates declarations and enforces the structural
//! invariants; [`SchemaBuilder::build`] freezes them into an immutable
//! [`Schema`] that is shared (usually behind an `Arc`) by every ensemble of
//! that type.
//!
//! Cycle detection is pairwise only: declaring `b -> a` after `a -> b` fails,
//! but longer cycles (`a -> b -> c -> a`) and self-edges are accepted.

use crate::error::SchemaError;
use crate::registry::ModelRegistry;
use crate::types::{DependencyDecl, SlotName};

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Declaration-time builder for a [`Schema`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    slots: Vec<SlotName>,
    dependencies: Vec<(SlotName, SlotName)>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Append a slot. Repeated names are appended again, not rejected;
    /// treat them as a caller error.
    pub fn declare_slot(&mut self, name: impl Into<SlotName>) -> &mut Self {
        let name = name.into();
        if self.slots.contains(&name) {
            tracing::warn!(schema = %self.name, slot = %name, "slot declared more than once");
        } else {
            tracing::debug!(schema = %self.name, slot = %name, "declared slot");
        }
        self.slots.push(name);
        self
    }

    /// Declare several slots in argument order.
    pub fn declare_slots<I, N>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = N>,
        N: Into<SlotName>,
    {
        for name in names {
            self.declare_slot(name);
        }
        self
    }

    /// Declare that the `from` slot holds a reference to the `to` slot.
    ///
    /// A second dependency from the same `from` slot replaces the first.
    /// On error the edge map is left untouched.
    pub fn declare_dependency(&mut self, decl: DependencyDecl) -> Result<&mut Self, SchemaError> {
        let from = decl
            .from
            .ok_or(SchemaError::IncompleteDependency { missing: "from" })?;
        let to = decl
            .to
            .ok_or(SchemaError::IncompleteDependency { missing: "to" })?;

        if introduces_cycle(&self.dependencies, &from, &to) {
            return Err(SchemaError::DependencyCycle { from, to });
        }

        match self.dependencies.iter_mut().find(|(existing, _)| *existing == from) {
            Some(edge) => {
                tracing::warn!(
                    schema = %self.name,
                    from = %from,
                    replaced = %edge.1,
                    to = %to,
                    "dependency replaced"
                );
                edge.1 = to;
            }
            None => {
                tracing::debug!(schema = %self.name, from = %from, to = %to, "declared dependency");
                self.dependencies.push((from, to));
            }
        }
        Ok(self)
    }

    pub fn slots(&self) -> &[SlotName] {
        &self.slots
    }

    pub fn dependencies(&self) -> &[(SlotName, SlotName)] {
        &self.dependencies
    }

    /// Freeze the declarations. `registry` resolves slot names to model types
    /// when ensembles are built.
    pub fn build(self, registry: ModelRegistry) -> Schema {
        Schema {
            name: self.name,
            slots: self.slots,
            dependencies: self.dependencies,
            registry,
        }
    }
}

fn introduces_cycle(edges: &[(SlotName, SlotName)], from: &SlotName, to: &SlotName) -> bool {
    edges
        .iter()
        .any(|(existing_from, existing_to)| existing_from == to && existing_to == from)
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Immutable slot and dependency declarations for one aggregate type.
#[derive(Debug)]
pub struct Schema {
    name: String,
    slots: Vec<SlotName>,
    dependencies: Vec<(SlotName, SlotName)>,
    registry: ModelRegistry,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared slots in declaration order, duplicates included.
    pub fn slots(&self) -> &[SlotName] {
        &self.slots
    }

    /// `(from, to)` edges in declaration order.
    pub fn dependencies(&self) -> &[(SlotName, SlotName)] {
        &self.dependencies
    }

    pub fn dependency_of(&self, from: &SlotName) -> Option<&SlotName> {
        self.dependencies
            .iter()
            .find(|(existing, _)| existing == from)
            .map(|(_, to)| to)
    }

    pub fn contains_slot(&self, slot: &SlotName) -> bool {
        self.slots.contains(slot)
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
