//! Error types for ensemble-core.

use std::fmt;

use thiserror::Error;

use crate::ensemble::Ensemble;
use crate::types::SlotName;

/// Declaration-time errors. Fatal to the declaring code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A dependency declaration lacks its `from` or `to` end.
    #[error("dependency declaration is missing `{missing}`; both `from` and `to` are required")]
    IncompleteDependency { missing: &'static str },

    /// The reverse edge `to -> from` was already declared.
    #[error("{from} is already a dependency of {to}")]
    DependencyCycle { from: SlotName, to: SlotName },
}

/// Failure to build a sub-model from an attribute mapping.
#[derive(Debug, Error)]
pub enum AttributeError {
    /// Attribute mapping did not decode into the model type.
    #[error("attribute decoding failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unknown attribute '{0}'")]
    Unknown(String),

    #[error("invalid attribute '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

/// Returned by a sub-model that has no reference field with the given name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("no reference field named '{name}'")]
pub struct ReferenceError {
    pub name: SlotName,
}

impl ReferenceError {
    pub fn new(name: impl Into<SlotName>) -> Self {
        Self { name: name.into() }
    }
}

/// Construction, slot-access and capability errors of an [`Ensemble`].
#[derive(Debug, Error)]
pub enum EnsembleError {
    /// The schema's model registry has no factory for the slot.
    #[error("no model type registered for slot '{slot}'")]
    UnknownModel { slot: SlotName },

    /// Bundle entry is neither an attribute mapping nor an instance of the
    /// slot's registered type.
    #[error("slot '{slot}' expects an attribute mapping or an instance of {expected}, got {found}")]
    TypeMismatch {
        slot: SlotName,
        expected: &'static str,
        found: String,
    },

    /// The slot's constructor rejected the attribute mapping.
    #[error("failed to build '{slot}' from attributes: {source}")]
    Attributes {
        slot: SlotName,
        #[source]
        source: AttributeError,
    },

    /// Dependency wiring failed because `from` has no field named `to`.
    #[error("cannot wire dependency: '{from}' has no reference named '{to}'")]
    UnknownReference { from: SlotName, to: SlotName },

    #[error("no such slot '{slot}'")]
    NoSuchSlot { slot: SlotName },

    /// The sub-model is still borrowed by the caller (e.g. a live
    /// `get_as` guard) while an aggregate operation needs it.
    #[error("model in slot '{slot}' is already borrowed")]
    SlotBusy { slot: SlotName },

    /// An aggregate operation needs a capability the sub-model lacks.
    #[error("model in slot '{slot}' does not support {capability}")]
    MissingCapability {
        slot: SlotName,
        capability: &'static str,
    },
}

/// Aggregate validation failure. Borrows the ensemble so the caller can
/// inspect the sub-models that reported invalid.
#[derive(Error)]
#[error("aggregate validation failed for {}", join_slots(.invalid_slots))]
pub struct ValidationError<'a> {
    ensemble: &'a Ensemble,
    invalid_slots: Vec<SlotName>,
}

impl<'a> ValidationError<'a> {
    pub(crate) fn new(ensemble: &'a Ensemble, invalid_slots: Vec<SlotName>) -> Self {
        Self {
            ensemble,
            invalid_slots,
        }
    }

    pub fn ensemble(&self) -> &'a Ensemble {
        self.ensemble
    }

    /// Slots whose sub-model reported invalid, in declaration order.
    pub fn invalid_slots(&self) -> &[SlotName] {
        &self.invalid_slots
    }
}

impl fmt::Debug for ValidationError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationError")
            .field("schema", &self.ensemble.schema().name())
            .field("invalid_slots", &self.invalid_slots)
            .finish()
    }
}

fn join_slots(slots: &[SlotName]) -> String {
    slots
        .iter()
        .map(SlotName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
