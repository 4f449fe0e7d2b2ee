//! Ensemble: one orchestrated instance of an aggregate.
//!
//! Construction builds one sub-model per declared slot from an
//! [`AttributeBundle`], then wires every dependency edge. Aggregate
//! operations fan out over the sub-models in slot declaration order:
//!
//! | operation       | visits                        | result                     |
//! |-----------------|-------------------------------|----------------------------|
//! | [`is_valid`]    | every slot                    | `true` iff all valid       |
//! | [`save`]        | up to the first failing slot  | `true` iff all saved       |
//! | [`force_save`]  | every slot                    | nothing; failures ignored  |
//!
//! [`is_valid`]: Ensemble::is_valid
//! [`save`]: Ensemble::save
//! [`force_save`]: Ensemble::force_save

use std::cell::{Ref, RefMut};
use std::sync::Arc;

use crate::error::{EnsembleError, ValidationError};
use crate::model::{Model, ModelRef};
use crate::schema::Schema;
use crate::types::{AttributeBundle, SlotInput, SlotName};

/// An aggregate instance owning one sub-model per declared slot.
#[derive(Debug)]
pub struct Ensemble {
    schema: Arc<Schema>,
    instances: Vec<(SlotName, ModelRef)>,
}

impl Ensemble {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Build every slot from `bundle` and wire the declared dependencies.
    ///
    /// Fails without returning a partial ensemble if any slot cannot be
    /// resolved or built, or if a dependency cannot be wired.
    pub fn new(schema: Arc<Schema>, bundle: AttributeBundle) -> Result<Self, EnsembleError> {
        let mut instances: Vec<(SlotName, ModelRef)> = Vec::with_capacity(schema.slots().len());

        for slot in schema.slots() {
            let model = build_slot(&schema, slot, bundle.get(slot))?;
            match instances.iter_mut().find(|(existing, _)| existing == slot) {
                Some(entry) => entry.1 = model,
                None => instances.push((slot.clone(), model)),
            }
        }

        let mut ensemble = Self { schema, instances };
        ensemble.wire_dependencies()?;

        tracing::debug!(
            schema = ensemble.schema.name(),
            slots = ensemble.instances.len(),
            "ensemble constructed"
        );
        Ok(ensemble)
    }

    /// Construct and [`save`](Self::save). The ensemble is returned whether
    /// or not the save succeeded.
    pub fn create(schema: Arc<Schema>, bundle: AttributeBundle) -> Result<Self, EnsembleError> {
        let ensemble = Self::new(schema, bundle)?;
        ensemble.save()?;
        Ok(ensemble)
    }

    /// Construct and [`force_save`](Self::force_save).
    pub fn force_create(
        schema: Arc<Schema>,
        bundle: AttributeBundle,
    ) -> Result<Self, EnsembleError> {
        let ensemble = Self::new(schema, bundle)?;
        ensemble.force_save()?;
        Ok(ensemble)
    }

    fn wire_dependencies(&mut self) -> Result<(), EnsembleError> {
        let schema = Arc::clone(&self.schema);
        for (from, to) in schema.dependencies() {
            let source = self.get(from)?.clone();
            let target = self.get(to)?.clone();
            source
                .borrow_mut()
                .set_reference(to, target)
                .map_err(|_| EnsembleError::UnknownReference {
                    from: from.clone(),
                    to: to.clone(),
                })?;
            tracing::debug!(from = %from, to = %to, "wired dependency");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Slot access
    // -----------------------------------------------------------------------

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Owned slots in declaration order (each name once).
    pub fn iter(&self) -> impl Iterator<Item = (&SlotName, &ModelRef)> {
        self.instances.iter().map(|(slot, model)| (slot, model))
    }

    /// The sub-model held by `slot`.
    pub fn get(&self, slot: impl Into<SlotName>) -> Result<&ModelRef, EnsembleError> {
        let slot = slot.into();
        self.instances
            .iter()
            .find(|(existing, _)| *existing == slot)
            .map(|(_, model)| model)
            .ok_or(EnsembleError::NoSuchSlot { slot })
    }

    /// Borrow `slot` as the concrete type `T`.
    pub fn get_as<T: Model>(&self, slot: impl Into<SlotName>) -> Result<Ref<'_, T>, EnsembleError> {
        let slot = slot.into();
        let model = self.get(&slot)?;
        model
            .downcast_ref::<T>()
            .ok_or_else(|| type_mismatch::<T>(slot, model))
    }

    /// Mutably borrow `slot` as the concrete type `T`.
    pub fn get_mut_as<T: Model>(
        &self,
        slot: impl Into<SlotName>,
    ) -> Result<RefMut<'_, T>, EnsembleError> {
        let slot = slot.into();
        let model = self.get(&slot)?;
        model
            .downcast_mut::<T>()
            .ok_or_else(|| type_mismatch::<T>(slot, model))
    }

    /// Replace the sub-model held by `slot`.
    ///
    /// No type check is made, and references other sub-models already hold
    /// to the previous instance are left as they are.
    pub fn set(&mut self, slot: impl Into<SlotName>, model: ModelRef) -> Result<(), EnsembleError> {
        let slot = slot.into();
        match self.instances.iter_mut().find(|(existing, _)| *existing == slot) {
            Some(entry) => {
                entry.1 = model;
                Ok(())
            }
            None => Err(EnsembleError::NoSuchSlot { slot }),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// True iff every sub-model is valid. Every sub-model is validated, even
    /// after one has reported invalid.
    ///
    /// # Panics
    ///
    /// Panics if a sub-model is still borrowed, e.g. through a live
    /// [`get_as`](Self::get_as) or [`get_mut_as`](Self::get_mut_as) guard.
    pub fn is_valid(&self, context: Option<&str>) -> bool {
        self.invalid_slots(context).is_empty()
    }

    pub fn is_invalid(&self, context: Option<&str>) -> bool {
        !self.is_valid(context)
    }

    /// Like [`is_valid`](Self::is_valid), but returns an error carrying this
    /// ensemble and the invalid slots.
    ///
    /// # Panics
    ///
    /// Same as [`is_valid`](Self::is_valid).
    pub fn validate(&self, context: Option<&str>) -> Result<(), ValidationError<'_>> {
        let invalid = self.invalid_slots(context);
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self, invalid))
        }
    }

    fn invalid_slots(&self, context: Option<&str>) -> Vec<SlotName> {
        let mut invalid = Vec::new();
        for (slot, model) in &self.instances {
            if !model.borrow_mut().is_valid(context) {
                tracing::debug!(slot = %slot, context = ?context, "sub-model invalid");
                invalid.push(slot.clone());
            }
        }
        invalid
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Save every sub-model in slot order, stopping at the first failure.
    ///
    /// Returns `Ok(true)` only if all sub-models saved. Sub-models after a
    /// failing one are never saved. A sub-model still borrowed by the caller
    /// is [`EnsembleError::SlotBusy`].
    pub fn save(&self) -> Result<bool, EnsembleError> {
        for (slot, model) in &self.instances {
            let mut model = borrow_for_save(slot, model)?;
            let persistable = model
                .as_persistable()
                .ok_or_else(|| missing_save(slot))?;
            if !persistable.save() {
                tracing::warn!(slot = %slot, "save failed; remaining slots skipped");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Call `save` on every sub-model in slot order, ignoring the results.
    ///
    /// Unlike [`save`](Self::save) this neither stops at nor reports a
    /// failing sub-model. The asymmetry is kept on purpose for existing
    /// callers; do not rely on `force_save` to halt on failure.
    pub fn force_save(&self) -> Result<(), EnsembleError> {
        for (slot, model) in &self.instances {
            let mut model = borrow_for_save(slot, model)?;
            let persistable = model
                .as_persistable()
                .ok_or_else(|| missing_save(slot))?;
            if !persistable.save() {
                tracing::warn!(slot = %slot, "save failed; ignored by force_save");
            }
        }
        Ok(())
    }
}

// Breaks reference cycles created by wiring; an `Rc` cycle would otherwise
// keep every sub-model on it alive. Instances the caller still holds lose
// their wired references too.
impl Drop for Ensemble {
    fn drop(&mut self) {
        for (slot, model) in &self.instances {
            match model.try_borrow_mut() {
                Some(mut model) => model.clear_references(),
                None => tracing::warn!(slot = %slot, "sub-model borrowed at drop; references kept"),
            }
        }
    }
}

fn borrow_for_save<'a>(
    slot: &SlotName,
    model: &'a ModelRef,
) -> Result<RefMut<'a, dyn Model>, EnsembleError> {
    model
        .try_borrow_mut()
        .ok_or_else(|| EnsembleError::SlotBusy { slot: slot.clone() })
}

fn build_slot(
    schema: &Schema,
    slot: &SlotName,
    input: Option<&SlotInput>,
) -> Result<ModelRef, EnsembleError> {
    let model_type = schema
        .registry()
        .resolve(slot)
        .ok_or_else(|| EnsembleError::UnknownModel { slot: slot.clone() })?;

    let attrs = match input {
        None => None,
        Some(SlotInput::Attributes(attrs)) => Some(attrs),
        Some(SlotInput::Instance(model)) if model_type.accepts(model) => {
            return Ok(model.clone());
        }
        Some(other) => {
            return Err(EnsembleError::TypeMismatch {
                slot: slot.clone(),
                expected: model_type.type_name(),
                found: other.describe(),
            });
        }
    };

    model_type
        .construct(attrs)
        .map_err(|source| EnsembleError::Attributes {
            slot: slot.clone(),
            source,
        })
}

fn type_mismatch<T>(slot: SlotName, model: &ModelRef) -> EnsembleError {
    EnsembleError::TypeMismatch {
        slot,
        expected: std::any::type_name::<T>(),
        found: format!("an instance of {}", model.type_name()),
    }
}

fn missing_save(slot: &SlotName) -> EnsembleError {
    EnsembleError::MissingCapability {
        slot: slot.clone(),
        capability: "save",
    }
}

// ---------------------------------------------------------------------------
// Aggregate types
// ---------------------------------------------------------------------------

/// A typed aggregate backed by an [`Ensemble`] and a static schema.
///
/// ```ignore
/// struct Signup(Ensemble);
///
/// impl Aggregate for Signup {
///     fn schema() -> Arc<Schema> {
///         static SCHEMA: OnceLock<Arc<Schema>> = OnceLock::new();
///         SCHEMA.get_or_init(build_signup_schema).clone()
///     }
///     fn from_ensemble(ensemble: Ensemble) -> Self { Signup(ensemble) }
///     fn ensemble(&self) -> &Ensemble { &self.0 }
/// }
/// ```
pub trait Aggregate: Sized {
    fn schema() -> Arc<Schema>;

    fn from_ensemble(ensemble: Ensemble) -> Self;

    fn ensemble(&self) -> &Ensemble;

    fn build(bundle: AttributeBundle) -> Result<Self, EnsembleError> {
        Ensemble::new(Self::schema(), bundle).map(Self::from_ensemble)
    }

    /// Build and `save`; returned whether or not the save succeeded.
    fn create(bundle: AttributeBundle) -> Result<Self, EnsembleError> {
        Ensemble::create(Self::schema(), bundle).map(Self::from_ensemble)
    }

    /// Build and `force_save`.
    fn force_create(bundle: AttributeBundle) -> Result<Self, EnsembleError> {
        Ensemble::force_create(Self::schema(), bundle).map(Self::from_ensemble)
    }
}
