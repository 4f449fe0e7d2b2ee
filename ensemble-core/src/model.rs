//! Capability contract between an ensemble and its sub-models.
//!
//! A sub-model implements [`Model`] (which requires [`Validatable`]) and, if
//! it can be persisted, exposes [`Persistable`] through
//! [`Model::as_persistable`]. Capabilities are looked up when an aggregate
//! operation needs them, so a slot may hold a model lacking persistence
//! until `save` is actually called.

use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::error::ReferenceError;
use crate::types::SlotName;

/// Type-erasure helper, implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Name of the concrete type behind a trait object.
    fn type_name(&self) -> &'static str;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Validation capability.
pub trait Validatable {
    /// Run validations under an optional context (e.g. `"create"`).
    ///
    /// May record errors on the model as a side effect.
    fn is_valid(&mut self, context: Option<&str>) -> bool;
}

/// Persistence capability.
pub trait Persistable {
    /// Persist the model, returning `false` on failure.
    fn save(&mut self) -> bool;
}

/// A sub-model that can occupy a slot.
pub trait Model: Validatable + AsAny + fmt::Debug {
    /// Point the reference field `name` at `target`.
    ///
    /// Called once per declared dependency edge after every slot is built.
    /// Models without such a field keep the default, which rejects it.
    fn set_reference(&mut self, name: &SlotName, target: ModelRef) -> Result<(), ReferenceError> {
        let _ = target;
        Err(ReferenceError::new(name))
    }

    /// Drop every reference set through [`set_reference`](Self::set_reference).
    ///
    /// Called for each slot when its ensemble is dropped, so that cyclic
    /// wiring (self-edges, longer cycles) does not keep the models alive.
    /// Models holding references must override it.
    fn clear_references(&mut self) {}

    fn as_persistable(&mut self) -> Option<&mut dyn Persistable> {
        None
    }
}

// ---------------------------------------------------------------------------
// ModelRef
// ---------------------------------------------------------------------------

/// Shared handle to a sub-model.
///
/// The ensemble owns one handle per slot; dependency wiring hands clones of
/// the same handle to referencing models, so equality is identity.
#[derive(Clone)]
pub struct ModelRef(Rc<RefCell<dyn Model>>);

impl ModelRef {
    pub fn new<T: Model>(model: T) -> Self {
        Self(Rc::new(RefCell::new(model)))
    }

    /// Immutably borrow the model. Panics if it is mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, dyn Model> {
        self.0.borrow()
    }

    /// Mutably borrow the model. Panics if it is already borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, dyn Model> {
        self.0.borrow_mut()
    }

    pub fn try_borrow(&self) -> Option<Ref<'_, dyn Model>> {
        self.0.try_borrow().ok()
    }

    pub fn try_borrow_mut(&self) -> Option<RefMut<'_, dyn Model>> {
        self.0.try_borrow_mut().ok()
    }

    /// Borrow as the concrete type `T`, or `None` if the model is another type.
    pub fn downcast_ref<T: Model>(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.0.borrow(), |m: &dyn Model| m.as_any().downcast_ref::<T>()).ok()
    }

    /// Like [`downcast_ref`](Self::downcast_ref), but `None` instead of a
    /// panic while the model is mutably borrowed.
    pub fn try_downcast_ref<T: Model>(&self) -> Option<Ref<'_, T>> {
        let guard = self.0.try_borrow().ok()?;
        Ref::filter_map(guard, |m: &dyn Model| m.as_any().downcast_ref::<T>()).ok()
    }

    /// Mutably borrow as the concrete type `T`.
    pub fn downcast_mut<T: Model>(&self) -> Option<RefMut<'_, T>> {
        RefMut::filter_map(self.0.borrow_mut(), |m: &mut dyn Model| {
            m.as_any_mut().downcast_mut::<T>()
        })
        .ok()
    }

    pub fn is<T: Model>(&self) -> bool {
        self.model_type_id() == TypeId::of::<T>()
    }

    pub fn model_type_id(&self) -> TypeId {
        let guard = self.0.borrow();
        let model: &dyn Model = &*guard;
        model.as_any().type_id()
    }

    pub fn type_name(&self) -> &'static str {
        let guard = self.0.borrow();
        let model: &dyn Model = &*guard;
        model.type_name()
    }

    /// True when both handles point at the same sub-model.
    pub fn ptr_eq(&self, other: &ModelRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ModelRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ModelRef {}

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(model) => f.debug_tuple("ModelRef").field(&&*model).finish(),
            Err(_) => f.write_str("ModelRef(<borrowed>)"),
        }
    }
}
