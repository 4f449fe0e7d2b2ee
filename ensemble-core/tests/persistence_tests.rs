//! Fan-out semantics of aggregate validation and persistence, checked with
//! call-counting sub-models on a three-slot schema.
//!
//! `save` stops at the first failing slot; `force_save` visits every slot and
//! ignores failures. The asymmetry is intentional and pinned here so that
//! changing it is a deliberate, visible decision.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use ensemble_core::{
    AttributeBundle, Attributes, Ensemble, Model, ModelRef, ModelRegistry, Persistable, Schema,
    Validatable,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
struct Counters {
    validations: Rc<Cell<usize>>,
    saves: Rc<Cell<usize>>,
}

#[derive(Debug, Default)]
struct Step {
    valid: bool,
    save_ok: bool,
    counters: Counters,
}

impl Validatable for Step {
    fn is_valid(&mut self, _context: Option<&str>) -> bool {
        self.counters.validations.set(self.counters.validations.get() + 1);
        self.valid
    }
}

impl Persistable for Step {
    fn save(&mut self) -> bool {
        self.counters.saves.set(self.counters.saves.get() + 1);
        self.save_ok
    }
}

impl Model for Step {
    fn as_persistable(&mut self) -> Option<&mut dyn Persistable> {
        Some(self)
    }
}

const SLOTS: [&str; 3] = ["first", "second", "third"];

fn schema() -> Arc<Schema> {
    let mut registry = ModelRegistry::new();
    for slot in SLOTS {
        registry.register_with(slot, |_attrs: Option<&Attributes>| Ok(Step::default()));
    }
    let mut builder = Schema::builder("steps");
    builder.declare_slots(SLOTS);
    Arc::new(builder.build(registry))
}

/// Build a bundle of steps with the given `(valid, save_ok)` flags, returning
/// the counters for each slot.
fn steps(flags: [(bool, bool); 3]) -> (AttributeBundle, Vec<Counters>) {
    let mut bundle = AttributeBundle::new();
    let mut counters = Vec::new();
    for (slot, (valid, save_ok)) in SLOTS.into_iter().zip(flags) {
        let c = Counters::default();
        bundle.insert(
            slot,
            ModelRef::new(Step {
                valid,
                save_ok,
                counters: c.clone(),
            }),
        );
        counters.push(c);
    }
    (bundle, counters)
}

fn saves(counters: &[Counters]) -> Vec<usize> {
    counters.iter().map(|c| c.saves.get()).collect()
}

fn validations(counters: &[Counters]) -> Vec<usize> {
    counters.iter().map(|c| c.validations.get()).collect()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn validation_visits_every_slot_after_a_failure() {
    let (bundle, counters) = steps([(false, true), (true, true), (false, true)]);
    let ensemble = Ensemble::new(schema(), bundle).expect("new");

    assert!(!ensemble.is_valid(None));
    assert_eq!(validations(&counters), [1, 1, 1]);
}

#[test]
fn validate_reports_all_invalid_slots() {
    let (bundle, _counters) = steps([(false, true), (true, true), (false, true)]);
    let ensemble = Ensemble::new(schema(), bundle).expect("new");
    let err = ensemble.validate(None).unwrap_err();
    let invalid: Vec<&str> = err.invalid_slots().iter().map(|s| s.as_str()).collect();
    assert_eq!(invalid, ["first", "third"]);
}

// ---------------------------------------------------------------------------
// save
// ---------------------------------------------------------------------------

#[test]
fn save_succeeds_when_every_slot_saves() {
    let (bundle, counters) = steps([(true, true); 3]);
    let ensemble = Ensemble::new(schema(), bundle).expect("new");

    assert!(ensemble.save().expect("save"));
    assert_eq!(saves(&counters), [1, 1, 1]);
}

#[test]
fn save_halts_at_first_failing_slot() {
    let (bundle, counters) = steps([(true, true), (true, false), (true, true)]);
    let ensemble = Ensemble::new(schema(), bundle).expect("new");

    assert!(!ensemble.save().expect("save"));
    assert_eq!(saves(&counters), [1, 1, 0], "third slot must never be saved");
}

#[test]
fn save_does_not_validate_on_its_own() {
    let (bundle, counters) = steps([(false, true); 3]);
    let ensemble = Ensemble::new(schema(), bundle).expect("new");

    assert!(ensemble.save().expect("save"));
    assert_eq!(validations(&counters), [0, 0, 0]);
}

// ---------------------------------------------------------------------------
// force_save: unconditional visit, failures ignored
// ---------------------------------------------------------------------------

#[test]
fn force_save_visits_every_slot_even_after_a_failure() {
    let (bundle, counters) = steps([(true, false), (true, false), (true, true)]);
    let ensemble = Ensemble::new(schema(), bundle).expect("new");

    ensemble.force_save().expect("force_save");
    assert_eq!(saves(&counters), [1, 1, 1]);
}

// ---------------------------------------------------------------------------
// create / force_create
// ---------------------------------------------------------------------------

#[test]
fn create_returns_ensemble_even_when_save_fails() {
    let (bundle, counters) = steps([(true, false), (true, true), (true, true)]);
    let ensemble = Ensemble::create(schema(), bundle).expect("create");

    assert_eq!(ensemble.iter().count(), 3);
    assert_eq!(saves(&counters), [1, 0, 0]);
}

#[test]
fn force_create_uses_unconditional_visit() {
    let (bundle, counters) = steps([(true, false), (true, false), (true, false)]);
    let ensemble = Ensemble::force_create(schema(), bundle).expect("force_create");

    assert_eq!(ensemble.iter().count(), 3);
    assert_eq!(saves(&counters), [1, 1, 1]);
}

#[test]
fn create_with_default_constructed_steps() {
    // Default steps fail to save; the first failure stops the loop.
    let ensemble = Ensemble::create(schema(), AttributeBundle::new()).expect("create");
    let first = ensemble.get_as::<Step>("first").expect("first");
    let second = ensemble.get_as::<Step>("second").expect("second");
    assert_eq!(first.counters.saves.get(), 1);
    assert_eq!(second.counters.saves.get(), 0);
}
