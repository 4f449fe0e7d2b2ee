//! Two-slot aggregate: a user that belongs to an org.
//!
//! The user → org relation is modeled as a plain `org` reference on the user
//! rather than a foreign key, which is all the ensemble needs to wire.

use std::sync::{Arc, OnceLock};

use ensemble_core::{
    Aggregate, AttributeBundle, DependencyDecl, Ensemble, EnsembleError, Model, ModelRef,
    ModelRegistry, ReferenceError, Schema, SlotName, Validatable,
};
use serde::Deserialize;
use serde_json::json;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct User {
    name: Option<String>,
    age: Option<u32>,
    #[serde(skip)]
    org: Option<ModelRef>,
}

impl Validatable for User {
    fn is_valid(&mut self, _context: Option<&str>) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty()) && self.age.is_some() && self.org.is_some()
    }
}

impl Model for User {
    fn set_reference(&mut self, name: &SlotName, target: ModelRef) -> Result<(), ReferenceError> {
        match name.as_str() {
            "org" => {
                self.org = Some(target);
                Ok(())
            }
            _ => Err(ReferenceError::new(name)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Org {
    name: Option<String>,
    #[allow(dead_code)]
    place: Option<String>,
}

impl Validatable for Org {
    fn is_valid(&mut self, _context: Option<&str>) -> bool {
        self.name.as_deref().is_some_and(|n| !n.is_empty())
    }
}

impl Model for Org {}

fn user_org_schema() -> Schema {
    let mut registry = ModelRegistry::new();
    registry.register::<User>().register::<Org>();

    let mut builder = Schema::builder("user_org");
    builder.declare_slot("user").declare_slot("org");
    builder
        .declare_dependency(DependencyDecl::between("user", "org"))
        .expect("user -> org");
    builder.build(registry)
}

struct UserOrgModel(Ensemble);

impl Aggregate for UserOrgModel {
    fn schema() -> Arc<Schema> {
        static SCHEMA: OnceLock<Arc<Schema>> = OnceLock::new();
        SCHEMA.get_or_init(|| Arc::new(user_org_schema())).clone()
    }

    fn from_ensemble(ensemble: Ensemble) -> Self {
        Self(ensemble)
    }

    fn ensemble(&self) -> &Ensemble {
        &self.0
    }
}

fn bundle() -> AttributeBundle {
    AttributeBundle::new()
        .with("user", json!({"name": "Nils", "age": 22}))
        .with("org", json!({"name": "Nils' Webdesign Agency"}))
}

fn build() -> Ensemble {
    UserOrgModel::build(bundle()).expect("build").0
}

// ---------------------------------------------------------------------------
// Construction & wiring
// ---------------------------------------------------------------------------

#[test]
fn attributes_feed_the_matching_slot() {
    let ensemble = build();
    let user = ensemble.get_as::<User>("user").expect("user");
    assert_eq!(user.name.as_deref(), Some("Nils"));
    assert_eq!(user.age, Some(22));
    let org = ensemble.get_as::<Org>("org").expect("org");
    assert_eq!(org.name.as_deref(), Some("Nils' Webdesign Agency"));
}

#[test]
fn dependency_wires_the_same_instance() {
    let ensemble = build();
    let org = ensemble.get("org").expect("org").clone();
    let user = ensemble.get_as::<User>("user").expect("user");
    let wired = user.org.as_ref().expect("org wired");
    assert!(wired.ptr_eq(&org), "user.org must be the ensemble's org instance");
}

#[test]
fn prebuilt_instances_are_used_directly() {
    let user = ModelRef::new(User {
        name: Some("Nils".into()),
        age: Some(22),
        org: None,
    });
    let org = ModelRef::new(Org {
        name: Some("Nils' Webdesign Agency".into()),
        place: None,
    });
    let bundle = AttributeBundle::new()
        .with("user", user.clone())
        .with("org", org.clone());

    let ensemble = Ensemble::new(UserOrgModel::schema(), bundle).expect("new");
    assert!(ensemble.is_valid(None));
    assert_eq!(ensemble.get("user").expect("user"), &user);
    assert_eq!(ensemble.get("org").expect("org"), &org);
}

#[test]
fn only_mappings_or_matching_instances_are_accepted() {
    let bundle = AttributeBundle::new()
        .with("user", json!("String instead of User"))
        .with("org", json!("String instead of Org"));
    let err = Ensemble::new(UserOrgModel::schema(), bundle).unwrap_err();
    match err {
        EnsembleError::TypeMismatch { slot, found, .. } => {
            assert_eq!(slot.as_str(), "user");
            assert_eq!(found, "a string");
        }
        other => panic!("expected TypeMismatch, got: {other}"),
    }
}

#[test]
fn instance_of_wrong_type_is_a_type_mismatch() {
    let bundle = AttributeBundle::new().with("user", ModelRef::new(Org::default()));
    let err = Ensemble::new(UserOrgModel::schema(), bundle).unwrap_err();
    assert!(matches!(err, EnsembleError::TypeMismatch { .. }), "got: {err}");
    assert!(err.to_string().contains("Org"), "got: {err}");
}

#[test]
fn bad_attribute_type_fails_construction() {
    let bundle = AttributeBundle::new().with("user", json!({"name": "Nils", "age": "old"}));
    let err = Ensemble::new(UserOrgModel::schema(), bundle).unwrap_err();
    assert!(matches!(err, EnsembleError::Attributes { .. }), "got: {err}");
}

#[test]
fn missing_slot_entry_is_default_constructed() {
    let bundle = AttributeBundle::new().with("org", json!({"name": "Acme"}));
    let ensemble = Ensemble::new(UserOrgModel::schema(), bundle).expect("new");
    assert!(ensemble.get_as::<User>("user").expect("user").name.is_none());
    assert!(ensemble.is_invalid(None));
}

// ---------------------------------------------------------------------------
// Slot access
// ---------------------------------------------------------------------------

#[test]
fn unknown_slot_is_reported() {
    let ensemble = build();
    let err = ensemble.get("billing").unwrap_err();
    assert!(matches!(err, EnsembleError::NoSuchSlot { ref slot } if slot.as_str() == "billing"));
}

#[test]
fn get_as_wrong_type_is_a_type_mismatch() {
    let ensemble = build();
    let err = ensemble.get_as::<Org>("user").unwrap_err();
    assert!(matches!(err, EnsembleError::TypeMismatch { .. }), "got: {err}");
}

#[test]
fn set_is_permissive_and_does_not_rewire() {
    let mut ensemble = build();
    let old_org = ensemble.get("org").expect("org").clone();

    // Any model is accepted, even one of the wrong type.
    let stray = ModelRef::new(User::default());
    ensemble.set("org", stray.clone()).expect("set");
    assert_eq!(ensemble.get("org").expect("org"), &stray);

    let user = ensemble.get_as::<User>("user").expect("user");
    assert!(user.org.as_ref().expect("org").ptr_eq(&old_org));
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn valid_attributes_make_a_valid_aggregate() {
    let ensemble = build();
    assert!(ensemble.is_valid(None));
    assert!(!ensemble.is_invalid(None));
    assert!(ensemble.validate(Some("create")).is_ok());
}

#[test]
fn invalidating_user_invalidates_aggregate() {
    let ensemble = build();
    ensemble.get_mut_as::<User>("user").expect("user").name = None;
    assert!(!ensemble.is_valid(None));
}

#[test]
fn invalidating_org_invalidates_aggregate() {
    let ensemble = build();
    ensemble.get_mut_as::<Org>("org").expect("org").name = None;
    assert!(!ensemble.is_valid(None));
}

#[test]
fn validate_error_exposes_the_failing_sub_model() {
    let ensemble = build();
    ensemble.get_mut_as::<Org>("org").expect("org").name = Some(String::new());

    let err = ensemble.validate(None).unwrap_err();
    assert_eq!(err.invalid_slots(), [SlotName::from("org")]);
    let org = err.ensemble().get_as::<Org>("org").expect("org");
    assert_eq!(org.name.as_deref(), Some(""));
}

#[test]
fn aggregate_schema_is_shared() {
    let a = UserOrgModel::build(bundle()).expect("a");
    let b = UserOrgModel::build(bundle()).expect("b");
    assert!(Arc::ptr_eq(a.ensemble().schema(), b.ensemble().schema()));
    assert!(!a.ensemble().get("org").expect("org").ptr_eq(b.ensemble().get("org").expect("org")));
}
