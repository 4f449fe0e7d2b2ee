//! Record: a dynamic, schema-file-driven sub-model.
//!
//! A record is an attribute map plus the [`RecordSpec`] of the slot it
//! fills. Validation checks the required fields; persistence writes
//! the record through a [`RecordStore`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use ensemble_core::{
    AttributeError, Attributes, Model, ModelRef, Persistable, ReferenceError, SlotName,
    Validatable,
};
use serde_json::Value;

use crate::store::{RecordStore, StoredRecord};

/// Per-slot declaration: which fields must be present and which references
/// the record may point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpec {
    pub aggregate: String,
    pub slot: SlotName,
    /// Attribute or reference names that must not be blank.
    pub required: Vec<String>,
    pub references: Vec<SlotName>,
}

impl RecordSpec {
    pub fn new(aggregate: impl Into<String>, slot: impl Into<SlotName>) -> Self {
        Self {
            aggregate: aggregate.into(),
            slot: slot.into(),
            required: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    pub fn reference(mut self, name: impl Into<SlotName>) -> Self {
        let name = name.into();
        if !self.references.contains(&name) {
            self.references.push(name);
        }
        self
    }

    fn is_reference(&self, field: &str) -> bool {
        self.references.iter().any(|r| r.as_str() == field)
    }
}

/// A record filling one slot of a schema-file aggregate.
pub struct Record {
    spec: Arc<RecordSpec>,
    store: Option<Arc<RecordStore>>,
    id: Option<u64>,
    attributes: Attributes,
    references: BTreeMap<SlotName, ModelRef>,
    errors: Vec<String>,
}

impl Record {
    /// Empty record without a store; it validates but cannot be saved.
    pub fn new(spec: Arc<RecordSpec>) -> Self {
        Self {
            spec,
            store: None,
            id: None,
            attributes: Attributes::new(),
            references: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_store(mut self, store: Arc<RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replace the attribute map.
    ///
    /// `id` and reference names are owned by the record itself and are
    /// rejected as attributes.
    pub fn with_attributes(mut self, attributes: Attributes) -> Result<Self, AttributeError> {
        for key in attributes.keys() {
            if key == "id" || self.spec.is_reference(key) {
                return Err(AttributeError::Invalid {
                    name: key.clone(),
                    reason: "reserved for the record itself".to_owned(),
                });
            }
        }
        self.attributes = attributes;
        Ok(self)
    }

    pub fn spec(&self) -> &RecordSpec {
        &self.spec
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.attributes.insert(field.into(), value);
    }

    pub fn reference(&self, name: &SlotName) -> Option<&ModelRef> {
        self.references.get(name)
    }

    /// Errors found by the last validation or save.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn links(&self) -> BTreeMap<String, Option<u64>> {
        self.spec
            .references
            .iter()
            .map(|name| {
                let id = self.references.get(name).and_then(linked_id);
                (format!("{name}_id"), id)
            })
            .collect()
    }

    fn persist(&mut self) -> bool {
        let Some(store) = self.store.clone() else {
            self.errors.push("no record store configured".to_owned());
            return false;
        };
        let spec = Arc::clone(&self.spec);

        let id = match self.id {
            Some(id) => id,
            None => match store.next_id(&spec.aggregate, &spec.slot) {
                Ok(id) => id,
                Err(e) => {
                    tracing::error!(slot = %spec.slot, "cannot allocate record id: {e}");
                    self.errors.push(e.to_string());
                    return false;
                }
            },
        };

        let document = StoredRecord {
            id,
            slot: spec.slot.clone(),
            attributes: self.attributes.clone(),
            links: self.links(),
            saved_at: Utc::now(),
        };
        match store.write(&spec.aggregate, &document) {
            Ok(path) => {
                tracing::info!(slot = %spec.slot, id, path = %path.display(), "record saved");
                self.id = Some(id);
                true
            }
            Err(e) => {
                tracing::error!(slot = %spec.slot, "cannot write record: {e}");
                self.errors.push(e.to_string());
                false
            }
        }
    }
}

/// Id of the record behind `model`, if it is a saved record.
///
/// A model that is currently borrowed (a record referencing itself) reports
/// no id rather than panicking.
fn linked_id(model: &ModelRef) -> Option<u64> {
    model.try_downcast_ref::<Record>()?.id
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(Value::Bool(_) | Value::Number(_)) => false,
    }
}

impl Validatable for Record {
    fn is_valid(&mut self, context: Option<&str>) -> bool {
        self.errors.clear();
        for field in &self.spec.required {
            let missing = if self.spec.is_reference(field) {
                !self.references.keys().any(|r| r.as_str() == field)
            } else {
                is_blank(self.attributes.get(field))
            };
            if missing {
                self.errors.push(format!("{field} can't be blank"));
            }
        }
        if !self.errors.is_empty() {
            tracing::debug!(
                slot = %self.spec.slot,
                context = ?context,
                errors = self.errors.len(),
                "record invalid"
            );
        }
        self.errors.is_empty()
    }
}

impl Persistable for Record {
    fn save(&mut self) -> bool {
        if !self.is_valid(None) {
            return false;
        }
        self.persist()
    }
}

impl Model for Record {
    fn set_reference(&mut self, name: &SlotName, target: ModelRef) -> Result<(), ReferenceError> {
        if !self.spec.references.contains(name) {
            return Err(ReferenceError::new(name));
        }
        self.references.insert(name.clone(), target);
        Ok(())
    }

    fn clear_references(&mut self) {
        self.references.clear();
    }

    fn as_persistable(&mut self) -> Option<&mut dyn Persistable> {
        Some(self)
    }
}

// References print by name only; following them could recurse through a
// self-referencing record.
impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("slot", &self.spec.slot)
            .field("id", &self.id)
            .field("attributes", &self.attributes)
            .field("references", &self.references.keys().collect::<Vec<_>>())
            .field("errors", &self.errors)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn user_spec() -> Arc<RecordSpec> {
        Arc::new(
            RecordSpec::new("signup", "user")
                .require("name")
                .require("org")
                .reference("org"),
        )
    }

    fn org_spec() -> Arc<RecordSpec> {
        Arc::new(RecordSpec::new("signup", "org").require("name"))
    }

    #[rstest]
    #[case::missing(json!({}))]
    #[case::null(json!({"name": null}))]
    #[case::whitespace(json!({"name": "  "}))]
    #[case::empty_list(json!({"name": []}))]
    fn blank_required_field_is_invalid(#[case] value: Value) {
        let mut org = Record::new(org_spec()).with_attributes(attrs(value)).expect("attrs");
        assert!(!org.is_valid(None));
        assert_eq!(org.errors(), ["name can't be blank"]);
    }

    #[rstest]
    #[case::string(json!({"name": "Acme"}))]
    #[case::zero(json!({"name": 0}))]
    #[case::falsy(json!({"name": false}))]
    fn present_required_field_is_valid(#[case] value: Value) {
        let mut org = Record::new(org_spec()).with_attributes(attrs(value)).expect("attrs");
        assert!(org.is_valid(None));
        assert!(org.errors().is_empty());
    }

    #[test]
    fn errors_are_cleared_on_revalidation() {
        let mut org = Record::new(org_spec());
        assert!(!org.is_valid(None));
        org.set("name", json!("Acme"));
        assert!(org.is_valid(None));
        assert!(org.errors().is_empty());
    }

    #[test]
    fn required_reference_must_be_set() {
        let mut user = Record::new(user_spec())
            .with_attributes(attrs(json!({"name": "Nils"})))
            .expect("attrs");
        assert!(!user.is_valid(None));
        assert_eq!(user.errors(), ["org can't be blank"]);

        let org = ModelRef::new(Record::new(org_spec()));
        user.set_reference(&"org".into(), org).expect("org reference");
        assert!(user.is_valid(None));
    }

    #[test]
    fn undeclared_reference_is_rejected() {
        let mut org = Record::new(org_spec());
        let user = ModelRef::new(Record::new(user_spec()));
        let err = org.set_reference(&"user".into(), user).unwrap_err();
        assert_eq!(err.name.as_str(), "user");
    }

    #[rstest]
    #[case::id("id")]
    #[case::reference("org")]
    fn reserved_attribute_is_rejected(#[case] key: &str) {
        let mut map = Attributes::new();
        map.insert(key.to_owned(), json!(1));
        let err = Record::new(user_spec()).with_attributes(map).unwrap_err();
        assert!(matches!(err, AttributeError::Invalid { ref name, .. } if name == key));
    }

    #[test]
    fn save_without_store_fails() {
        let mut org = Record::new(org_spec())
            .with_attributes(attrs(json!({"name": "Acme"})))
            .expect("attrs");
        assert!(!org.save());
        assert_eq!(org.errors(), ["no record store configured"]);
        assert!(org.id().is_none());
    }

    #[test]
    fn save_validates_first() {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(RecordStore::new(dir.path()));
        let mut org = Record::new(org_spec()).with_store(Arc::clone(&store));
        assert!(!org.save());
        assert!(store.list("signup", &"org".into()).expect("list").is_empty());
    }

    #[test]
    fn save_assigns_id_and_links_references() {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(RecordStore::new(dir.path()));

        let org = ModelRef::new(
            Record::new(org_spec())
                .with_store(Arc::clone(&store))
                .with_attributes(attrs(json!({"name": "Acme"})))
                .expect("attrs"),
        );
        assert!(org.borrow_mut().as_persistable().expect("persistable").save());

        let mut user = Record::new(user_spec())
            .with_store(Arc::clone(&store))
            .with_attributes(attrs(json!({"name": "Nils"})))
            .expect("attrs");
        user.set_reference(&"org".into(), org.clone()).expect("org");
        assert!(user.save());
        assert_eq!(user.id(), Some(1));

        let stored = store.load("signup", &"user".into(), 1).expect("load");
        assert_eq!(stored.links.get("org_id"), Some(&Some(1)));
        assert_eq!(stored.attributes.get("name"), Some(&json!("Nils")));
    }

    #[test]
    fn resaving_keeps_the_id() {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(RecordStore::new(dir.path()));
        let mut org = Record::new(org_spec())
            .with_store(Arc::clone(&store))
            .with_attributes(attrs(json!({"name": "Acme"})))
            .expect("attrs");
        assert!(org.save());
        org.set("name", json!("Acme Ltd"));
        assert!(org.save());
        assert_eq!(org.id(), Some(1));
        assert_eq!(store.list("signup", &"org".into()).expect("list"), [1]);
    }
}
