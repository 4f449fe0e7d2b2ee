//! Value types shared by the schema and the ensemble.
//!
//! Slot names are always stored in canonical snake_case form; every public
//! entry point that accepts a name converts through [`SlotName`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::ModelRef;

/// Raw attribute mapping handed to a sub-model constructor.
pub type Attributes = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// SlotName
// ---------------------------------------------------------------------------

/// Canonical identifier of a slot in a schema.
///
/// Built from a raw identifier (`"user"`), a display string (`"UserProfile"`)
/// or a type descriptor ([`SlotName::of`]); all three normalize to the same
/// snake_case key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SlotName(String);

impl SlotName {
    /// Canonicalize `raw` into a slot name.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(underscore(raw.as_ref()))
    }

    /// Slot name derived from a type's own name, e.g. `UserProfile` →
    /// `user_profile`. Module paths and generic arguments are ignored.
    pub fn of<T: ?Sized>() -> Self {
        Self::new(short_type_name(std::any::type_name::<T>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SlotName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SlotName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<&String> for SlotName {
    fn from(s: &String) -> Self {
        Self::new(s)
    }
}

impl From<&SlotName> for SlotName {
    fn from(s: &SlotName) -> Self {
        s.clone()
    }
}

impl From<SlotName> for String {
    fn from(s: SlotName) -> Self {
        s.0
    }
}

/// Rails-style `underscore`: `::` becomes `/`, camel-case boundaries get an
/// underscore, `-` becomes `_`, and the result is lowercased.
fn underscore(raw: &str) -> String {
    let raw = raw.replace("::", "/");
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary {
                out.push('_');
            }
        }
        match c {
            '-' => out.push('_'),
            c => out.push(c.to_ascii_lowercase()),
        }
    }
    out
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// ---------------------------------------------------------------------------
// Dependency declarations
// ---------------------------------------------------------------------------

/// A `from -> to` dependency as written by the declaring code.
///
/// Both ends are optional so that incomplete declarations (e.g. from a
/// schema file) can be rejected by the builder rather than by the parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDecl {
    #[serde(default)]
    pub from: Option<SlotName>,
    #[serde(default)]
    pub to: Option<SlotName>,
}

impl DependencyDecl {
    /// A complete declaration: `from` holds a reference to `to`.
    pub fn between(from: impl Into<SlotName>, to: impl Into<SlotName>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
        }
    }

    pub fn with_from(mut self, from: impl Into<SlotName>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_to(mut self, to: impl Into<SlotName>) -> Self {
        self.to = Some(to.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Attribute bundle
// ---------------------------------------------------------------------------

/// Input for one slot when building an ensemble.
#[derive(Debug, Clone)]
pub enum SlotInput {
    /// Attribute mapping passed to the slot's constructor.
    Attributes(Attributes),
    /// A pre-built sub-model, used as-is if it has the slot's type.
    Instance(ModelRef),
    /// Anything else. Always rejected at construction.
    Value(Value),
}

impl SlotInput {
    /// Short human-readable description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            SlotInput::Attributes(_) => "an attribute mapping".to_string(),
            SlotInput::Instance(model) => format!("an instance of {}", model.type_name()),
            SlotInput::Value(value) => match value {
                Value::Null => "null".to_string(),
                Value::Bool(_) => "a boolean".to_string(),
                Value::Number(_) => "a number".to_string(),
                Value::String(_) => "a string".to_string(),
                Value::Array(_) => "an array".to_string(),
                Value::Object(_) => "an object".to_string(),
            },
        }
    }
}

impl From<Value> for SlotInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => SlotInput::Attributes(map),
            other => SlotInput::Value(other),
        }
    }
}

impl From<Attributes> for SlotInput {
    fn from(attrs: Attributes) -> Self {
        SlotInput::Attributes(attrs)
    }
}

impl From<ModelRef> for SlotInput {
    fn from(model: ModelRef) -> Self {
        SlotInput::Instance(model)
    }
}

/// Per-slot input used to construct an ensemble.
#[derive(Debug, Clone, Default)]
pub struct AttributeBundle {
    entries: HashMap<SlotName, SlotInput>,
}

impl AttributeBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, slot: impl Into<SlotName>, input: impl Into<SlotInput>) -> Self {
        self.insert(slot, input);
        self
    }

    /// Insert or replace the input for `slot`.
    pub fn insert(&mut self, slot: impl Into<SlotName>, input: impl Into<SlotInput>) {
        self.entries.insert(slot.into(), input.into());
    }

    pub fn get(&self, slot: &SlotName) -> Option<&SlotInput> {
        self.entries.get(slot)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every top-level key becomes a slot entry; object values become attribute
/// mappings, anything else is kept as a raw value.
impl From<Attributes> for AttributeBundle {
    fn from(map: Attributes) -> Self {
        let mut bundle = Self::new();
        for (slot, value) in map {
            bundle.insert(slot, value);
        }
        bundle
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
