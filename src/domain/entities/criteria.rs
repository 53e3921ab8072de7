//! Exact-match filter criteria.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A scalar value a field can be matched against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Text(s) => Value::String(s.clone()),
        }
    }

    /// Compares against a serialized field. Integers match integral JSON numbers only.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Null, Value::Null) => true,
            (Self::Bool(a), Value::Bool(b)) => a == b,
            (Self::Int(a), Value::Number(n)) => n.as_i64() == Some(*a),
            (Self::Text(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Equality-only filter: every listed field must match exactly (implicit AND).
///
/// Fields keep their insertion order, and the criteria serialize as an ordered
/// list of `[field, value]` pairs. Two criteria listing the same pairs in a
/// different order are therefore different cache arguments.
///
/// ```
/// use repocache::domain::entities::Criteria;
///
/// let criteria = Criteria::new().eq("status", "published").eq("author_id", 7);
/// assert_eq!(criteria.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Criteria(Vec<(String, FieldValue)>);

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality constraint. Re-setting a field replaces its value in place.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        let field = field.into();
        let value = value.into();

        match self.0.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.0.push((field, value)),
        }

        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(field, value)| (field.as_str(), value))
    }

    /// True when every constraint holds for the serialized entity.
    ///
    /// A field missing from the document never matches, not even `Null`.
    pub fn matches(&self, document: &Value) -> bool {
        self.0.iter().all(|(field, expected)| {
            document
                .get(field)
                .is_some_and(|actual| expected.matches(actual))
        })
    }

    /// The criteria as a JSON object, suitable for JSONB containment queries.
    pub fn to_json_object(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(field, value)| (field.clone(), value.to_json()))
            .collect();
        Value::Object(map)
    }
}
