//! Validation rule descriptors and their provider seam.
//!
//! Rule lookup lives outside the repositories; they only hand the descriptor
//! through (and the caching decorator memoizes it).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::entities::Entity;

/// Field name to rule list, e.g. `"title" => ["required", "max:200"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationRules(BTreeMap<String, Vec<String>>);

impl ValidationRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule<I, S>(mut self, field: impl Into<String>, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .entry(field.into())
            .or_default()
            .extend(rules.into_iter().map(Into::into));
        self
    }

    pub fn for_field(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Supplies the validation rules for an entity type, optionally specialised
/// for one instance (e.g. uniqueness rules that exclude the entity itself).
pub trait ValidationRuleProvider<E: Entity>: Send + Sync {
    fn rules_for(&self, entity: Option<&E>) -> ValidationRules;
}

impl<E, F> ValidationRuleProvider<E> for F
where
    E: Entity,
    F: Fn(Option<&E>) -> ValidationRules + Send + Sync,
{
    fn rules_for(&self, entity: Option<&E>) -> ValidationRules {
        self(entity)
    }
}

/// Provider used when a repository is built without rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoValidationRules;

impl<E: Entity> ValidationRuleProvider<E> for NoValidationRules {
    fn rules_for(&self, _entity: Option<&E>) -> ValidationRules {
        ValidationRules::new()
    }
}
