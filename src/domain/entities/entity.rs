//! The base contract every persisted entity type satisfies.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Primary key of a persisted entity.
pub type EntityId = i64;

/// A persisted record with a unique key.
///
/// Repositories only read the key and the existence flag; every other field is
/// opaque and travels through serde. The existence flag may be left out of
/// serialization (`#[serde(skip)]`): stores and caches set it again on every
/// keyed entity they load. `Default` must produce a fresh, unpersisted
/// instance: no key and `exists() == false`.
///
/// # Examples
///
/// ```
/// use repocache::domain::entities::{Entity, EntityId};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Article {
///     id: Option<EntityId>,
///     #[serde(default)]
///     exists: bool,
///     title: String,
/// }
///
/// impl Entity for Article {
///     const NAME: &'static str = "Article";
///
///     fn key(&self) -> Option<EntityId> {
///         self.id
///     }
///     fn set_key(&mut self, key: EntityId) {
///         self.id = Some(key);
///     }
///     fn exists(&self) -> bool {
///         self.exists
///     }
///     fn set_exists(&mut self, exists: bool) {
///         self.exists = exists;
///     }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Clone + Default + Send + Sync + 'static {
    /// Type name, used for repository identity and as the storage discriminator.
    const NAME: &'static str;

    /// Serialized fields excluded from [`crate::domain::repositories::Repository::visible_fields`].
    const HIDDEN: &'static [&'static str] = &[];

    fn key(&self) -> Option<EntityId>;

    fn set_key(&mut self, key: EntityId);

    /// True once the entity was loaded from or written to the store.
    fn exists(&self) -> bool;

    fn set_exists(&mut self, exists: bool);
}

/// Checks the runtime half of the entity contract.
///
/// The type system covers the rest; what remains is that the type has a name,
/// that its default instance is genuinely unpersisted, and that it serializes
/// to a JSON object so stores can filter and sort on its fields.
pub fn check_entity_contract<E: Entity>() -> Result<(), String> {
    if E::NAME.trim().is_empty() {
        return Err("entity type name must not be empty".to_string());
    }

    let fresh = E::default();
    if let Some(key) = fresh.key() {
        return Err(format!(
            "default {} instance must not carry a key, got {}",
            E::NAME,
            key
        ));
    }
    if fresh.exists() {
        return Err(format!(
            "default {} instance must not be marked as persisted",
            E::NAME
        ));
    }

    match serde_json::to_value(&fresh) {
        Ok(Value::Object(_)) => Ok(()),
        Ok(other) => Err(format!(
            "{} must serialize to a JSON object, got {}",
            E::NAME,
            json_kind(&other)
        )),
        Err(e) => Err(format!("{} failed to serialize: {}", E::NAME, e)),
    }
}

/// Names of the serialized fields of `E`, minus [`Entity::HIDDEN`].
pub fn visible_fields<E: Entity>() -> Result<Vec<String>, serde_json::Error> {
    let fields = match serde_json::to_value(E::default())? {
        Value::Object(map) => map
            .keys()
            .filter(|name| !E::HIDDEN.contains(&name.as_str()))
            .cloned()
            .collect(),
        _ => Vec::new(),
    };

    Ok(fields)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
