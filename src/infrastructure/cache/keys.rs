//! Cache key derivation.
//!
//! Every key is namespaced by a repository prefix so several repositories can
//! share one store:
//!
//! | Read                         | Key                                  |
//! |------------------------------|--------------------------------------|
//! | lookup by id                 | `{prefix}:{id}`                      |
//! | `get()`                      | `{prefix}:all`                       |
//! | any other read               | `{prefix}:{operation}:{stable hash}` |
//! | lazily cached metadata       | `{prefix}:property:{name}`           |
//!
//! The stable hash is the hex SHA-256 of the JSON serialization of the
//! argument list, in call order.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::entities::EntityId;

/// Builds the cache keys of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    prefix: String,
}

impl CacheKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the entity with key `id`.
    pub fn entity(&self, id: EntityId) -> String {
        format!("{}:{}", self.prefix, id)
    }

    /// Key of the unfiltered `get()` listing.
    pub fn all(&self) -> String {
        format!("{}:all", self.prefix)
    }

    /// Key of `operation` called with `args` (a tuple or slice, in call order).
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments do not serialize.
    pub fn operation<A: Serialize + ?Sized>(
        &self,
        operation: &str,
        args: &A,
    ) -> Result<String, serde_json::Error> {
        Ok(format!(
            "{}:{}:{}",
            self.prefix,
            operation,
            stable_hash(args)?
        ))
    }

    /// Key of a lazily cached repository attribute.
    pub fn property(&self, name: &str) -> String {
        format!("{}:property:{}", self.prefix, name)
    }
}

/// Deterministic digest of the canonical JSON form of `args`.
///
/// Sequences keep their order, so permuting arguments changes the hash.
pub fn stable_hash<A: Serialize + ?Sized>(args: &A) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_vec(args)?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}
