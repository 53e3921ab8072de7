//! Extra read operations registered by name.
//!
//! Concrete repositories often need reads beyond the built-in set (e.g.
//! "published articles of an author"). Instead of sniffing method names at
//! runtime, such reads are registered up front in a [`ReadOperations`] map and
//! reached through [`crate::domain::repositories::Repository::call_read`], which
//! is also what lets the caching decorator memoize them without knowing them.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::entities::{Criteria, Entity};
use crate::domain::repositories::repository::{BUILT_IN_READS, is_read_operation};
use crate::error::{RepositoryError, RepositoryResult};
use crate::infrastructure::persistence::PersistenceEngine;

/// What a read operation gets to work with.
pub struct ReadContext<'a, E: Entity> {
    pub repository: &'a str,
    pub store: &'a dyn PersistenceEngine<E>,
}

impl<E: Entity> ReadContext<'_, E> {
    /// Decodes the argument at `index`, or `None` when it was not supplied.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::InvalidArgument`] if the argument does not decode as `T`.
    pub fn arg<T: DeserializeOwned>(&self, args: &[Value], index: usize) -> RepositoryResult<Option<T>> {
        match args.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                RepositoryError::invalid_argument(
                    self.repository,
                    format!("argument {} is invalid: {}", index, e),
                )
            }),
        }
    }
}

/// A read operation over JSON arguments, returning a JSON result.
#[async_trait]
pub trait ReadOperation<E: Entity>: Send + Sync {
    async fn call(&self, ctx: ReadContext<'_, E>, args: &[Value]) -> RepositoryResult<Value>;
}

/// Name to handler map, fixed once the repository is built.
pub struct ReadOperations<E: Entity> {
    handlers: HashMap<String, Arc<dyn ReadOperation<E>>>,
}

impl<E: Entity> ReadOperations<E> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `operation` under `name`.
    ///
    /// # Errors
    ///
    /// Returns a message if `name` is not read-shaped, shadows a built-in read,
    /// or is already registered.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        operation: Arc<dyn ReadOperation<E>>,
    ) -> Result<(), String> {
        let name = name.into();

        if !is_read_operation(&name) {
            return Err(format!("read operation '{}' must start with 'get'", name));
        }
        if BUILT_IN_READS.contains(&name.as_str()) {
            return Err(format!("read operation '{}' shadows a built-in read", name));
        }
        if self.handlers.contains_key(&name) {
            return Err(format!("read operation '{}' is already registered", name));
        }

        self.handlers.insert(name, operation);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ReadOperation<E>>> {
        self.handlers.get(name).cloned()
    }
}

impl<E: Entity> Default for ReadOperations<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts the entities matching an optional [`Criteria`] argument.
///
/// Arguments: `[criteria?]`. Returns a JSON number.
pub struct CountWhere;

#[async_trait]
impl<E: Entity> ReadOperation<E> for CountWhere {
    async fn call(&self, ctx: ReadContext<'_, E>, args: &[Value]) -> RepositoryResult<Value> {
        let criteria: Criteria = ctx.arg(args, 0)?.unwrap_or_default();
        let (_, total) = ctx.store.page(&criteria, 0, 0).await?;
        Ok(Value::from(total))
    }
}
