//! Error types surfaced by repositories.
//!
//! Every error carries the identity of the repository that raised it so that
//! failures stay attributable when several repositories share one cache store.

use std::fmt;
use thiserror::Error;

use crate::infrastructure::cache::CacheError;
use crate::infrastructure::persistence::StoreError;

/// The kind of write a [`RepositoryError::PersistenceFailure`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The repository cannot be built for its entity type. Never recovered.
    #[error("{repository}: configuration error: {message}")]
    Configuration { repository: String, message: String },

    #[error("{repository}: no entity found for key {id}")]
    NotFound { repository: String, id: i64 },

    /// The store rejected a write; batch writes have been rolled back.
    #[error("{repository}: failed to {action} entity: {message}")]
    PersistenceFailure {
        repository: String,
        action: WriteAction,
        message: String,
    },

    /// Raised by the generic read path for names that are not read-shaped
    /// or not registered.
    #[error("{repository}: unsupported operation '{operation}'")]
    UnsupportedOperation {
        repository: String,
        operation: String,
    },

    #[error("{repository}: invalid argument: {message}")]
    InvalidArgument { repository: String, message: String },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    pub fn configuration(repository: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            repository: repository.into(),
            message: message.into(),
        }
    }

    pub fn not_found(repository: impl Into<String>, id: i64) -> Self {
        Self::NotFound {
            repository: repository.into(),
            id,
        }
    }

    pub fn persistence(
        repository: impl Into<String>,
        action: WriteAction,
        message: impl Into<String>,
    ) -> Self {
        Self::PersistenceFailure {
            repository: repository.into(),
            action,
            message: message.into(),
        }
    }

    pub fn unsupported(repository: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            repository: repository.into(),
            operation: operation.into(),
        }
    }

    pub fn invalid_argument(repository: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            repository: repository.into(),
            message: message.into(),
        }
    }
}
