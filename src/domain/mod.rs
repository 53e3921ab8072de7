//! Domain layer: entity contract, query vocabulary and repository interfaces.
//!
//! # Architecture
//!
//! - [`entities`] - Entity contract and exact-match criteria
//! - [`pagination`] - Offset and cursor pagination models
//! - [`validation`] - Validation rule descriptors and their provider
//! - [`repositories`] - The shared repository trait
//!
//! # Design Principles
//!
//! - Callers depend on [`repositories::Repository`] only
//! - Collaborators (engine, cache, rule provider) are injected, never global

pub mod entities;
pub mod pagination;
pub mod repositories;
pub mod validation;
