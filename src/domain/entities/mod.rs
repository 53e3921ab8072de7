//! Entity contract and the filter vocabulary shared by every repository.
//!
//! - [`Entity`] - Base contract for persisted record types
//! - [`Criteria`] - Closed, ordered exact-match filter

pub mod criteria;
pub mod entity;

pub use criteria::{Criteria, FieldValue};
pub use entity::{Entity, EntityId, check_entity_contract, visible_fields};
