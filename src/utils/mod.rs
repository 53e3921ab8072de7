//! Small helpers shared across layers.
//!
//! - [`db_error`] - Classification of database errors

pub mod db_error;
