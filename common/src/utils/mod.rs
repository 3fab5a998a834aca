//! Utility functions and helpers.

pub mod bind_params;
pub mod sql_validator;

// Re-export commonly used types
pub use bind_params::{bind_named, BoundQuery};
pub use sql_validator::{SqlValidator, TableName};
