//! Shared data models for both utilities.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{create_connection_string, ConnectionConfig, ConnectionSource, DbTarget, Dialect};
pub use query::{ColumnInfo, OutputFormat, QueryOutput, QueryRequest, QueryResult};
