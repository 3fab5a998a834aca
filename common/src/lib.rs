//! Shared building blocks for the `db-utils` and `redis-utils` tools.
//!
//! - `config`: `.env` loading and default resolution
//! - `errors`: the error taxonomy shared by both tools
//! - `models`: connection configuration and tabular query results
//! - `telemetry`: tracing subscriber setup
//! - `utils`: bind parameters and identifier validation

pub mod config;
pub mod errors;
pub mod models;
pub mod telemetry;
pub mod utils;
