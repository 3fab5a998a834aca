//! SQL utility library.
//!
//! Runs one statement per call against MySQL or PostgreSQL and returns the
//! result as CSV, JSON or a [`QueryResult`](common::models::QueryResult).
//!
//! - `decode`: driver rows to JSON cells
//! - `executor`: single-use sqlx connections
//! - `pg_params`: JSON parameters typed for PostgreSQL placeholders
//! - `service`: the query service and its metadata operations

pub mod decode;
pub mod executor;
pub mod pg_params;
pub mod service;

use common::config::DbConfig;
use common::errors::AppResult;
use common::models::{ConnectionSource, OutputFormat, QueryOutput, QueryRequest};

pub use common::models::create_connection_string;
pub use executor::{Connector, DatabaseConnection, SqlSession, SqlxConnector};
pub use service::QueryService;

/// Runs one statement through sqlx, using the timeout from `config`.
pub async fn execute_query(config: &DbConfig, request: QueryRequest) -> AppResult<QueryOutput> {
    QueryService::from_config(config).execute_query(request).await
}

/// Lists the tables of the database behind `source`.
pub async fn list_tables(config: &DbConfig, source: &ConnectionSource) -> AppResult<Vec<String>> {
    QueryService::from_config(config).list_tables(source).await
}

/// Describes `table` in the database behind `source`.
pub async fn describe_table(
    config: &DbConfig,
    source: &ConnectionSource,
    table: &str,
    output_format: OutputFormat,
) -> AppResult<QueryOutput> {
    QueryService::from_config(config)
        .describe_table(source, table, output_format)
        .await
}
