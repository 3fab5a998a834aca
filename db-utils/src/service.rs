//! Query service.
//!
//! Resolves the connection, binds parameters and runs exactly one statement
//! per call on a fresh session, closing it on every path.

use serde_json::{Map, Value};
use validator::Validate;

use common::config::DbConfig;
use common::errors::{AppError, AppResult};
use common::models::{
    ConnectionSource, DbTarget, Dialect, OutputFormat, QueryOutput, QueryRequest,
    QueryResult,
};
use common::utils::{bind_named, BoundQuery, SqlValidator};

use crate::executor::{Connector, SqlxConnector};

const MYSQL_LIST_TABLES: &str = "SHOW TABLES";
const POSTGRES_LIST_TABLES: &str =
    "SELECT table_name FROM information_schema.tables WHERE table_schema = 'public'";
const POSTGRES_DESCRIBE: &str = "SELECT column_name, data_type, character_maximum_length, \
     column_default, is_nullable FROM information_schema.columns WHERE table_name = :table_name";

/// SQL operations over a [`Connector`].
pub struct QueryService<C> {
    connector: C,
}

impl QueryService<SqlxConnector> {
    /// Creates a service that connects through sqlx with the configured timeout.
    pub fn from_config(config: &DbConfig) -> Self {
        Self::new(SqlxConnector::new(config.connect_timeout()))
    }
}

impl<C: Connector> QueryService<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    /// Runs one statement and formats its result.
    pub async fn execute_query(&self, request: QueryRequest) -> AppResult<QueryOutput> {
        request.validate()?;
        let target = resolve(&request.source, "execute_query")?;
        let params = request.params.unwrap_or_default();
        let bound = bind_named(&request.query, &params, target.dialect)
            .inspect_err(|e| log_failure(&target, "execute_query", e))?;

        let result = self.run_once(&target, "execute_query", &bound).await?;
        QueryOutput::format(result, request.output_format)
    }

    /// Lists the tables of the database behind `source` in discovery order.
    ///
    /// The discovery statement follows the dialect of the resolved target, so
    /// a pre-built connection string picks it from its scheme.
    pub async fn list_tables(&self, source: &ConnectionSource) -> AppResult<Vec<String>> {
        let target = resolve(source, "list_tables")?;
        let sql = match target.dialect {
            Dialect::MySql => MYSQL_LIST_TABLES,
            Dialect::Postgres => POSTGRES_LIST_TABLES,
        };
        let bound = BoundQuery {
            sql: sql.to_string(),
            values: Vec::new(),
        };

        let result = self.run_once(&target, "list_tables", &bound).await?;
        Ok(result.first_column_strings())
    }

    /// Returns the column metadata of `table`.
    ///
    /// The name is validated before anything is sent; MySQL gets it quoted,
    /// PostgreSQL gets it as a bound parameter.
    pub async fn describe_table(
        &self,
        source: &ConnectionSource,
        table: &str,
        output_format: OutputFormat,
    ) -> AppResult<QueryOutput> {
        let target = resolve(source, "describe_table")?;
        let bound = describe_statement(table, target.dialect)
            .inspect_err(|e| log_failure(&target, "describe_table", e))?;

        let result = self.run_once(&target, "describe_table", &bound).await?;
        QueryOutput::format(result, output_format)
    }

    async fn run_once(
        &self,
        target: &DbTarget,
        operation: &'static str,
        bound: &BoundQuery,
    ) -> AppResult<QueryResult> {
        let result = self.run_session(target, bound).await;
        match &result {
            Ok(result) => tracing::debug!(
                operation,
                rows = result.row_count,
                elapsed_ms = result.execution_time_ms,
                "statement completed"
            ),
            Err(e) => log_failure(target, operation, e),
        }
        result
    }

    async fn run_session(&self, target: &DbTarget, bound: &BoundQuery) -> AppResult<QueryResult> {
        let mut session = self.connector.connect(target).await?;
        let result = session.run(&bound.sql, &bound.values).await;
        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "failed to close database connection");
        }
        result
    }
}

fn resolve(source: &ConnectionSource, operation: &'static str) -> AppResult<DbTarget> {
    let resolved = match source {
        ConnectionSource::Config(config) => config
            .validate()
            .map_err(AppError::from)
            .and_then(|_| source.resolve()),
        ConnectionSource::Url(_) => source.resolve(),
    };
    resolved.inspect_err(|e| tracing::error!(operation, error = %e, "invalid connection settings"))
}

fn describe_statement(table: &str, dialect: Dialect) -> AppResult<BoundQuery> {
    let name = SqlValidator::table_name(table)?;
    match dialect {
        Dialect::MySql => Ok(BoundQuery {
            sql: format!("DESCRIBE {}", name.mysql_quoted()),
            values: Vec::new(),
        }),
        Dialect::Postgres => {
            let mut sql = POSTGRES_DESCRIBE.to_string();
            let mut params = Map::new();
            params.insert("table_name".into(), Value::String(name.table));
            if let Some(schema) = name.schema {
                sql.push_str(" AND table_schema = :table_schema");
                params.insert("table_schema".into(), Value::String(schema));
            }
            sql.push_str(" ORDER BY ordinal_position");
            bind_named(&sql, &params, dialect)
        }
    }
}

fn log_failure(target: &DbTarget, operation: &'static str, error: &AppError) {
    tracing::error!(
        driver = %target.dialect,
        host = %target.host,
        port = ?target.port,
        database = %target.database,
        operation,
        kind = %error.kind(),
        error = %error,
        "database operation failed"
    );
}
