//! Single-use database connections.
//!
//! Every operation opens one connection, runs one statement and closes the
//! connection again. [`Connector`] and [`SqlSession`] are the seam the query
//! service is written against; [`SqlxConnector`] is the real implementation.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySqlArguments, MySqlDatabaseError};
use sqlx::postgres::PgTypeInfo;
use sqlx::query::Query;
use sqlx::{Connection, Either, Executor, MySql, MySqlConnection, PgConnection, Statement};

use common::config::DEFAULT_DB_CONNECT_TIMEOUT_SECS;
use common::errors::{AppError, AppResult};
use common::models::{DbTarget, Dialect, QueryResult};

use crate::{decode, pg_params};

/// MySQL `ER_UNSUPPORTED_PS`: the statement cannot be prepared.
const ER_UNSUPPORTED_PS: u16 = 1295;

/// Opens database sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens one connection to `target`.
    async fn connect(&self, target: &DbTarget) -> AppResult<Box<dyn SqlSession>>;
}

/// One open database connection.
#[async_trait]
pub trait SqlSession: Send {
    /// Runs `sql` with positional `params` and collects the full result.
    async fn run(&mut self, sql: &str, params: &[Value]) -> AppResult<QueryResult>;

    /// Closes the connection.
    async fn close(self: Box<Self>) -> AppResult<()>;
}

/// Connector backed by sqlx.
#[derive(Debug, Clone)]
pub struct SqlxConnector {
    connect_timeout: Duration,
}

impl SqlxConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for SqlxConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_DB_CONNECT_TIMEOUT_SECS))
    }
}

#[async_trait]
impl Connector for SqlxConnector {
    async fn connect(&self, target: &DbTarget) -> AppResult<Box<dyn SqlSession>> {
        let connection = match target.dialect {
            Dialect::MySql => DatabaseConnection::MySql(
                with_timeout(self.connect_timeout, MySqlConnection::connect(&target.url)).await?,
            ),
            Dialect::Postgres => DatabaseConnection::Postgres(
                with_timeout(self.connect_timeout, PgConnection::connect(&target.url)).await?,
            ),
        };
        tracing::debug!(driver = %target.dialect, host = %target.host, "connection opened");
        Ok(Box::new(connection))
    }
}

async fn with_timeout<T, F>(limit: Duration, connect: F) -> AppResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, connect).await {
        Ok(Ok(connection)) => Ok(connection),
        Ok(Err(e)) => Err(AppError::DatabaseConnection(e.to_string())),
        Err(_) => Err(AppError::DatabaseConnection(format!(
            "timed out after {}s",
            limit.as_secs()
        ))),
    }
}

/// An open sqlx connection for one of the supported dialects.
pub enum DatabaseConnection {
    /// MySQL connection.
    MySql(MySqlConnection),
    /// PostgreSQL connection.
    Postgres(PgConnection),
}

#[async_trait]
impl SqlSession for DatabaseConnection {
    async fn run(&mut self, sql: &str, params: &[Value]) -> AppResult<QueryResult> {
        let start = Instant::now();
        let result = match self {
            DatabaseConnection::MySql(conn) => run_mysql(conn, sql, params).await?,
            DatabaseConnection::Postgres(conn) => run_postgres(conn, sql, params).await?,
        };
        Ok(result.with_duration(start.elapsed().as_millis() as u64))
    }

    async fn close(self: Box<Self>) -> AppResult<()> {
        let closed = match *self {
            DatabaseConnection::MySql(conn) => conn.close().await,
            DatabaseConnection::Postgres(conn) => conn.close().await,
        };
        closed.map_err(|e| AppError::DatabaseConnection(e.to_string()))
    }
}

async fn run_mysql(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &[Value],
) -> AppResult<QueryResult> {
    // Preparing first gives the column names even when no row comes back.
    let columns = match (&mut *conn).prepare(sql).await {
        Ok(statement) => decode::column_info(statement.columns()),
        Err(e) if params.is_empty() && is_unpreparable(&e) => {
            tracing::debug!("statement cannot be prepared, using the text protocol");
            let rows = (&mut *conn).fetch_all(sql).await.map_err(query_error)?;
            let columns = rows
                .first()
                .map(|row| decode::column_info(sqlx::Row::columns(row)))
                .unwrap_or_default();
            let rows = rows
                .iter()
                .map(decode::mysql_row)
                .collect::<AppResult<Vec<_>>>()?;
            return Ok(QueryResult::new(columns, rows));
        }
        Err(e) => return Err(query_error(e)),
    };

    let query = bind_mysql(sqlx::query(sql), params);
    if columns.is_empty() {
        let done = query.execute(&mut *conn).await.map_err(query_error)?;
        return Ok(QueryResult::affected(done.rows_affected(), 0));
    }

    let rows = query.fetch_all(&mut *conn).await.map_err(query_error)?;
    let rows = rows
        .iter()
        .map(decode::mysql_row)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(QueryResult::new(columns, rows))
}

async fn run_postgres(
    conn: &mut PgConnection,
    sql: &str,
    params: &[Value],
) -> AppResult<QueryResult> {
    // The server infers the placeholder types; values are converted to match.
    let statement = (&mut *conn).prepare(sql).await.map_err(query_error)?;
    let columns = decode::column_info(statement.columns());
    let types: &[PgTypeInfo] = match statement.parameters() {
        Some(Either::Left(types)) => types,
        _ => &[],
    };
    let params = pg_params::convert_all(params, types)?;

    let query = pg_params::bind(sqlx::query(sql), params);
    if columns.is_empty() {
        let done = query.execute(&mut *conn).await.map_err(query_error)?;
        return Ok(QueryResult::affected(done.rows_affected(), 0));
    }

    let rows = query.fetch_all(&mut *conn).await.map_err(query_error)?;
    let rows = rows
        .iter()
        .map(decode::pg_row)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(QueryResult::new(columns, rows))
}

fn bind_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [Value],
) -> Query<'q, MySql, MySqlArguments> {
    for value in params {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => query.bind(i),
                (None, Some(u)) => query.bind(u),
                (None, None) => query.bind(n.as_f64()),
            },
            Value::String(s) => query.bind(s.as_str()),
            Value::Array(_) | Value::Object(_) => query.bind(value.to_string()),
        };
    }
    query
}

fn is_unpreparable(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .and_then(|e| e.try_downcast_ref::<MySqlDatabaseError>())
        .is_some_and(|e| e.number() == ER_UNSUPPORTED_PS)
}

fn query_error(error: sqlx::Error) -> AppError {
    AppError::DatabaseQuery(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_not_unpreparable() {
        assert!(!is_unpreparable(&sqlx::Error::RowNotFound));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_connection_error() {
        let target = DbTarget::parse("postgresql://u:p@127.0.0.1:1/db").unwrap();
        let err = match SqlxConnector::new(Duration::from_secs(2)).connect(&target).await {
            Ok(_) => panic!("connected to a closed port"),
            Err(e) => e,
        };
        assert!(matches!(err, AppError::DatabaseConnection(_)));
    }
}
