//! Subcommand handlers.
//!
//! Arguments are checked before any connection is opened; results go to the
//! given writer, diagnostics go through tracing.

use std::io::Write;

use serde_json::{Map, Value};

use common::config::DbConfig;
use common::errors::{AppError, AppResult};
use common::models::{ConnectionSource, OutputFormat, QueryOutput, QueryRequest};

use crate::cli::{Command, ConnectionArgs, DescribeArgs, QueryArgs};

/// Runs one subcommand.
pub async fn dispatch<W: Write>(command: Command, out: &mut W) -> AppResult<()> {
    match command {
        Command::Query(args) => query(args, out).await,
        Command::ListTables(args) => list_tables(args, out).await,
        Command::DescribeTable(args) => describe_table(args, out).await,
    }
}

async fn query<W: Write>(args: QueryArgs, out: &mut W) -> AppResult<()> {
    let output_format: OutputFormat = args
        .output_format
        .parse()
        .inspect_err(|e| log_rejected("execute_query", e))?;
    let params =
        parse_params(args.params.as_deref()).inspect_err(|e| log_rejected("execute_query", e))?;
    let config = resolve_config(args.connection)?;

    let request = QueryRequest {
        query: args.query,
        params,
        source: ConnectionSource::Config(config.connection.clone()),
        output_format,
    };
    let output = db_utils::execute_query(&config, request).await?;
    write_output(out, &output)
}

async fn list_tables<W: Write>(args: ConnectionArgs, out: &mut W) -> AppResult<()> {
    let config = resolve_config(args)?;
    let source = ConnectionSource::Config(config.connection.clone());
    for table in db_utils::list_tables(&config, &source).await? {
        writeln!(out, "{}", table)?;
    }
    Ok(())
}

async fn describe_table<W: Write>(args: DescribeArgs, out: &mut W) -> AppResult<()> {
    let output_format: OutputFormat = args
        .output_format
        .parse()
        .inspect_err(|e| log_rejected("describe_table", e))?;
    let config = resolve_config(args.connection)?;
    let source = ConnectionSource::Config(config.connection.clone());
    let output = db_utils::describe_table(&config, &source, &args.table, output_format).await?;
    write_output(out, &output)
}

fn log_rejected(operation: &'static str, error: &AppError) {
    tracing::error!(operation, kind = %error.kind(), error = %error, "invalid arguments");
}

fn resolve_config(args: ConnectionArgs) -> AppResult<DbConfig> {
    Ok(DbConfig::from_env()?.with_overrides(args.into()))
}

/// Parses `--params`, which must be a JSON object.
pub fn parse_params(raw: Option<&str>) -> AppResult<Option<Map<String, Value>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(other) => Err(AppError::InvalidParameter(format!(
            "--params must be a JSON object, got {}",
            other
        ))),
        Err(e) => Err(AppError::InvalidParameter(format!(
            "--params is not valid JSON: {}",
            e
        ))),
    }
}

/// Prints a formatted result followed by a single newline.
pub fn write_output<W: Write>(out: &mut W, output: &QueryOutput) -> AppResult<()> {
    match output {
        QueryOutput::Text(text) if text.is_empty() => {}
        QueryOutput::Text(text) => writeln!(out, "{}", text.trim_end())?,
        QueryOutput::Table(result) => writeln!(out, "{}", result.render_table())?,
    }
    Ok(())
}
