//! SQL query models.
//!
//! Contains the tabular query result and its output formats.

use std::collections::HashSet;
use std::str::FromStr;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use validator::Validate;

use crate::errors::{AppError, AppResult};
use crate::models::connection::ConnectionSource;

/// A request to execute one SQL statement.
#[derive(Debug, Clone, Validate)]
pub struct QueryRequest {
    /// SQL statement to execute, with optional `:name` placeholders.
    #[validate(length(min = 1, message = "SQL statement is required"))]
    pub query: String,

    /// Named bind parameters.
    pub params: Option<serde_json::Map<String, serde_json::Value>>,

    /// Connection string or configuration fields.
    pub source: ConnectionSource,

    /// Requested output shape.
    pub output_format: OutputFormat,
}

/// Result of a SQL query execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column information.
    pub columns: Vec<ColumnInfo>,

    /// Row data (each row is a vector of JSON values aligned to `columns`).
    pub rows: Vec<Vec<serde_json::Value>>,

    /// Number of rows returned.
    #[serde(default)]
    pub row_count: usize,

    /// Number of rows affected (for statements without a result set).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<u64>,

    /// Query execution time in milliseconds.
    #[serde(default)]
    pub execution_time_ms: u64,
}

/// Column information in query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column data type as reported by the driver.
    pub data_type: String,

    /// Whether the column is nullable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
}

impl ColumnInfo {
    /// Creates column information without nullability.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: None,
        }
    }
}

impl QueryResult {
    /// Creates a result set from columns and rows.
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self {
            row_count: rows.len(),
            columns,
            rows,
            affected_rows: None,
            execution_time_ms: 0,
        }
    }

    /// Creates a new empty query result.
    pub fn empty() -> Self {
        Self::new(vec![], vec![])
    }

    /// Creates a query result with affected rows count (for non-SELECT queries).
    pub fn affected(affected: u64, execution_time_ms: u64) -> Self {
        Self {
            columns: vec![],
            rows: vec![],
            row_count: 0,
            affected_rows: Some(affected),
            execution_time_ms,
        }
    }

    /// Sets the execution time.
    pub fn with_duration(mut self, execution_time_ms: u64) -> Self {
        self.execution_time_ms = execution_time_ms;
        self
    }

    /// Values of the first column rendered as text, in row order.
    pub fn first_column_strings(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.first())
            .map(cell_to_string)
            .collect()
    }

    /// Renders the result as CSV: a header row, then one line per row, no index column.
    pub fn to_csv(&self) -> AppResult<String> {
        if self.columns.is_empty() {
            return Ok(String::new());
        }

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer
            .write_record(self.columns.iter().map(|c| c.name.as_str()))
            .map_err(csv_error)?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(cell_to_string))
                .map_err(csv_error)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| AppError::Validation(e.to_string()))
    }

    /// Renders the result as a JSON array with one object per row, keys in column order.
    pub fn to_json(&self) -> AppResult<String> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(AppError::Validation(format!(
                    "column names must be unique for JSON output, found duplicate '{}'",
                    column.name
                )));
            }
        }
        serde_json::to_string(&Records(self)).map_err(|e| AppError::Validation(e.to_string()))
    }

    /// Renders the result as an aligned text table.
    pub fn render_table(&self) -> String {
        let header: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();

        let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }

        let format_line = |values: &[String]| -> String {
            values
                .iter()
                .zip(&widths)
                .map(|(value, width)| format!("{:<width$}", value, width = *width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = String::new();
        out.push_str(&format_line(&header));
        out.push('\n');
        out.push_str(
            &widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
        out.push('\n');
        for row in &cells {
            out.push_str(&format_line(row));
            out.push('\n');
        }
        out.push_str(&format!("({} rows)", self.row_count));
        out
    }
}

/// Serializes rows as objects keyed by column name, preserving column order.
struct Records<'a>(&'a QueryResult);

struct Record<'a> {
    columns: &'a [ColumnInfo],
    values: &'a [serde_json::Value],
}

impl Serialize for Records<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.rows.len()))?;
        for values in &self.0.rows {
            seq.serialize_element(&Record {
                columns: &self.0.columns,
                values,
            })?;
        }
        seq.end()
    }
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(&column.name, value)?;
        }
        map.end()
    }
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::Io(std::io::Error::other(e))
}

/// Renders one cell as plain text; NULL becomes an empty string.
pub fn cell_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Requested output shape for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Comma-separated text with a header row.
    #[default]
    Csv,
    /// JSON array of objects.
    Json,
    /// The [`QueryResult`] itself.
    Df,
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "df" => Ok(OutputFormat::Df),
            _ => Err(AppError::UnsupportedOutputFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Df => write!(f, "df"),
        }
    }
}

/// A formatted query result.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// CSV or JSON text.
    Text(String),
    /// The unformatted result set.
    Table(QueryResult),
}

impl QueryOutput {
    /// Formats a result set in the requested shape.
    ///
    /// Statements without a result set are rendered as a single
    /// `rows_affected` column in the text formats.
    pub fn format(result: QueryResult, format: OutputFormat) -> AppResult<Self> {
        let text_source = match (result.columns.is_empty(), result.affected_rows) {
            (true, Some(affected)) if format != OutputFormat::Df => QueryResult::new(
                vec![ColumnInfo::new("rows_affected", "BIGINT UNSIGNED")],
                vec![vec![serde_json::Value::from(affected)]],
            ),
            _ => result,
        };
        match format {
            OutputFormat::Csv => Ok(QueryOutput::Text(text_source.to_csv()?)),
            OutputFormat::Json => Ok(QueryOutput::Text(text_source.to_json()?)),
            OutputFormat::Df => Ok(QueryOutput::Table(text_source)),
        }
    }

    /// Returns the text form, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            QueryOutput::Text(text) => Some(text),
            QueryOutput::Table(_) => None,
        }
    }
}
