//! SQL identifier validator.
//!
//! Table names supplied on the command line end up in metadata queries, so
//! they are validated before use and quoted where the dialect cannot bind them.

use crate::errors::AppError;

/// Longest identifier accepted by either dialect (MySQL allows 64, PostgreSQL 63).
const MAX_IDENTIFIER_LEN: usize = 64;

/// Validates SQL identifiers.
pub struct SqlValidator;

/// A validated, possibly schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub schema: Option<String>,
    pub table: String,
}

impl SqlValidator {
    /// Validates a table name of the form `table` or `schema.table`.
    ///
    /// Each part must be 1-64 characters of letters, digits, `_` or `$`.
    ///
    /// # Errors
    /// Returns `AppError::Validation` for anything else.
    pub fn table_name(name: &str) -> Result<TableName, AppError> {
        let parts: Vec<&str> = name.split('.').collect();
        match parts.as_slice() {
            [table] => Ok(TableName {
                schema: None,
                table: Self::identifier(table)?.to_string(),
            }),
            [schema, table] => Ok(TableName {
                schema: Some(Self::identifier(schema)?.to_string()),
                table: Self::identifier(table)?.to_string(),
            }),
            _ => Err(AppError::Validation(format!("invalid table name: {:?}", name))),
        }
    }

    /// Validates a single identifier part.
    pub fn identifier(part: &str) -> Result<&str, AppError> {
        let valid = !part.is_empty()
            && part.chars().count() <= MAX_IDENTIFIER_LEN
            && part
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '$');
        if valid {
            Ok(part)
        } else {
            Err(AppError::Validation(format!("invalid identifier: {:?}", part)))
        }
    }

    /// Quotes an identifier part with MySQL backticks.
    pub fn quote_mysql(part: &str) -> String {
        format!("`{}`", part.replace('`', "``"))
    }
}

impl TableName {
    /// Backtick-quoted form for MySQL statements.
    pub fn mysql_quoted(&self) -> String {
        match &self.schema {
            Some(schema) => format!(
                "{}.{}",
                SqlValidator::quote_mysql(schema),
                SqlValidator::quote_mysql(&self.table)
            ),
            None => SqlValidator::quote_mysql(&self.table),
        }
    }
}
