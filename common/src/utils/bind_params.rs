//! Named bind parameters.
//!
//! Queries use `:name` placeholders. They are rewritten to the dialect's
//! positional form (`?` for MySQL, `$n` for PostgreSQL) and the values are
//! collected in placeholder order, so values never end up in the query text.

use serde_json::{Map, Value};

use crate::errors::{AppError, AppResult};
use crate::models::connection::Dialect;

/// A query rewritten for positional binding.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    /// Query text with positional placeholders.
    pub sql: String,
    /// Values in binding order.
    pub values: Vec<Value>,
}

/// Rewrites `:name` placeholders in `sql` and collects the matching values.
///
/// String literals, quoted identifiers, comments and `::` casts are left
/// untouched; `\:` produces a literal colon.
///
/// # Errors
/// Returns `AppError::InvalidParameter` if a placeholder has no value or a
/// value is an array or object.
pub fn bind_named(sql: &str, params: &Map<String, Value>, dialect: Dialect) -> AppResult<BoundQuery> {
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut pg_slots: Vec<String> = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                out.push(c);
                copy_quoted(&mut chars, &mut out, c, dialect == Dialect::MySql && c != '`');
            }
            '-' if chars.peek() == Some(&'-') => {
                out.push(c);
                for next in chars.by_ref() {
                    out.push(next);
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                out.push(c);
                let mut prev = '\0';
                for next in chars.by_ref() {
                    out.push(next);
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            '\\' if chars.peek() == Some(&':') => {
                chars.next();
                out.push(':');
            }
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                out.push_str("::");
            }
            ':' if chars.peek().is_some_and(|n| n.is_alphabetic() || *n == '_') => {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_alphanumeric() || n == '_' {
                        name.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = lookup(params, &name)?;
                match dialect {
                    Dialect::MySql => {
                        out.push('?');
                        values.push(value);
                    }
                    Dialect::Postgres => {
                        let slot = match pg_slots.iter().position(|n| *n == name) {
                            Some(index) => index + 1,
                            None => {
                                pg_slots.push(name);
                                values.push(value);
                                pg_slots.len()
                            }
                        };
                        out.push('$');
                        out.push_str(&slot.to_string());
                    }
                }
            }
            _ => out.push(c),
        }
    }

    Ok(BoundQuery { sql: out, values })
}

fn copy_quoted<I>(chars: &mut std::iter::Peekable<I>, out: &mut String, quote: char, backslash_escapes: bool)
where
    I: Iterator<Item = char>,
{
    while let Some(next) = chars.next() {
        out.push(next);
        if backslash_escapes && next == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else if next == quote {
            // A doubled quote stays inside the literal.
            if chars.peek() == Some(&quote) {
                if let Some(doubled) = chars.next() {
                    out.push(doubled);
                }
            } else {
                return;
            }
        }
    }
}

fn lookup(params: &Map<String, Value>, name: &str) -> AppResult<Value> {
    match params.get(name) {
        Some(Value::Array(_)) | Some(Value::Object(_)) => Err(AppError::InvalidParameter(format!(
            "parameter '{}' must be a string, number, boolean or null",
            name
        ))),
        Some(value) => Ok(value.clone()),
        None => Err(AppError::InvalidParameter(format!(
            "A value is required for bind parameter '{}'",
            name
        ))),
    }
}
