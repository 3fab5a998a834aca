//! PostgreSQL parameter conversion.
//!
//! Parameters arrive as JSON scalars. PostgreSQL infers a type for every
//! placeholder when the statement is prepared; each value is converted to
//! that type before it is bound, so `WHERE id = :id` accepts `{"id": "1"}`
//! and a `null` binds as a NULL of the column's type.

use std::str::FromStr;

use serde_json::Value;
use sqlx::postgres::{PgArguments, PgTypeInfo, PgTypeKind};
use sqlx::query::Query;
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{Decimal, Uuid};
use sqlx::{Postgres, TypeInfo};

use common::errors::{AppError, AppResult};

/// A parameter value typed for its placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum PgParam {
    Bool(Option<bool>),
    Int2(Option<i16>),
    Int4(Option<i32>),
    Int8(Option<i64>),
    Float4(Option<f32>),
    Float8(Option<f64>),
    Numeric(Option<Decimal>),
    Text(Option<String>),
    Date(Option<NaiveDate>),
    Time(Option<NaiveTime>),
    Timestamp(Option<NaiveDateTime>),
    TimestampTz(Option<DateTime<Utc>>),
    Uuid(Option<Uuid>),
    Json(Option<Value>),
    Bytes(Option<Vec<u8>>),
}

/// Converts the JSON values to the parameter types of a prepared statement.
pub fn convert_all(values: &[Value], types: &[PgTypeInfo]) -> AppResult<Vec<PgParam>> {
    if values.len() != types.len() {
        return Err(AppError::InvalidParameter(format!(
            "statement expects {} parameters, got {}",
            types.len(),
            values.len()
        )));
    }
    values
        .iter()
        .zip(types)
        .enumerate()
        .map(|(i, (value, ty))| convert(value, ty, i + 1))
        .collect()
}

/// Converts one value for placeholder `$position` of type `ty`.
pub fn convert(value: &Value, ty: &PgTypeInfo, position: usize) -> AppResult<PgParam> {
    let ty = base_type(ty);
    let name = ty.name();
    let read = Reader {
        value,
        position,
        type_name: name,
    };

    let param = match name {
        "BOOL" => PgParam::Bool(read.with(as_bool)?),
        "INT2" => PgParam::Int2(read.with(|v| as_i64(v).and_then(|i| i16::try_from(i).ok()))?),
        "INT4" => PgParam::Int4(read.with(|v| as_i64(v).and_then(|i| i32::try_from(i).ok()))?),
        "INT8" => PgParam::Int8(read.with(as_i64)?),
        "FLOAT4" => PgParam::Float4(read.with(|v| as_f64(v).map(|f| f as f32))?),
        "FLOAT8" => PgParam::Float8(read.with(as_f64)?),
        "NUMERIC" => PgParam::Numeric(read.with(as_decimal)?),
        "DATE" => PgParam::Date(read.with(|v| v.as_str().and_then(|s| s.parse().ok()))?),
        "TIME" => PgParam::Time(read.with(|v| v.as_str().and_then(|s| s.parse().ok()))?),
        "TIMESTAMP" => PgParam::Timestamp(read.with(|v| v.as_str().and_then(parse_timestamp))?),
        "TIMESTAMPTZ" => PgParam::TimestampTz(read.with(|v| v.as_str().and_then(parse_timestamptz))?),
        "UUID" => PgParam::Uuid(read.with(|v| v.as_str().and_then(|s| Uuid::parse_str(s).ok()))?),
        "JSON" | "JSONB" => PgParam::Json(read.with(as_json)?),
        "BYTEA" => PgParam::Bytes(read.with(|v| v.as_str().map(|s| s.as_bytes().to_vec()))?),
        "TEXT" | "VARCHAR" | "CHAR" | "NAME" | "UNKNOWN" | "XML" | "citext" => {
            PgParam::Text(read.with(as_text)?)
        }
        _ if matches!(ty.kind(), PgTypeKind::Enum(_)) => PgParam::Text(read.with(as_text)?),
        other => {
            return Err(AppError::InvalidParameter(format!(
                "parameter ${} has type {}, which cannot be bound from JSON; cast the placeholder, e.g. :name::text",
                position, other
            )))
        }
    };
    Ok(param)
}

/// Binds converted parameters in order.
pub fn bind(
    mut query: Query<'_, Postgres, PgArguments>,
    params: Vec<PgParam>,
) -> Query<'_, Postgres, PgArguments> {
    for param in params {
        query = match param {
            PgParam::Bool(v) => query.bind(v),
            PgParam::Int2(v) => query.bind(v),
            PgParam::Int4(v) => query.bind(v),
            PgParam::Int8(v) => query.bind(v),
            PgParam::Float4(v) => query.bind(v),
            PgParam::Float8(v) => query.bind(v),
            PgParam::Numeric(v) => query.bind(v),
            PgParam::Text(v) => query.bind(v),
            PgParam::Date(v) => query.bind(v),
            PgParam::Time(v) => query.bind(v),
            PgParam::Timestamp(v) => query.bind(v),
            PgParam::TimestampTz(v) => query.bind(v),
            PgParam::Uuid(v) => query.bind(v),
            PgParam::Json(v) => query.bind(v),
            PgParam::Bytes(v) => query.bind(v),
        };
    }
    query
}

struct Reader<'a> {
    value: &'a Value,
    position: usize,
    type_name: &'a str,
}

impl Reader<'_> {
    /// `null` is always accepted; anything else must parse.
    fn with<T>(&self, parse: impl Fn(&Value) -> Option<T>) -> AppResult<Option<T>> {
        if self.value.is_null() {
            return Ok(None);
        }
        parse(self.value).map(Some).ok_or_else(|| {
            AppError::InvalidParameter(format!(
                "parameter ${} expects {}, got {}",
                self.position, self.type_name, self.value
            ))
        })
    }
}

fn base_type(ty: &PgTypeInfo) -> &PgTypeInfo {
    match ty.kind() {
        PgTypeKind::Domain(base) => base_type(base),
        _ => ty,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "t" => Some(true),
            "false" | "f" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Strings holding JSON text are parsed; any other value is sent as is.
fn as_json(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => Some(serde_json::from_str(s).unwrap_or_else(|_| value.clone())),
        other => Some(other.clone()),
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::from_str(s)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::from_str(s)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_timestamptz(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            parse_timestamp(s).map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::Type;

    fn type_of<T: Type<Postgres>>() -> PgTypeInfo {
        T::type_info()
    }

    #[test]
    fn test_string_converted_to_integer_column() {
        assert_eq!(
            convert(&json!("1"), &type_of::<i32>(), 1).unwrap(),
            PgParam::Int4(Some(1))
        );
        assert_eq!(
            convert(&json!(7), &type_of::<i64>(), 1).unwrap(),
            PgParam::Int8(Some(7))
        );
    }

    #[test]
    fn test_string_converted_to_date_and_uuid() {
        assert_eq!(
            convert(&json!("2024-02-01"), &type_of::<NaiveDate>(), 1).unwrap(),
            PgParam::Date(NaiveDate::from_ymd_opt(2024, 2, 1))
        );
        let id = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        assert_eq!(
            convert(&json!(id), &type_of::<Uuid>(), 1).unwrap(),
            PgParam::Uuid(Uuid::parse_str(id).ok())
        );
    }

    #[test]
    fn test_null_takes_the_placeholder_type() {
        assert_eq!(
            convert(&Value::Null, &type_of::<i32>(), 1).unwrap(),
            PgParam::Int4(None)
        );
        assert_eq!(
            convert(&Value::Null, &type_of::<NaiveDate>(), 1).unwrap(),
            PgParam::Date(None)
        );
    }

    #[test]
    fn test_timestamps_accept_common_forms() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 1)
            .and_then(|d| d.and_hms_opt(10, 30, 0));
        for raw in ["2024-02-01T10:30:00", "2024-02-01 10:30:00"] {
            assert_eq!(
                convert(&json!(raw), &type_of::<NaiveDateTime>(), 1).unwrap(),
                PgParam::Timestamp(expected)
            );
        }
        let tz = convert(&json!("2024-02-01T12:30:00+02:00"), &type_of::<DateTime<Utc>>(), 1).unwrap();
        assert_eq!(tz, PgParam::TimestampTz(expected.map(|n| n.and_utc())));
    }

    #[test]
    fn test_numbers_and_text() {
        assert_eq!(
            convert(&json!("12.50"), &type_of::<Decimal>(), 1).unwrap(),
            PgParam::Numeric(Decimal::from_str("12.50").ok())
        );
        assert_eq!(
            convert(&json!(42), &type_of::<String>(), 1).unwrap(),
            PgParam::Text(Some("42".into()))
        );
        assert_eq!(
            convert(&json!("t"), &type_of::<bool>(), 1).unwrap(),
            PgParam::Bool(Some(true))
        );
    }

    #[test]
    fn test_unparsable_value_names_the_placeholder() {
        let err = convert(&json!("abc"), &type_of::<i32>(), 2).unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(ref m) if m.contains("$2") && m.contains("INT4")));

        let err = convert(&json!(70000), &type_of::<i16>(), 1).unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
    }

    #[test]
    fn test_unsupported_placeholder_type() {
        let err = convert(&json!("[1,5)"), &type_of::<sqlx::postgres::types::PgRange<i32>>(), 1)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(ref m) if m.contains("INT4RANGE")));
    }

    #[test]
    fn test_parameter_count_must_match() {
        let err = convert_all(&[json!(1)], &[]).unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
    }
}
