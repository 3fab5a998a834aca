//! Row decoding.
//!
//! Converts driver rows into `serde_json::Value` cells, dispatching on the
//! column type name reported by the driver.

use serde_json::{Number, Value};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgRow, PgTypeInfo, PgTypeKind};
use sqlx::types::chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::types::{Decimal, Uuid};
use sqlx::{Column, Decode, MySql, Postgres, Row, Type, TypeInfo, ValueRef};

use common::errors::{AppError, AppResult};
use common::models::ColumnInfo;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Column metadata in result order.
pub fn column_info<C: Column>(columns: &[C]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .map(|c| ColumnInfo::new(c.name(), c.type_info().name()))
        .collect()
}

/// Decodes every cell of a MySQL row.
pub fn mysql_row(row: &MySqlRow) -> AppResult<Vec<Value>> {
    (0..row.len()).map(|index| mysql_value(row, index)).collect()
}

/// Decodes every cell of a PostgreSQL row.
pub fn pg_row(row: &PgRow) -> AppResult<Vec<Value>> {
    (0..row.len()).map(|index| pg_value(row, index)).collect()
}

fn mysql_value(row: &MySqlRow, index: usize) -> AppResult<Value> {
    let raw = row.try_get_raw(index).map_err(|e| decode_error(row, index, e))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let type_name = row.columns()[index].type_info().name();
    let value = match type_name {
        "BOOLEAN" => Value::Bool(mysql_get(row, index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            Value::from(mysql_get::<i64>(row, index)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" | "YEAR" => Value::from(mysql_get::<u64>(row, index)?),
        "FLOAT" => float(f64::from(mysql_get::<f32>(row, index)?)),
        "DOUBLE" => float(mysql_get::<f64>(row, index)?),
        "DECIMAL" => decimal(mysql_get::<Decimal>(row, index)?),
        "DATETIME" => timestamp(mysql_get(row, index)?),
        "TIMESTAMP" => Value::String(mysql_get::<DateTime<Utc>>(row, index)?.to_rfc3339()),
        "DATE" => Value::String(mysql_get::<NaiveDate>(row, index)?.to_string()),
        "TIME" => Value::String(mysql_get::<NaiveTime>(row, index)?.to_string()),
        "JSON" => mysql_get::<Value>(row, index)?,
        _ => match row.try_get_unchecked::<String, _>(index) {
            Ok(text) => Value::String(text),
            Err(_) => lossy(mysql_get::<Vec<u8>>(row, index)?),
        },
    };
    Ok(value)
}

/// How a PostgreSQL column is turned into JSON.
///
/// Rows arrive in the binary format, so every type needs a real decoder;
/// anything without one is reported instead of printed as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PgCell {
    Void,
    Bool,
    Char,
    Int2,
    Int4,
    Int8,
    Oid,
    Float4,
    Float8,
    Numeric,
    Money,
    Text,
    Json,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    TimeTz,
    Interval,
    Uuid,
    Bytes,
    Inet,
    Cidr,
    Array(Box<PgCell>),
}

impl PgCell {
    fn by_name(name: &str) -> Option<Self> {
        let cell = match name {
            "VOID" => PgCell::Void,
            "BOOL" => PgCell::Bool,
            "\"CHAR\"" => PgCell::Char,
            "INT2" => PgCell::Int2,
            "INT4" => PgCell::Int4,
            "INT8" => PgCell::Int8,
            "OID" => PgCell::Oid,
            "FLOAT4" => PgCell::Float4,
            "FLOAT8" => PgCell::Float8,
            "NUMERIC" => PgCell::Numeric,
            "MONEY" => PgCell::Money,
            "TEXT" | "VARCHAR" | "CHAR" | "NAME" | "UNKNOWN" | "XML" | "citext" => PgCell::Text,
            "JSON" | "JSONB" => PgCell::Json,
            "TIMESTAMP" => PgCell::Timestamp,
            "TIMESTAMPTZ" => PgCell::TimestampTz,
            "DATE" => PgCell::Date,
            "TIME" => PgCell::Time,
            "TIMETZ" => PgCell::TimeTz,
            "INTERVAL" => PgCell::Interval,
            "UUID" => PgCell::Uuid,
            "BYTEA" => PgCell::Bytes,
            "INET" => PgCell::Inet,
            "CIDR" => PgCell::Cidr,
            _ => return None,
        };
        Some(cell)
    }

    fn in_arrays(&self) -> bool {
        !matches!(
            self,
            PgCell::Void | PgCell::Char | PgCell::Oid | PgCell::Money | PgCell::TimeTz
                | PgCell::Bytes | PgCell::Array(_)
        )
    }

    /// Picks the decoder for a column type; `Err` carries the type name.
    fn for_type(type_info: &PgTypeInfo) -> Result<Self, String> {
        let name = type_info.name();
        if let Some(element) = name.strip_suffix("[]") {
            return match PgCell::by_name(element) {
                Some(cell) if cell.in_arrays() => Ok(PgCell::Array(Box::new(cell))),
                _ => Err(name.to_string()),
            };
        }
        if let Some(cell) = PgCell::by_name(name) {
            return Ok(cell);
        }
        // information_schema columns are domains over the builtin types.
        match type_info.kind() {
            PgTypeKind::Domain(base) => PgCell::for_type(base),
            PgTypeKind::Enum(_) => Ok(PgCell::Text),
            _ => Err(name.to_string()),
        }
    }
}

fn pg_value(row: &PgRow, index: usize) -> AppResult<Value> {
    let raw = row.try_get_raw(index).map_err(|e| decode_error(row, index, e))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let column = &row.columns()[index];
    let cell = PgCell::for_type(column.type_info()).map_err(|type_name| {
        AppError::DatabaseQuery(format!(
            "column '{}' has unsupported type {}",
            column.name(),
            type_name
        ))
    })?;
    pg_cell(row, index, &cell)
}

fn pg_cell(row: &PgRow, index: usize, cell: &PgCell) -> AppResult<Value> {
    let value = match cell {
        PgCell::Void => Value::Null,
        PgCell::Bool => Value::Bool(pg_get(row, index)?),
        PgCell::Char => Value::String(char::from(pg_get::<i8>(row, index)? as u8).to_string()),
        PgCell::Int2 => Value::from(pg_get::<i16>(row, index)?),
        PgCell::Int4 => Value::from(pg_get::<i32>(row, index)?),
        PgCell::Int8 => Value::from(pg_get::<i64>(row, index)?),
        PgCell::Oid => Value::from(pg_get::<Oid>(row, index)?.0),
        PgCell::Float4 => float(f64::from(pg_get::<f32>(row, index)?)),
        PgCell::Float8 => float(pg_get::<f64>(row, index)?),
        PgCell::Numeric => decimal(pg_get::<Decimal>(row, index)?),
        PgCell::Money => decimal(pg_get::<PgMoney>(row, index)?.to_decimal(2)),
        PgCell::Text => Value::String(pg_get(row, index)?),
        PgCell::Json => pg_get::<Value>(row, index)?,
        PgCell::Timestamp => timestamp(pg_get(row, index)?),
        PgCell::TimestampTz => Value::String(pg_get::<DateTime<Utc>>(row, index)?.to_rfc3339()),
        PgCell::Date => Value::String(pg_get::<NaiveDate>(row, index)?.to_string()),
        PgCell::Time => Value::String(pg_get::<NaiveTime>(row, index)?.to_string()),
        PgCell::TimeTz => {
            let value: PgTimeTz<NaiveTime, FixedOffset> = pg_get(row, index)?;
            Value::String(format!("{}{}", value.time, value.offset))
        }
        PgCell::Interval => Value::String(interval_text(&pg_get(row, index)?)),
        PgCell::Uuid => Value::String(pg_get::<Uuid>(row, index)?.to_string()),
        PgCell::Bytes => lossy(pg_get::<Vec<u8>>(row, index)?),
        PgCell::Inet => Value::String(inet_text(pg_get(row, index)?)),
        PgCell::Cidr => Value::String(pg_get::<IpNetwork>(row, index)?.to_string()),
        PgCell::Array(element) => pg_array_cell(row, index, element)?,
    };
    Ok(value)
}

fn pg_array_cell(row: &PgRow, index: usize, element: &PgCell) -> AppResult<Value> {
    match element {
        PgCell::Bool => pg_array(row, index, Value::Bool),
        PgCell::Int2 => pg_array(row, index, |v: i16| Value::from(v)),
        PgCell::Int4 => pg_array(row, index, |v: i32| Value::from(v)),
        PgCell::Int8 => pg_array(row, index, |v: i64| Value::from(v)),
        PgCell::Float4 => pg_array(row, index, |v: f32| float(f64::from(v))),
        PgCell::Float8 => pg_array(row, index, float),
        PgCell::Numeric => pg_array(row, index, decimal),
        PgCell::Text => pg_array(row, index, Value::String),
        PgCell::Json => pg_array(row, index, |v: Value| v),
        PgCell::Timestamp => pg_array(row, index, timestamp),
        PgCell::TimestampTz => pg_array(row, index, |v: DateTime<Utc>| Value::String(v.to_rfc3339())),
        PgCell::Date => pg_array(row, index, |v: NaiveDate| Value::String(v.to_string())),
        PgCell::Time => pg_array(row, index, |v: NaiveTime| Value::String(v.to_string())),
        PgCell::Interval => pg_array(row, index, |v: PgInterval| Value::String(interval_text(&v))),
        PgCell::Uuid => pg_array(row, index, |v: Uuid| Value::String(v.to_string())),
        PgCell::Inet => pg_array(row, index, |v: IpNetwork| Value::String(inet_text(v))),
        PgCell::Cidr => pg_array(row, index, |v: IpNetwork| Value::String(v.to_string())),
        other => Err(AppError::DatabaseQuery(format!(
            "arrays of {:?} are not supported",
            other
        ))),
    }
}

fn pg_array<'r, T>(row: &'r PgRow, index: usize, cell: impl Fn(T) -> Value) -> AppResult<Value>
where
    T: for<'a> Decode<'a, Postgres> + Type<Postgres>,
{
    let items: Vec<Option<T>> = pg_get(row, index)?;
    Ok(Value::Array(
        items
            .into_iter()
            .map(|item| item.map_or(Value::Null, &cell))
            .collect(),
    ))
}

fn timestamp(value: NaiveDateTime) -> Value {
    Value::String(value.format(DATETIME_FORMAT).to_string())
}

/// Renders an interval the way PostgreSQL prints it by default,
/// e.g. `1 year 2 mons 3 days 04:05:06.5`.
fn interval_text(interval: &PgInterval) -> String {
    fn unit(count: i32, name: &str) -> String {
        format!("{} {}{}", count, name, if count == 1 { "" } else { "s" })
    }

    let mut parts = Vec::new();
    for (count, name) in [
        (interval.months / 12, "year"),
        (interval.months % 12, "mon"),
        (interval.days, "day"),
    ] {
        if count != 0 {
            parts.push(unit(count, name));
        }
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let total = interval.microseconds.unsigned_abs();
        let hours = total / 3_600_000_000;
        let minutes = total / 60_000_000 % 60;
        let seconds = total / 1_000_000 % 60;
        let micros = total % 1_000_000;
        let mut time = format!("{}{:02}:{:02}:{:02}", sign, hours, minutes, seconds);
        if micros > 0 {
            let fraction = format!("{:06}", micros);
            time.push('.');
            time.push_str(fraction.trim_end_matches('0'));
        }
        parts.push(time);
    }
    parts.join(" ")
}

/// `inet` values print without the prefix when they name a single host.
fn inet_text(network: IpNetwork) -> String {
    let host_prefix = match network {
        IpNetwork::V4(_) => 32,
        IpNetwork::V6(_) => 128,
    };
    if network.prefix() == host_prefix {
        network.ip().to_string()
    } else {
        network.to_string()
    }
}

// The type name has already been matched, so the driver's compatibility
// check would only reject domain types.
fn mysql_get<'r, T: Decode<'r, MySql>>(row: &'r MySqlRow, index: usize) -> AppResult<T> {
    row.try_get_unchecked(index)
        .map_err(|e| decode_error(row, index, e))
}

fn pg_get<'r, T: Decode<'r, Postgres>>(row: &'r PgRow, index: usize) -> AppResult<T> {
    row.try_get_unchecked(index)
        .map_err(|e| decode_error(row, index, e))
}

fn decode_error<R: Row>(row: &R, index: usize, error: sqlx::Error) -> AppError {
    let name = row.columns().get(index).map(|c| c.name()).unwrap_or("?");
    AppError::DatabaseQuery(format!("failed to decode column '{}': {}", name, error))
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn decimal(value: Decimal) -> Value {
    let text = value.normalize().to_string();
    match text.parse::<Number>() {
        Ok(number) => Value::Number(number),
        Err(_) => Value::String(text),
    }
}

fn lossy(bytes: Vec<u8>) -> Value {
    Value::String(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_decimal_becomes_number() {
        assert_eq!(decimal(Decimal::from_str("12.50").unwrap()), serde_json::json!(12.5));
        assert_eq!(decimal(Decimal::from_str("7").unwrap()), serde_json::json!(7));
    }

    #[test]
    fn test_non_finite_float_is_null() {
        assert_eq!(float(f64::NAN), Value::Null);
        assert_eq!(float(1.5), serde_json::json!(1.5));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        assert_eq!(lossy(vec![b'a', 0xff, b'b']), Value::String("a\u{fffd}b".into()));
    }

    fn cell_for<T: Type<Postgres>>() -> Result<PgCell, String> {
        PgCell::for_type(&T::type_info())
    }

    #[test]
    fn test_binary_only_types_get_decoders() {
        assert_eq!(cell_for::<Oid>(), Ok(PgCell::Oid));
        assert_eq!(cell_for::<PgInterval>(), Ok(PgCell::Interval));
        assert_eq!(cell_for::<PgMoney>(), Ok(PgCell::Money));
        assert_eq!(cell_for::<PgTimeTz<NaiveTime, FixedOffset>>(), Ok(PgCell::TimeTz));
        assert_eq!(cell_for::<IpNetwork>(), Ok(PgCell::Inet));
        assert_eq!(cell_for::<String>(), Ok(PgCell::Text));
        assert_eq!(cell_for::<i8>(), Ok(PgCell::Char));
    }

    #[test]
    fn test_arrays_decode_by_element() {
        assert_eq!(cell_for::<Vec<i32>>(), Ok(PgCell::Array(Box::new(PgCell::Int4))));
        assert_eq!(cell_for::<Vec<String>>(), Ok(PgCell::Array(Box::new(PgCell::Text))));
        assert_eq!(
            cell_for::<Vec<PgInterval>>(),
            Ok(PgCell::Array(Box::new(PgCell::Interval)))
        );
        assert_eq!(cell_for::<Vec<Oid>>(), Err("OID[]".to_string()));
    }

    #[test]
    fn test_unknown_type_is_reported_by_name() {
        assert_eq!(
            cell_for::<sqlx::postgres::types::PgRange<i32>>(),
            Err("INT4RANGE".to_string())
        );
    }

    #[test]
    fn test_interval_text() {
        let interval = |months, days, microseconds| PgInterval {
            months,
            days,
            microseconds,
        };
        assert_eq!(interval_text(&interval(0, 1, 0)), "1 day");
        assert_eq!(
            interval_text(&interval(14, 3, 14_706_500_000)),
            "1 year 2 mons 3 days 04:05:06.5"
        );
        assert_eq!(interval_text(&interval(0, 0, 0)), "00:00:00");
        assert_eq!(interval_text(&interval(-14, 0, 0)), "-1 years -2 mons");
        assert_eq!(interval_text(&interval(0, 0, -90_000_000)), "-00:01:30");
    }

    #[test]
    fn test_inet_text_drops_host_prefix() {
        let host: IpNetwork = "10.0.0.1/32".parse().unwrap();
        let subnet: IpNetwork = "10.0.0.0/8".parse().unwrap();
        let v6: IpNetwork = "::1/128".parse().unwrap();
        assert_eq!(inet_text(host), "10.0.0.1");
        assert_eq!(inet_text(subnet), "10.0.0.0/8");
        assert_eq!(inet_text(v6), "::1");
    }
}
