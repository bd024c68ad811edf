//! PostgreSQL backend for the [`Database`] trait

use super::{init_pool, ColumnRef, Database};
use crate::error::{ChatError, Result};
use crate::result::ResultTable;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::types::{PgHasArrayType, PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgRow, PgValueRef, Postgres};
use sqlx::{Column, Decode, Executor, PgPool, Row, Type, TypeInfo, ValueRef};
use std::net::IpAddr;
use std::str::FromStr;
use tracing::{debug, warn};

const COLUMNS_SQL: &str = r#"
    SELECT table_name::text, column_name::text
    FROM information_schema.columns
    WHERE table_schema = 'public'
    ORDER BY table_name, ordinal_position
"#;

const DATE_COLUMNS_SQL: &str = r#"
    SELECT table_name::text, column_name::text
    FROM information_schema.columns
    WHERE table_schema = 'public'
      AND (column_name ILIKE '%date%' OR column_name ILIKE '%time%')
    ORDER BY table_name, ordinal_position
"#;

pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = init_pool(database_url, max_connections)
            .await
            .map_err(|e| ChatError::Database(format!("Failed to connect: {}", e)))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_column_refs(&self, sql: &str, what: &str) -> Result<Vec<ColumnRef>> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ChatError::Database(format!("Failed to load {}: {}", what, e)))?;

        rows.iter()
            .map(|row| -> Result<ColumnRef> {
                Ok(ColumnRef {
                    table: row.try_get(0)?,
                    column: row.try_get(1)?,
                })
            })
            .collect()
    }

    /// Column names of a statement that produced no rows
    async fn describe_columns(&self, sql: &str) -> Vec<String> {
        match self.pool.describe(sql).await {
            Ok(described) => described
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            Err(e) => {
                debug!("Could not describe empty result: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Database for PgDatabase {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn list_columns(&self) -> Result<Vec<ColumnRef>> {
        self.load_column_refs(COLUMNS_SQL, "schema columns").await
    }

    async fn list_date_like_columns(&self) -> Result<Vec<ColumnRef>> {
        self.load_column_refs(DATE_COLUMNS_SQL, "date-like columns").await
    }

    async fn execute(&self, sql: &str) -> Result<ResultTable> {
        let rows = sqlx::query(sql)
            .persistent(false)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ChatError::Database(e.to_string()))?;

        let Some(first) = rows.first() else {
            let columns = self.describe_columns(sql).await;
            return Ok(ResultTable::new(columns, Vec::new()));
        };

        let columns: Vec<String> = first.columns().iter().map(|c| c.name().to_string()).collect();
        let type_names: Vec<String> = first
            .columns()
            .iter()
            .map(|c| c.type_info().name().to_string())
            .collect();

        let data = rows
            .iter()
            .map(|row| {
                type_names
                    .iter()
                    .enumerate()
                    .map(|(idx, type_name)| decode_cell(row, idx, type_name))
                    .collect()
            })
            .collect();

        Ok(ResultTable::new(columns, data))
    }
}

/// Decode one cell into JSON. Values of types without a dedicated arm are
/// kept as text when their wire bytes are printable; anything else becomes a
/// `<type>` placeholder rather than failing the whole query.
fn decode_cell(row: &PgRow, idx: usize, type_name: &str) -> Value {
    let raw = match row.try_get_raw(idx) {
        Ok(raw) if !raw.is_null() => raw,
        _ => return Value::Null,
    };

    let decoded: std::result::Result<Value, sqlx::Error> = match type_name {
        "BOOL" => row.try_get::<bool, _>(idx).map(Value::from),
        "INT2" => row.try_get::<i16, _>(idx).map(Value::from),
        "INT4" => row.try_get::<i32, _>(idx).map(Value::from),
        "INT8" => row.try_get::<i64, _>(idx).map(Value::from),
        "FLOAT4" => row.try_get::<f32, _>(idx).map(|v| Value::from(f64::from(v))),
        "FLOAT8" => row.try_get::<f64, _>(idx).map(Value::from),
        "NUMERIC" => row.try_get::<Decimal, _>(idx).map(decimal_to_json),
        "MONEY" => row
            .try_get::<PgMoney, _>(idx)
            .map(|m| decimal_to_json(m.to_decimal(2))),
        "DATE" => row
            .try_get::<NaiveDate, _>(idx)
            .map(|d| Value::from(d.to_string())),
        "TIME" => row
            .try_get::<NaiveTime, _>(idx)
            .map(|t| Value::from(t.to_string())),
        "TIMETZ" => row
            .try_get::<PgTimeTz<NaiveTime, FixedOffset>, _>(idx)
            .map(|t| Value::from(format!("{}{}", t.time, t.offset))),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(idx)
            .map(|ts| Value::from(ts.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(idx)
            .map(|ts| Value::from(ts.to_rfc3339())),
        "INTERVAL" => row
            .try_get::<PgInterval, _>(idx)
            .map(|i| Value::from(interval_text(&i))),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx),
        "UUID" => row
            .try_get::<sqlx::types::Uuid, _>(idx)
            .map(|u| Value::from(u.to_string())),
        "BYTEA" => row
            .try_get::<Vec<u8>, _>(idx)
            .map(|bytes| Value::from(bytea_text(&bytes))),
        "INET" | "CIDR" => raw_bytes(&raw).and_then(|bytes| {
            inet_text(bytes, type_name == "CIDR")
                .map(Value::from)
                .ok_or_else(|| sqlx::Error::Decode(format!("malformed {} value", type_name).into()))
        }),
        "BOOL[]" => decode_array::<bool>(row, idx, Value::from),
        "INT2[]" => decode_array::<i16>(row, idx, Value::from),
        "INT4[]" => decode_array::<i32>(row, idx, Value::from),
        "INT8[]" => decode_array::<i64>(row, idx, Value::from),
        "FLOAT4[]" => decode_array::<f32>(row, idx, |v| Value::from(f64::from(v))),
        "FLOAT8[]" => decode_array::<f64>(row, idx, Value::from),
        "NUMERIC[]" => decode_array::<Decimal>(row, idx, decimal_to_json),
        "TEXT[]" | "VARCHAR[]" | "CHAR[]" | "NAME[]" => decode_array::<String>(row, idx, Value::from),
        "DATE[]" => decode_array::<NaiveDate>(row, idx, |d| Value::from(d.to_string())),
        "TIMESTAMP[]" => decode_array::<NaiveDateTime>(row, idx, |ts| Value::from(ts.to_string())),
        "TIMESTAMPTZ[]" => decode_array::<DateTime<Utc>>(row, idx, |ts| Value::from(ts.to_rfc3339())),
        "INTERVAL[]" => decode_array::<PgInterval>(row, idx, |i| Value::from(interval_text(&i))),
        "UUID[]" => decode_array::<sqlx::types::Uuid>(row, idx, |u| Value::from(u.to_string())),
        "JSON[]" | "JSONB[]" => decode_array::<Value>(row, idx, |v| v),
        _ => row
            .try_get::<String, _>(idx)
            .map(Value::from)
            .or_else(|e| printable_text(&raw).map(Value::from).ok_or(e)),
    };

    decoded.unwrap_or_else(|e| {
        warn!("Could not decode {} column {}: {}", type_name, idx, e);
        Value::String(format!("<{}>", type_name.to_lowercase()))
    })
}

/// One-dimensional array with NULL elements kept as JSON null
fn decode_array<T>(
    row: &PgRow,
    idx: usize,
    to_json: impl Fn(T) -> Value,
) -> std::result::Result<Value, sqlx::Error>
where
    T: for<'r> Decode<'r, Postgres> + Type<Postgres> + PgHasArrayType,
{
    let items: Vec<Option<T>> = row.try_get(idx)?;
    Ok(Value::Array(
        items
            .into_iter()
            .map(|item| item.map_or(Value::Null, &to_json))
            .collect(),
    ))
}

fn raw_bytes<'r>(raw: &PgValueRef<'r>) -> std::result::Result<&'r [u8], sqlx::Error> {
    raw.as_bytes().map_err(sqlx::Error::Decode)
}

/// Wire value as text, if it is valid UTF-8 without control characters.
/// Enum, domain and citext values arrive this way.
fn printable_text(raw: &PgValueRef<'_>) -> Option<String> {
    let text = raw.as_str().ok()?;
    if text.chars().any(|c| c.is_control() && !c.is_whitespace()) {
        return None;
    }
    Some(text.to_string())
}

/// PostgreSQL's default (`postgres` style) interval output
fn interval_text(interval: &PgInterval) -> String {
    fn unit(n: i64, singular: &str, plural: &str) -> String {
        format!("{} {}", n, if n.abs() == 1 { singular } else { plural })
    }

    let mut parts = Vec::new();
    let years = i64::from(interval.months / 12);
    let months = i64::from(interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year", "years"));
    }
    if months != 0 {
        parts.push(unit(months, "mon", "mons"));
    }
    if interval.days != 0 {
        parts.push(unit(i64::from(interval.days), "day", "days"));
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let micros = interval.microseconds.unsigned_abs();
        let secs = micros / 1_000_000;
        let mut clock = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
        let frac = micros % 1_000_000;
        if frac != 0 {
            clock.push_str(format!(".{:06}", frac).trim_end_matches('0'));
        }
        parts.push(clock);
    }

    parts.join(" ")
}

/// `\x`-prefixed hex, as `bytea_output = hex` prints it
fn bytea_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for byte in bytes {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Binary `inet`/`cidr`: family, prefix bits, is_cidr flag, address length,
/// address bytes. The prefix is printed when it is not the full width, and
/// always for `cidr`.
fn inet_text(bytes: &[u8], cidr: bool) -> Option<String> {
    let [family, bits, _, len, addr @ ..] = bytes else {
        return None;
    };
    if usize::from(*len) != addr.len() {
        return None;
    }

    let (ip, width): (IpAddr, u8) = match *family {
        2 => (IpAddr::from(<[u8; 4]>::try_from(addr).ok()?), 32),
        3 => (IpAddr::from(<[u8; 16]>::try_from(addr).ok()?), 128),
        _ => return None,
    };

    if cidr || *bits != width {
        Some(format!("{}/{}", ip, bits))
    } else {
        Some(ip.to_string())
    }
}

fn decimal_to_json(value: Decimal) -> Value {
    let text = value.normalize().to_string();
    serde_json::Number::from_str(&text)
        .map(Value::Number)
        .unwrap_or(Value::String(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimals_become_json_numbers() {
        assert_eq!(decimal_to_json(Decimal::new(250, 2)), serde_json::json!(2.5));
        assert_eq!(decimal_to_json(Decimal::new(3, 0)), serde_json::json!(3));
    }

    #[test]
    fn intervals_print_like_postgres() {
        let interval = |months, days, microseconds| PgInterval {
            months,
            days,
            microseconds,
        };
        assert_eq!(interval_text(&interval(0, 0, 0)), "00:00:00");
        assert_eq!(interval_text(&interval(0, 2, 43_200_000_000)), "2 days 12:00:00");
        assert_eq!(interval_text(&interval(14, 1, 0)), "1 year 2 mons 1 day");
        assert_eq!(interval_text(&interval(0, 0, 5_500_000)), "00:00:05.5");
        assert_eq!(interval_text(&interval(0, -3, -3_600_000_000)), "-3 days -01:00:00");
    }

    #[test]
    fn bytea_prints_as_hex() {
        assert_eq!(bytea_text(&[0xde, 0xad, 0x01]), "\\xdead01");
        assert_eq!(bytea_text(&[]), "\\x");
    }

    #[test]
    fn inet_wire_format_is_decoded() {
        assert_eq!(inet_text(&[2, 32, 0, 4, 192, 168, 0, 1], false).unwrap(), "192.168.0.1");
        assert_eq!(inet_text(&[2, 24, 1, 4, 10, 0, 0, 0], true).unwrap(), "10.0.0.0/24");
        let mut v6 = vec![3, 128, 0, 16];
        v6.extend_from_slice(&[0; 15]);
        v6.push(1);
        assert_eq!(inet_text(&v6, false).unwrap(), "::1");
        assert!(inet_text(&[2, 32, 0, 4, 1, 2], false).is_none());
    }

    #[test]
    fn catalog_queries_cast_identifiers_to_text() {
        assert!(COLUMNS_SQL.contains("table_name::text"));
        assert!(DATE_COLUMNS_SQL.contains("ILIKE '%date%'"));
        assert!(DATE_COLUMNS_SQL.contains("ILIKE '%time%'"));
    }
}
