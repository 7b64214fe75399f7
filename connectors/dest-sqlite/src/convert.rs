//! Mapping between [`SqlValue`] and `SQLite` storage values.

use rusqlite::types::{Type, Value};
use rusqlite::Row;
use tidemark_sdk::prelude::{ColumnType, SqlValue};
use tidemark_types::watermark::{format_warehouse, parse_timestamp};

pub(crate) fn bind_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Text(Some(s)) => Value::Text(s.clone()),
        SqlValue::Float(Some(f)) => Value::Real(*f),
        SqlValue::Text(None) | SqlValue::Float(None) => Value::Null,
        SqlValue::Timestamp(ms) => Value::Text(format_warehouse(*ms)),
    }
}

/// Read a stored timestamp column; `NULL` (empty aggregate) reads as `None`.
pub(crate) fn read_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<i64>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        parse_timestamp(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Read column `idx` as the [`SqlValue`] flavor of `ty`. Columns unknown to
/// the table read as text.
pub(crate) fn read_value(
    row: &Row<'_>,
    idx: usize,
    ty: Option<ColumnType>,
) -> rusqlite::Result<SqlValue> {
    match ty {
        Some(ColumnType::Float) => Ok(SqlValue::Float(row.get(idx)?)),
        Some(ColumnType::Timestamp) => match read_timestamp(row, idx)? {
            Some(ms) => Ok(SqlValue::Timestamp(ms)),
            None => Err(rusqlite::Error::InvalidColumnType(
                idx,
                "timestamp".into(),
                Type::Null,
            )),
        },
        Some(ColumnType::Text) | None => Ok(SqlValue::Text(row.get(idx)?)),
    }
}
