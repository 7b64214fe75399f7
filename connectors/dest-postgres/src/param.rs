//! Binding and reading [`SqlValue`]s through `tokio-postgres`.

use chrono::NaiveDateTime;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

use tidemark_sdk::prelude::{ColumnType, SqlValue};
use tidemark_types::watermark::{from_naive_utc, to_naive_utc};

/// Borrowed parameter, typed to match its column's Postgres type.
pub(crate) enum SqlParamValue<'a> {
    Text(Option<&'a str>),
    Float64(Option<f64>),
    Timestamp(NaiveDateTime),
}

impl<'a> SqlParamValue<'a> {
    pub(crate) fn as_tosql(&self) -> &(dyn ToSql + Sync) {
        match self {
            Self::Text(v) => v,
            Self::Float64(v) => v,
            Self::Timestamp(v) => v,
        }
    }
}

impl<'a> From<&'a SqlValue> for SqlParamValue<'a> {
    fn from(value: &'a SqlValue) -> Self {
        match value {
            SqlValue::Text(v) => Self::Text(v.as_deref()),
            SqlValue::Float(v) => Self::Float64(*v),
            SqlValue::Timestamp(ms) => Self::Timestamp(to_naive_utc(*ms)),
        }
    }
}

/// Read column `idx` as the [`SqlValue`] flavor of `ty`.
pub(crate) fn read_value(
    row: &Row,
    idx: usize,
    ty: Option<ColumnType>,
) -> Result<SqlValue, tokio_postgres::Error> {
    Ok(match ty {
        Some(ColumnType::Float) => SqlValue::Float(row.try_get(idx)?),
        Some(ColumnType::Timestamp) => {
            SqlValue::Timestamp(from_naive_utc(row.try_get::<_, NaiveDateTime>(idx)?))
        }
        Some(ColumnType::Text) | None => SqlValue::Text(row.try_get(idx)?),
    })
}

pub(crate) fn read_timestamp(
    row: &Row,
    idx: usize,
) -> Result<Option<i64>, tokio_postgres::Error> {
    Ok(row
        .try_get::<_, Option<NaiveDateTime>>(idx)?
        .map(from_naive_utc))
}
