//! SQL text builders shared by the warehouse connectors.
//!
//! Statements are built from a [`TableSpec`] so placeholders always follow
//! the table's column order. Only identifiers are interpolated; values are
//! always bound as parameters.

use std::fmt::Write as _;

use pg_escape::quote_identifier;
use tidemark_types::row::{ColumnType, TableSpec};

/// Placeholder and type flavor of the target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `$1, $2, ...`
    Postgres,
    /// `?1, ?2, ...`
    Sqlite,
}

impl Dialect {
    fn push_placeholder(self, sql: &mut String, n: usize) {
        let _ = match self {
            Self::Postgres => write!(sql, "${n}"),
            Self::Sqlite => write!(sql, "?{n}"),
        };
    }

    #[must_use]
    pub fn column_type(self, ty: ColumnType) -> &'static str {
        match (self, ty) {
            (_, ColumnType::Text) => "TEXT",
            (Self::Postgres, ColumnType::Float) => "DOUBLE PRECISION",
            (Self::Sqlite, ColumnType::Float) => "REAL",
            (Self::Postgres, ColumnType::Timestamp) => "TIMESTAMP(3)",
            // Stored as `YYYY-MM-DD HH:MM:SS.mmm`, which sorts lexically.
            (Self::Sqlite, ColumnType::Timestamp) => "TEXT",
        }
    }
}

/// Schema-qualified, quoted table name.
#[must_use]
pub fn qualified_table(schema: Option<&str>, table: &TableSpec) -> String {
    match schema {
        Some(schema) => format!(
            "{}.{}",
            quote_identifier(schema),
            quote_identifier(table.name)
        ),
        None => quote_identifier(table.name).into_owned(),
    }
}

fn column_list<'a>(columns: impl Iterator<Item = &'a str>) -> String {
    columns
        .map(|c| quote_identifier(c).into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CREATE TABLE IF NOT EXISTS` with the table's key as primary key.
#[must_use]
pub fn create_table(dialect: Dialect, qualified: &str, table: &TableSpec) -> String {
    let mut sql = format!("CREATE TABLE IF NOT EXISTS {qualified} (");
    for column in table.columns {
        let _ = write!(
            sql,
            "{} {}",
            quote_identifier(column.name),
            dialect.column_type(column.ty)
        );
        if column.name == table.key {
            sql.push_str(" PRIMARY KEY");
        } else if column.ty == ColumnType::Timestamp {
            sql.push_str(" NOT NULL");
        }
        sql.push_str(", ");
    }
    sql.truncate(sql.len() - 2);
    sql.push(')');
    sql
}

/// Index backing the latest-row and time-window queries.
#[must_use]
pub fn create_timestamp_index(qualified: &str, table: &TableSpec) -> String {
    let index = format!("idx_{}_{}", table.name.to_lowercase(), table.timestamp);
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {qualified} ({})",
        quote_identifier(&index),
        quote_identifier(table.timestamp)
    )
}

/// `SELECT key FROM t WHERE key IN (...)` for `count` keys.
#[must_use]
pub fn key_lookup(dialect: Dialect, qualified: &str, table: &TableSpec, count: usize) -> String {
    let key = quote_identifier(table.key);
    let mut sql = String::with_capacity(64 + count * 6);
    let _ = write!(sql, "SELECT {key} FROM {qualified} WHERE {key} IN (");
    for n in 1..=count {
        if n > 1 {
            sql.push_str(", ");
        }
        dialect.push_placeholder(&mut sql, n);
    }
    sql.push(')');
    sql
}

/// Multi-row insert of `rows` rows with a conflict backstop on the key.
#[must_use]
pub fn multi_row_insert(dialect: Dialect, qualified: &str, table: &TableSpec, rows: usize) -> String {
    let width = table.columns.len();
    let header = format!(
        "INSERT INTO {qualified} ({}) VALUES ",
        column_list(table.column_names())
    );
    let mut sql = String::with_capacity(header.len() + rows * width * 6 + 48);
    sql.push_str(&header);

    let mut n = 0;
    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for col in 0..width {
            if col > 0 {
                sql.push_str(", ");
            }
            n += 1;
            dialect.push_placeholder(&mut sql, n);
        }
        sql.push(')');
    }
    let _ = write!(
        sql,
        " ON CONFLICT ({}) DO NOTHING",
        quote_identifier(table.key)
    );
    sql
}

fn push_filter(dialect: Dialect, sql: &mut String, filter_column: Option<&str>) {
    if let Some(column) = filter_column {
        let _ = write!(sql, " WHERE {} = ", quote_identifier(column));
        dialect.push_placeholder(sql, 1);
    }
}

/// Most recent row by timestamp. Ties break on key length then key, so
/// chain event ids (`digest` + `seq`) order by sequence number.
#[must_use]
pub fn latest_row(
    dialect: Dialect,
    qualified: &str,
    table: &TableSpec,
    columns: &[&str],
    filter_column: Option<&str>,
) -> String {
    let mut sql = format!(
        "SELECT {} FROM {qualified}",
        column_list(columns.iter().copied())
    );
    push_filter(dialect, &mut sql, filter_column);
    let key = quote_identifier(table.key);
    let _ = write!(
        sql,
        " ORDER BY {} DESC, LENGTH({key}) DESC, {key} DESC LIMIT 1",
        quote_identifier(table.timestamp)
    );
    sql
}

/// `COALESCE(SUM(c), 0)` for each column.
#[must_use]
pub fn column_sums(
    dialect: Dialect,
    qualified: &str,
    columns: &[&str],
    filter_column: Option<&str>,
) -> String {
    let sums = columns
        .iter()
        .map(|c| format!("COALESCE(SUM({}), 0)", quote_identifier(c)))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!("SELECT {sums} FROM {qualified}");
    push_filter(dialect, &mut sql, filter_column);
    sql
}

/// Count, sum, avg, min, max of `value_column` and first/last timestamp
/// inside `[$1, $2)`.
#[must_use]
pub fn window_stats(
    dialect: Dialect,
    qualified: &str,
    table: &TableSpec,
    value_column: &str,
) -> String {
    let v = quote_identifier(value_column);
    let ts = quote_identifier(table.timestamp);
    let mut sql = format!(
        "SELECT COUNT(*), SUM({v}), AVG({v}), MIN({v}), MAX({v}), MIN({ts}), MAX({ts}) \
         FROM {qualified} WHERE {ts} >= "
    );
    dialect.push_placeholder(&mut sql, 1);
    let _ = write!(sql, " AND {ts} < ");
    dialect.push_placeholder(&mut sql, 2);
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_types::row::{FEE_TOTAL, MOLE_FARM_DEPOSIT};

    fn ts() -> String {
        quote_identifier("timestamp").into_owned()
    }

    #[test]
    fn insert_placeholders_follow_column_order() {
        let sql = multi_row_insert(Dialect::Postgres, "\"Total_Fee_Value_From\"", &FEE_TOTAL, 2);
        assert_eq!(
            sql,
            format!(
                "INSERT INTO \"Total_Fee_Value_From\" (id, coin, fee_value, {}, transaction_hash, service) \
                 VALUES ($1, $2, $3, $4, $5, $6), ($7, $8, $9, $10, $11, $12) \
                 ON CONFLICT (id) DO NOTHING",
                ts()
            )
        );
    }

    #[test]
    fn sqlite_uses_numbered_question_marks() {
        let sql = key_lookup(Dialect::Sqlite, "t", &FEE_TOTAL, 3);
        assert_eq!(sql, "SELECT id FROM t WHERE id IN (?1, ?2, ?3)");
    }

    #[test]
    fn qualified_name_quotes_mixed_case() {
        assert_eq!(
            qualified_table(Some("public"), &FEE_TOTAL),
            "public.\"Total_Fee_Value_From\""
        );
        assert_eq!(qualified_table(None, &FEE_TOTAL), "\"Total_Fee_Value_From\"");
    }

    #[test]
    fn create_table_declares_key() {
        let sql = create_table(Dialect::Postgres, "t", &FEE_TOTAL);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS t (id TEXT PRIMARY KEY, "));
        assert!(sql.contains("fee_value DOUBLE PRECISION"));
        assert!(sql.contains(&format!("{} TIMESTAMP(3) NOT NULL", ts())));
        assert!(sql.ends_with("service TEXT)"));

        let sqlite = create_table(Dialect::Sqlite, "t", &FEE_TOTAL);
        assert!(sqlite.contains("fee_value REAL"));
        assert!(sqlite.contains(&format!("{} TEXT NOT NULL", ts())));
    }

    #[test]
    fn latest_row_filters_and_orders() {
        let sql = latest_row(
            Dialect::Postgres,
            "t",
            &MOLE_FARM_DEPOSIT,
            &["event_id", "transaction_hash"],
            Some("pool"),
        );
        assert_eq!(
            sql,
            format!(
                "SELECT event_id, transaction_hash FROM t WHERE pool = $1 \
                 ORDER BY {} DESC, LENGTH(event_id) DESC, event_id DESC LIMIT 1",
                ts()
            )
        );
    }

    #[test]
    fn sums_default_to_zero() {
        let sql = column_sums(Dialect::Sqlite, "t", &["accumulation_a", "accumulation_b"], None);
        assert_eq!(
            sql,
            "SELECT COALESCE(SUM(accumulation_a), 0), COALESCE(SUM(accumulation_b), 0) FROM t"
        );
    }

    #[test]
    fn window_is_half_open() {
        let sql = window_stats(Dialect::Postgres, "t", &FEE_TOTAL, "fee_value");
        assert!(sql.ends_with(&format!("WHERE {0} >= $1 AND {0} < $2", ts())));
        assert!(sql.starts_with("SELECT COUNT(*), SUM(fee_value)"));
    }
}
