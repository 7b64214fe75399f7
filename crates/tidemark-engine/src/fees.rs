//! Daily fee summaries over `Total_Fee_Value_From`.

use chrono::{DateTime, Days, NaiveTime, Utc};
use serde::Serialize;

use tidemark_sdk::warehouse::Warehouse;
use tidemark_types::errors::DestinationError;
use tidemark_types::row::FEE_TOTAL;

const MS_PER_DAY: i64 = 86_400_000;

/// One UTC day, as a half-open `[start_ms, end_ms)` range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtcDay {
    /// `YYYY-MM-DD`.
    pub date: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl UtcDay {
    /// The UTC day containing `timestamp_ms`, or `None` if it is out of
    /// the representable range.
    #[must_use]
    pub fn containing(timestamp_ms: i64) -> Option<Self> {
        let instant = DateTime::<Utc>::from_timestamp_millis(timestamp_ms)?;
        let date = instant.date_naive();
        let start = date.and_time(NaiveTime::MIN).and_utc().timestamp_millis();
        let end = date
            .checked_add_days(Days::new(1))
            .map_or(start + MS_PER_DAY, |next| {
                next.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
            });
        Some(Self {
            date: date.format("%Y-%m-%d").to_string(),
            start_ms: start,
            end_ms: end,
        })
    }
}

/// Aggregates of one day's fee rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyFees {
    pub date: String,
    pub total_records: i64,
    pub total_fee_value: Option<f64>,
    pub average_fee_value: Option<f64>,
    pub min_fee_value: Option<f64>,
    pub max_fee_value: Option<f64>,
    pub first_record_time_ms: Option<i64>,
    pub last_record_time_ms: Option<i64>,
}

/// Summarize the fee rows of `day`. `None` when the day has no rows.
///
/// # Errors
///
/// Returns [`DestinationError`] if the aggregate query fails.
pub async fn daily_fee_summary(
    warehouse: &dyn Warehouse,
    day: &UtcDay,
) -> Result<Option<DailyFees>, DestinationError> {
    let stats = warehouse
        .window_stats(&FEE_TOTAL, "fee_value", day.start_ms, day.end_ms)
        .await?;
    if stats.count == 0 {
        return Ok(None);
    }
    Ok(Some(DailyFees {
        date: day.date.clone(),
        total_records: stats.count,
        total_fee_value: stats.sum,
        average_fee_value: stats.avg,
        min_fee_value: stats.min,
        max_fee_value: stats.max,
        first_record_time_ms: stats.first_ms,
        last_record_time_ms: stats.last_ms,
    }))
}
