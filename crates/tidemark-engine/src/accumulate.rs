//! Running totals for chain streams.
//!
//! Seeded from what the warehouse already holds for the stream, then
//! advanced over newly inserted rows only, in event order.

use tidemark_sdk::warehouse::{ColumnFilter, Warehouse};
use tidemark_types::errors::DestinationError;
use tidemark_types::row::CanonicalRow;
use tidemark_types::stream::{Scope, StreamSpec};

const ASSET_CHANGE: [&str; 1] = ["asset_change"];
const PAIR_CHANGES: [&str; 2] = ["asset_change_a", "asset_change_b"];

/// Running sum of one stream's asset changes (two sides for pair flows).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Accumulator {
    a: f64,
    b: f64,
}

impl Accumulator {
    #[must_use]
    pub fn new(a: f64, b: f64) -> Self {
        Self { a, b }
    }

    /// Start from the stream's stored total: the sum of its `asset_change`
    /// columns, restricted to the stream's pool for pool-scoped streams.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError`] if the sum query fails.
    pub async fn seed(
        warehouse: &dyn Warehouse,
        stream: &StreamSpec,
    ) -> Result<Self, DestinationError> {
        let table = stream.table();
        let sums = match (stream.kind.scope(), stream.pool.as_deref()) {
            (Scope::Pool, Some(pool)) => {
                let filter = ColumnFilter::new("pool", pool);
                warehouse
                    .column_sums(table, &PAIR_CHANGES, Some(&filter))
                    .await?
            }
            _ => warehouse.column_sums(table, &ASSET_CHANGE, None).await?,
        };
        let seed = Self::new(
            sums.first().copied().unwrap_or(0.0),
            sums.get(1).copied().unwrap_or(0.0),
        );
        tracing::debug!(stream = %stream, a = seed.a, b = seed.b, "Accumulator seeded");
        Ok(seed)
    }

    #[must_use]
    pub fn totals(&self) -> (f64, f64) {
        (self.a, self.b)
    }

    /// Advance over `rows` in order, writing each row's running total.
    /// Rows without accumulation columns pass through untouched.
    pub fn apply(&mut self, rows: &mut [CanonicalRow]) {
        for row in rows {
            match row {
                CanonicalRow::AssetFlow(flow) => {
                    self.a += flow.asset_change;
                    flow.accumulation = self.a;
                }
                CanonicalRow::PairFlow(flow) => {
                    self.a += flow.asset_change_a;
                    self.b += flow.asset_change_b;
                    flow.accumulation_a = self.a;
                    flow.accumulation_b = self.b;
                }
                _ => {}
            }
        }
    }
}
