//! Incremental sync engine for tidemark.
//!
//! Streams are planned from pipeline config, drained page by page through
//! normalize and dedup-insert, and resumed from per-stream watermarks.

pub mod accumulate;
pub mod config;
pub mod dedup;
pub mod driver;
pub(crate) mod errors;
pub mod fees;
pub mod normalize;
pub mod orchestrator;
pub mod plan;
pub mod resolve;
pub mod result;
pub mod sync_loop;

// Re-export public API for convenience
pub use driver::Driver;
pub use fees::{daily_fee_summary, DailyFees, UtcDay};
pub use orchestrator::{capture_pool_snapshot, check_pipeline, run_pipeline, RunOptions};
pub use resolve::{open_state, open_warehouse};
pub use result::{CheckResult, RunReport, StreamReport, StreamSummary};
pub use sync_loop::StreamSync;
