//! Convenience re-exports for connector authors.
//!
//! ```ignore
//! use tidemark_sdk::prelude::*;
//! ```

// Connector traits
pub use crate::source::{Page, PageRequest, Source};
pub use crate::warehouse::{ColumnFilter, Warehouse, WarehouseSession, WindowStats};

// Validation
pub use crate::validation::{ValidationResult, ValidationStatus};

// SQL helpers
pub use crate::sql::Dialect;

// Data model
pub use tidemark_types::errors::{DestinationError, SourceError};
pub use tidemark_types::event::{EventCursor, RawEvent};
pub use tidemark_types::row::{CanonicalRow, ColumnType, SqlValue, TableSpec};
pub use tidemark_types::stream::{StreamKind, StreamSpec};
