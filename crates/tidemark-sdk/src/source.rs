//! Source connector contract.

use async_trait::async_trait;
use tidemark_types::errors::SourceError;
use tidemark_types::event::{EventCursor, RawEvent};
use tidemark_types::stream::StreamSpec;

use crate::validation::ValidationResult;

/// Where a fetch should start.
///
/// Timestamp-paginated sources read `from_ms`; cursor-paginated sources
/// read `cursor`. `None` in either means "from the beginning".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub from_ms: Option<i64>,
    pub cursor: Option<EventCursor>,
}

impl PageRequest {
    #[must_use]
    pub fn from_timestamp(from_ms: Option<i64>) -> Self {
        Self {
            from_ms,
            cursor: None,
        }
    }

    #[must_use]
    pub fn from_cursor(cursor: Option<EventCursor>) -> Self {
        Self {
            from_ms: None,
            cursor,
        }
    }
}

/// One bounded batch of source events, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub events: Vec<RawEvent>,
    /// Cursor to continue from; `None` when the source has nothing more.
    pub next_cursor: Option<EventCursor>,
    /// Raw records seen before any adapter-side filtering.
    pub scanned: usize,
}

impl Page {
    /// A page holding `events` with nothing filtered out.
    #[must_use]
    pub fn unfiltered(events: Vec<RawEvent>) -> Self {
        let scanned = events.len();
        Self {
            events,
            next_cursor: None,
            scanned,
        }
    }

    /// True when the source returned no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scanned == 0
    }

    /// Timestamp of the last event kept on this page.
    #[must_use]
    pub fn last_timestamp_ms(&self) -> Option<i64> {
        self.events.last().map(RawEvent::timestamp_ms)
    }
}

/// Fetches pages of raw events for planned streams.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn Source>`.
#[async_trait]
pub trait Source: Send + Sync {
    /// Short connector name for logs, e.g. `"source-analytics"`.
    fn name(&self) -> &str;

    /// Whether this source can serve `stream` at all.
    fn supports(&self, stream: &StreamSpec) -> bool;

    /// Fetch one page of events for `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Upstream`] for bad responses and
    /// [`SourceError::Unavailable`] when the source cannot be reached.
    async fn fetch_page(&self, stream: &StreamSpec, request: PageRequest)
        -> Result<Page, SourceError>;

    /// Probe connectivity and credentials.
    async fn validate(&self) -> ValidationResult {
        ValidationResult::not_implemented()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_types::event::FeeValueRecord;

    fn fee(id: &str, ts: i64) -> RawEvent {
        RawEvent::FeeValue(FeeValueRecord {
            distinct_event_id: id.into(),
            coin_symbol: None,
            value: None,
            timestamp: ts,
            transaction_hash: None,
            service: None,
        })
    }

    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn Source) {}
    }

    #[test]
    fn empty_means_nothing_scanned() {
        let filtered_out = Page {
            events: vec![],
            next_cursor: None,
            scanned: 50,
        };
        assert!(!filtered_out.is_empty());
        assert_eq!(filtered_out.last_timestamp_ms(), None);
        assert!(Page::default().is_empty());
    }

    #[test]
    fn last_timestamp_is_last_event() {
        let page = Page::unfiltered(vec![fee("a", 100), fee("b", 200)]);
        assert_eq!(page.scanned, 2);
        assert_eq!(page.last_timestamp_ms(), Some(200));
    }
}
