//! Watermark store trait definition.

use tidemark_types::stream::StreamKey;
use tidemark_types::watermark::Watermark;

use crate::error;

/// Key-value store of the last advanced point of every stream.
///
/// No caching across calls: every operation reads the backing store, so
/// streams running concurrently in one process observe each other's writes.
/// Implementations must be `Send + Sync` for use behind `Arc<dyn WatermarkStore>`.
pub trait WatermarkStore: Send + Sync {
    /// Read the watermark for `stream`.
    ///
    /// Returns `Ok(None)` when the stream has never advanced.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure
    /// or when the backing store is corrupt.
    fn get(&self, stream: &StreamKey) -> error::Result<Option<Watermark>>;

    /// Overwrite the watermark for `stream`. Durable once this returns.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn set(&self, stream: &StreamKey, watermark: Watermark) -> error::Result<()>;

    /// Every stored watermark, ordered by stream key.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn list(&self) -> error::Result<Vec<(StreamKey, Watermark)>>;

    /// Forget the watermark for `stream` so the next run starts from the
    /// beginning. Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn clear(&self, stream: &StreamKey) -> error::Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify the trait is object-safe (can be used as `dyn WatermarkStore`).
    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn WatermarkStore) {}
    }
}
