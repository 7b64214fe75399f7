//! Watermark store error types.

use std::path::PathBuf;

use tidemark_types::watermark::TimestampError;

/// Errors produced by [`WatermarkStore`](crate::WatermarkStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The YAML document could not be serialized.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The backing document exists but cannot be parsed.
    #[error("watermark document {} is corrupt: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },

    /// A stored watermark is not a recognizable timestamp.
    #[error("invalid stored watermark: {0}")]
    InvalidTimestamp(#[from] TimestampError),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("watermark store lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_error_displays_context() {
        let inner = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some("table not found".into()),
        );
        let err = StateError::Sqlite(inner);
        let msg = err.to_string();
        assert!(msg.contains("sqlite"), "got: {msg}");
    }

    #[test]
    fn lock_poisoned_displays() {
        let err = StateError::LockPoisoned;
        assert_eq!(err.to_string(), "watermark store lock poisoned");
    }

    #[test]
    fn corrupt_names_the_file() {
        let err = StateError::Corrupt {
            path: PathBuf::from("/tmp/state.yaml"),
            message: "did not find expected key".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/state.yaml"));
        assert!(msg.contains("did not find expected key"));
    }
}
