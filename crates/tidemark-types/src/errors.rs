//! Error taxonomy shared by sources, destinations and the sync engine.
//!
//! [`SyncError::is_retryable`] drives the per-stream retry decision.

use crate::stream::StreamKind;

/// Failure fetching a page from a source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source answered, but with a non-success status or a body that
    /// could not be decoded.
    #[error("upstream error: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
        /// Raw response payload, kept for operator-facing logs.
        body: Option<String>,
    },

    /// The source could not be reached, after `attempts` tries.
    #[error("source unavailable after {attempts} attempt(s): {message}")]
    Unavailable { attempts: u32, message: String },
}

impl SourceError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            status: None,
            message: message.into(),
            body: None,
        }
    }

    pub fn upstream_status(status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            status: Some(status),
            message: format!("HTTP {status}"),
            body: Some(body.into()),
        }
    }

    pub fn unavailable(attempts: u32, message: impl Into<String>) -> Self {
        Self::Unavailable {
            attempts,
            message: message.into(),
        }
    }

    /// The upstream response body, when one was captured.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::Upstream { body, .. } => body.as_deref(),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Warehouse read, write or DDL failure.
#[derive(Debug, thiserror::Error)]
#[error("destination {operation} on {table} failed: {message}")]
pub struct DestinationError {
    pub operation: &'static str,
    pub table: String,
    pub message: String,
}

impl DestinationError {
    pub fn new(operation: &'static str, table: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation,
            table: table.into(),
            message: message.into(),
        }
    }
}

/// A raw event whose shape does not belong to the stream it arrived on.
#[derive(Debug, thiserror::Error)]
#[error("stream kind {kind} cannot normalize a {shape} event")]
pub struct NormalizeError {
    pub kind: StreamKind,
    pub shape: &'static str,
}

/// Everything that can stop one stream drain.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Destination(#[from] DestinationError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// Watermark store write failure.
    #[error("watermark store error: {0}")]
    State(String),

    /// The stream is misconfigured; retrying cannot help.
    #[error("config error: {0}")]
    Config(String),
}

impl SyncError {
    /// Whether another attempt of the whole stream drain may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Source(_) | Self::Destination(_) | Self::State(_) => true,
            Self::Normalize(_) | Self::Config(_) => false,
        }
    }

    /// Upstream payload for failure logs, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::Source(e) => e.payload(),
            _ => None,
        }
    }
}
