//! Connectivity check results reported by `tidemark check`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Success,
    Failed,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub message: String,
}

impl ValidationResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Success,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Failed,
            message: message.into(),
        }
    }

    /// Used by connectors that have nothing to probe.
    #[must_use]
    pub fn not_implemented() -> Self {
        Self {
            status: ValidationStatus::Warning,
            message: "Validation not implemented".to_string(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ValidationStatus::Success
    }
}
