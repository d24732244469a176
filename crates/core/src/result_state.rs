//! Lifecycle of a weather result record.
//!
//! A record's status, payload, and error message are stored as separate
//! columns, but in Rust they are a single tagged variant: a completed record
//! always carries its payload and a failed record always carries its message.
//! [`ResultState::from_parts`] is the only way to rebuild a state from
//! columns and rejects any inconsistent combination.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::probabilities::ProbabilityPayload;

/// Plain status discriminant, used for storage and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ResultStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether moving from `self` to `next` follows
    /// `pending -> processing -> {completed | failed}`.
    pub fn can_transition_to(self, next: ResultStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status plus the data that only exists in that status.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultState {
    Pending,
    Processing,
    Completed(ProbabilityPayload),
    Failed(String),
}

impl ResultState {
    pub fn status(&self) -> ResultStatus {
        match self {
            Self::Pending => ResultStatus::Pending,
            Self::Processing => ResultStatus::Processing,
            Self::Completed(_) => ResultStatus::Completed,
            Self::Failed(_) => ResultStatus::Failed,
        }
    }

    pub fn payload(&self) -> Option<&ProbabilityPayload> {
        match self {
            Self::Completed(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Rebuild a state from stored columns.
    ///
    /// Fails with [`CoreError::Internal`] when the payload/error columns do not
    /// match the status (e.g. `completed` without a payload).
    pub fn from_parts(
        status: ResultStatus,
        payload: Option<Value>,
        error_message: Option<String>,
    ) -> Result<Self, CoreError> {
        match (status, payload, error_message) {
            (ResultStatus::Pending, None, None) => Ok(Self::Pending),
            (ResultStatus::Processing, None, None) => Ok(Self::Processing),
            (ResultStatus::Completed, Some(payload), None) => {
                let payload = ProbabilityPayload::from_stored(payload).map_err(|e| {
                    CoreError::Internal(format!("Stored payload is not a probability payload: {e}"))
                })?;
                Ok(Self::Completed(payload))
            }
            (ResultStatus::Failed, None, Some(message)) => Ok(Self::Failed(message)),
            (status, payload, error) => Err(CoreError::Internal(format!(
                "Inconsistent result record: status {status} with payload {} and error {}",
                if payload.is_some() { "present" } else { "absent" },
                if error.is_some() { "present" } else { "absent" },
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
