use riskcast_core::error::CoreError;
use riskcast_core::source::SourceError;
use riskcast_core::types::DbId;

/// Why a weather probability job did not complete its record.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Weather result {0} not found")]
    NotFound(DbId),

    /// The record was not in the state the job expected (already claimed,
    /// already terminal).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The stored record violates its own invariants.
    #[error("Invalid weather result: {0}")]
    Record(#[from] CoreError),

    /// The probability source failed. The message has already been stored
    /// on the record.
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),
}

impl JobError {
    /// Whether running the job again could succeed.
    ///
    /// Missing or already-claimed records and model-reported errors will
    /// fail the same way on a second run.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::Conflict(_) | Self::Record(_) => false,
            Self::Source(e) => !e.is_domain(),
            Self::Store(_) => true,
        }
    }
}
