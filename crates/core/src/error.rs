//! Domain errors shared by every crate. The API maps each variant to an
//! HTTP status in `riskcast_api::error`.

use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// No row with this id, e.g. `WeatherResult` 42.
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The operation does not apply to the record's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored row violates an invariant the schema should have enforced.
    #[error("Internal error: {0}")]
    Internal(String),
}
