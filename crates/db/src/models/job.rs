//! Job rows for the background queue.

use riskcast_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::StatusId;

/// `job_type` of the job that computes probabilities for one weather result.
pub const WEATHER_PROBABILITY_JOB: &str = "weather_probability";

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: DbId,
    pub job_type: String,
    pub status_id: StatusId,
    pub parameters: serde_json::Value,
    pub error_message: Option<String>,
    pub submitted_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Parameters of a [`WEATHER_PROBABILITY_JOB`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherProbabilityParams {
    pub result_id: DbId,
}

impl Job {
    /// Decode the parameters of a weather probability job.
    pub fn weather_probability_params(&self) -> Result<WeatherProbabilityParams, serde_json::Error> {
        serde_json::from_value(self.parameters.clone())
    }
}
