//! Persistence seam for the weather probability job.
//!
//! The job only needs to load a record and apply the three conditional
//! transitions; [`ResultStore`] names exactly that. `PgPool` implements it
//! through [`WeatherResultRepo`].

use std::future::Future;

use riskcast_core::types::DbId;
use riskcast_db::models::weather_result::WeatherResultRow;
use riskcast_db::repositories::WeatherResultRepo;
use sqlx::PgPool;

/// Storage operations used by [`crate::job::WeatherProbabilityJob`].
///
/// Each transition returns `false` when the record was not in the expected
/// source state.
pub trait ResultStore: Send + Sync {
    fn load(
        &self,
        id: DbId,
    ) -> impl Future<Output = Result<Option<WeatherResultRow>, sqlx::Error>> + Send;

    /// `pending -> processing`.
    fn mark_processing(&self, id: DbId) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// `processing -> completed`.
    fn complete(
        &self,
        id: DbId,
        payload: &serde_json::Value,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// `processing -> failed`.
    fn fail(&self, id: DbId, message: &str) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

impl ResultStore for PgPool {
    async fn load(&self, id: DbId) -> Result<Option<WeatherResultRow>, sqlx::Error> {
        WeatherResultRepo::find_by_id(self, id).await
    }

    async fn mark_processing(&self, id: DbId) -> Result<bool, sqlx::Error> {
        WeatherResultRepo::mark_processing(self, id).await
    }

    async fn complete(&self, id: DbId, payload: &serde_json::Value) -> Result<bool, sqlx::Error> {
        WeatherResultRepo::complete(self, id, payload).await
    }

    async fn fail(&self, id: DbId, message: &str) -> Result<bool, sqlx::Error> {
        WeatherResultRepo::fail(self, id, message).await
    }
}
