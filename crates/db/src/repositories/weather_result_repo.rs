//! Repository for the `weather_results` table.
//!
//! Status transitions are conditional updates: each one names the status it
//! expects to leave, and reports `false` when the row was not in it.

use riskcast_core::submission::NewWeatherResult;
use riskcast_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::job::Job;
use crate::models::status::WeatherResultStatus;
use crate::models::weather_result::{ResultListQuery, WeatherResultRow};
use crate::repositories::JobRepo;

/// Column list for `weather_results` queries.
const COLUMNS: &str = "\
    id, latitude, longitude, query_date, day_of_year, status_id, \
    result, error_message, created_at, updated_at";

/// Maximum page size for result listing.
pub const MAX_LIMIT: i64 = 100;

/// Default page size for result listing.
pub const DEFAULT_LIMIT: i64 = 50;

/// Provides persistence for weather results.
pub struct WeatherResultRepo;

impl WeatherResultRepo {
    /// Insert a new `pending` record.
    pub async fn create(
        pool: &PgPool,
        input: &NewWeatherResult,
    ) -> Result<WeatherResultRow, sqlx::Error> {
        Self::insert(pool, input).await
    }

    /// Insert a new `pending` record and queue its probability job in one
    /// transaction.
    pub async fn create_and_enqueue(
        pool: &PgPool,
        input: &NewWeatherResult,
    ) -> Result<(WeatherResultRow, Job), sqlx::Error> {
        let mut tx = pool.begin().await?;
        let record = Self::insert(&mut *tx, input).await?;
        let job = JobRepo::enqueue_weather_probability(&mut *tx, record.id).await?;
        tx.commit().await?;

        tracing::debug!(result_id = record.id, job_id = job.id, "Weather result queued");
        Ok((record, job))
    }

    async fn insert<'e>(
        executor: impl PgExecutor<'e>,
        input: &NewWeatherResult,
    ) -> Result<WeatherResultRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO weather_results (latitude, longitude, query_date, day_of_year, status_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WeatherResultRow>(&query)
            .bind(input.latitude)
            .bind(input.longitude)
            .bind(input.query_date)
            .bind(input.day_of_year)
            .bind(WeatherResultStatus::Pending.id())
            .fetch_one(executor)
            .await
    }

    /// Find a record by its ID.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<WeatherResultRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM weather_results WHERE id = $1");
        sqlx::query_as::<_, WeatherResultRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List records newest first.
    pub async fn list(
        pool: &PgPool,
        params: &ResultListQuery,
    ) -> Result<Vec<WeatherResultRow>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);

        let query = format!(
            "SELECT {COLUMNS} FROM weather_results \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, WeatherResultRow>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Move a record from `pending` to `processing`.
    ///
    /// Returns `false` if the record does not exist or is not `pending`.
    pub async fn mark_processing(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE weather_results SET status_id = $2 \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(WeatherResultStatus::Processing.id())
        .bind(WeatherResultStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a record from `processing` to `completed`, storing its payload.
    ///
    /// The payload is bound as text into a `JSON` column so the key order
    /// the source produced survives storage.
    ///
    /// Returns `false` if the record is not `processing`.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        payload: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE weather_results SET status_id = $2, result = $3::json \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(WeatherResultStatus::Completed.id())
        .bind(payload.to_string())
        .bind(WeatherResultStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Move a record from `processing` to `failed`, storing the error message.
    ///
    /// Returns `false` if the record is not `processing`.
    pub async fn fail(pool: &PgPool, id: DbId, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE weather_results SET status_id = $2, error_message = $3 \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(WeatherResultStatus::Failed.id())
        .bind(error)
        .bind(WeatherResultStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
