//! Repository for the `jobs` table.
//!
//! Uses `JobStatus` from `models::status` for every transition. There is no
//! automatic retry: a failed job stays failed.

use std::time::Duration;

use riskcast_core::types::DbId;
use serde_json::json;
use sqlx::{PgExecutor, PgPool};

use crate::models::job::{Job, WEATHER_PROBABILITY_JOB};
use crate::models::status::JobStatus;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, job_type, status_id, parameters, error_message, \
    submitted_at, claimed_at, completed_at, created_at, updated_at";

/// Provides queue operations for background jobs.
pub struct JobRepo;

impl JobRepo {
    /// Queue a probability job for `result_id`.
    ///
    /// Accepts any executor so callers can enqueue inside the transaction
    /// that created the record.
    pub async fn enqueue_weather_probability<'e>(
        executor: impl PgExecutor<'e>,
        result_id: DbId,
    ) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (job_type, status_id, parameters) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(WEATHER_PROBABILITY_JOB)
            .bind(JobStatus::Queued.id())
            .bind(json!({ "result_id": result_id }))
            .fetch_one(executor)
            .await
    }

    /// Atomically claim the oldest queued job.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent runners never
    /// claim the same job.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET claimed_at = NOW(), status_id = $1 \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE status_id = $2 \
                 ORDER BY submitted_at ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Running.id())
            .bind(JobStatus::Queued.id())
            .fetch_optional(pool)
            .await
    }

    /// Mark a running job as completed.
    ///
    /// Returns `false` if the job is no longer `running` (for example a
    /// stale-claim sweep already failed it).
    pub async fn complete(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET status_id = $2, completed_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(job_id)
        .bind(JobStatus::Completed.id())
        .bind(JobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a running job as failed with an error message.
    ///
    /// Returns `false` if the job is no longer `running`.
    pub async fn fail(pool: &PgPool, job_id: DbId, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status_id = $2, error_message = $3, completed_at = NOW() \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.id())
        .bind(error)
        .bind(JobStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fail every `running` job claimed more than `older_than` ago.
    ///
    /// A runner that crashed or lost its connection mid-job leaves its claim
    /// behind; the returned jobs are the ones this call took over.
    pub async fn fail_stale(
        pool: &PgPool,
        older_than: Duration,
        error: &str,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status_id = $1, error_message = $2, completed_at = NOW() \
             WHERE status_id = $3 AND claimed_at < NOW() - make_interval(secs => $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(JobStatus::Failed.id())
            .bind(error)
            .bind(JobStatus::Running.id())
            .bind(older_than.as_secs_f64())
            .fetch_all(pool)
            .await
    }

    /// Number of jobs waiting to be claimed.
    pub async fn count_queued(pool: &PgPool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status_id = $1")
            .bind(JobStatus::Queued.id())
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All jobs queued for a weather result, oldest first.
    pub async fn list_for_result(
        pool: &PgPool,
        result_id: DbId,
    ) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE job_type = $1 AND (parameters->>'result_id')::BIGINT = $2 \
             ORDER BY submitted_at ASC, id ASC"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(WEATHER_PROBABILITY_JOB)
            .bind(result_id)
            .fetch_all(pool)
            .await
    }
}
