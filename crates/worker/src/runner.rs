//! Job runner.
//!
//! Polls the `jobs` table every `poll_interval`, claims one queued job per
//! tick with `SELECT FOR UPDATE SKIP LOCKED` via [`JobRepo::claim_next`],
//! runs it, and records the outcome on the job row. Many runners may share
//! one queue.
//!
//! Claims left `running` by a runner that died are swept every
//! [`SWEEP_INTERVAL`]: see [`JobRunner::recover_stale`].

use std::time::Duration;

use riskcast_core::result_state::ResultStatus;
use riskcast_core::source::script::DEFAULT_TIMEOUT;
use riskcast_core::types::DbId;
use riskcast_db::models::job::{Job, WEATHER_PROBABILITY_JOB};
use riskcast_db::models::weather_result::WeatherResult;
use riskcast_db::repositories::{JobRepo, WeatherResultRepo};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::config::STALE_MARGIN;
use crate::job::WeatherProbabilityJob;
use crate::source::ConfiguredSource;

/// How often the runner looks for abandoned claims.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Long-lived task that executes queued weather probability jobs.
pub struct JobRunner {
    pool: PgPool,
    job: WeatherProbabilityJob<PgPool, ConfiguredSource>,
    poll_interval: Duration,
    stale_after: Duration,
}

impl JobRunner {
    pub fn new(pool: PgPool, source: ConfiguredSource, poll_interval: Duration) -> Self {
        Self {
            job: WeatherProbabilityJob::new(pool.clone(), source),
            pool,
            poll_interval,
            stale_after: DEFAULT_TIMEOUT + STALE_MARGIN,
        }
    }

    /// Treat `running` jobs claimed longer ago than `stale_after` as abandoned.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Run the polling loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            stale_after_secs = self.stale_after.as_secs(),
            source = self.job.source().name(),
            "Job runner started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job runner shutting down");
                    break;
                }
                _ = sweep.tick() => {
                    if let Err(e) = self.recover_stale().await {
                        tracing::error!(error = %e, "Stale job sweep failed");
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Job poll cycle failed");
                    }
                }
            }
        }
    }

    /// Claim and execute at most one job.
    ///
    /// Returns `true` if a job was claimed.
    pub async fn run_once(&self) -> Result<bool, sqlx::Error> {
        let Some(job) = JobRepo::claim_next(&self.pool).await? else {
            return Ok(false);
        };

        tracing::info!(job_id = job.id, job_type = %job.job_type, "Job claimed");

        let recorded = match self.execute(&job).await {
            Ok(()) => {
                let recorded = JobRepo::complete(&self.pool, job.id).await?;
                if recorded {
                    tracing::info!(job_id = job.id, "Job completed");
                }
                recorded
            }
            Err(message) => JobRepo::fail(&self.pool, job.id, &message).await?,
        };
        if !recorded {
            tracing::warn!(job_id = job.id, "Job was taken over by a stale-claim sweep");
        }
        Ok(true)
    }

    /// Fail jobs whose claim outlived `stale_after` and settle their records.
    ///
    /// A `processing` record is marked `failed`, so it can be retried. A
    /// record that never left `pending` gets a fresh job. Returns the number
    /// of jobs taken over.
    pub async fn recover_stale(&self) -> Result<usize, sqlx::Error> {
        let message = format!(
            "Job abandoned: no outcome recorded within {}s of being claimed",
            self.stale_after.as_secs()
        );
        let stale = JobRepo::fail_stale(&self.pool, self.stale_after, &message).await?;

        for job in &stale {
            tracing::warn!(job_id = job.id, claimed_at = ?job.claimed_at, "Stale job failed");
            match job.weather_probability_params() {
                Ok(params) => self.settle_abandoned(params.result_id, &message).await?,
                Err(e) => {
                    tracing::error!(job_id = job.id, error = %e, "Stale job has invalid parameters");
                }
            }
        }
        Ok(stale.len())
    }

    async fn settle_abandoned(&self, result_id: DbId, message: &str) -> Result<(), sqlx::Error> {
        let Some(row) = WeatherResultRepo::find_by_id(&self.pool, result_id).await? else {
            return Ok(());
        };
        let status = match WeatherResult::try_from(row) {
            Ok(record) => record.status(),
            Err(e) => {
                tracing::error!(result_id, error = %e, "Abandoned weather result is unreadable");
                return Ok(());
            }
        };

        match status {
            ResultStatus::Processing => {
                if WeatherResultRepo::fail(&self.pool, result_id, message).await? {
                    tracing::warn!(result_id, "Abandoned weather result failed");
                }
            }
            ResultStatus::Pending => {
                let job = JobRepo::enqueue_weather_probability(&self.pool, result_id).await?;
                tracing::info!(result_id, job_id = job.id, "Abandoned weather result requeued");
            }
            ResultStatus::Completed | ResultStatus::Failed => {}
        }
        Ok(())
    }

    /// Run `job`, returning the message to store on the job row on failure.
    async fn execute(&self, job: &Job) -> Result<(), String> {
        if job.job_type != WEATHER_PROBABILITY_JOB {
            tracing::error!(job_id = job.id, job_type = %job.job_type, "Unknown job type");
            return Err(format!("Unknown job type: {}", job.job_type));
        }

        let params = job.weather_probability_params().map_err(|e| {
            tracing::error!(job_id = job.id, error = %e, "Invalid job parameters");
            format!("Invalid job parameters: {e}")
        })?;

        self.job.run(params.result_id).await.map(|_| ()).map_err(|e| {
            tracing::error!(
                job_id = job.id,
                result_id = params.result_id,
                retryable = e.is_retryable(),
                error = %e,
                "Job failed",
            );
            e.to_string()
        })
    }
}
