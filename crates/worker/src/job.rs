//! The weather probability job.
//!
//! Drives one weather result through its lifecycle:
//!
//! 1. load the record (`NotFound` if absent);
//! 2. `pending -> processing` (`Conflict` if the record is in any other
//!    state, so a second run of the same job cannot double-process);
//! 3. ask the probability source for the record's coordinates and date;
//! 4. `processing -> completed` with the payload, or
//!    `processing -> failed` with the error message.
//!
//! Exactly two writes reach the store per successful claim.

use riskcast_core::probabilities::ProbabilityPayload;
use riskcast_core::result_state::ResultStatus;
use riskcast_core::source::ProbabilitySource;
use riskcast_core::types::DbId;
use riskcast_db::models::weather_result::WeatherResult;

use crate::error::JobError;
use crate::store::ResultStore;

/// Computes probabilities for a weather result and records the outcome.
pub struct WeatherProbabilityJob<S, P> {
    store: S,
    source: P,
}

impl<S: ResultStore, P: ProbabilitySource> WeatherProbabilityJob<S, P> {
    pub fn new(store: S, source: P) -> Self {
        Self { store, source }
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    /// Run the job for `result_id`.
    ///
    /// On a source failure the record is marked `failed` before the error
    /// is returned.
    pub async fn run(&self, result_id: DbId) -> Result<ProbabilityPayload, JobError> {
        let row = self
            .store
            .load(result_id)
            .await?
            .ok_or(JobError::NotFound(result_id))?;
        let record = WeatherResult::try_from(row)?;

        if !record.status().can_transition_to(ResultStatus::Processing) {
            return Err(JobError::Conflict(format!(
                "Weather result {result_id} is {}, expected pending",
                record.status()
            )));
        }

        if !self.store.mark_processing(result_id).await? {
            return Err(JobError::Conflict(format!(
                "Weather result {result_id} was claimed by another job"
            )));
        }

        let query = record.query();
        tracing::info!(
            result_id,
            lat = query.latitude,
            lon = query.longitude,
            date = %query.date_string(),
            "Computing weather probabilities",
        );

        match self.source.fetch(&query).await {
            Ok(payload) => {
                if !self.store.complete(result_id, &payload.to_value()).await? {
                    return Err(JobError::Conflict(format!(
                        "Weather result {result_id} left processing before completion"
                    )));
                }
                tracing::info!(
                    result_id,
                    metrics = payload.probabilities.len(),
                    "Weather result completed",
                );
                Ok(payload)
            }
            Err(e) => {
                let message = e.to_string();
                if !self.store.fail(result_id, &message).await? {
                    return Err(JobError::Conflict(format!(
                        "Weather result {result_id} left processing before failure was recorded"
                    )));
                }
                tracing::warn!(
                    result_id,
                    domain = e.is_domain(),
                    error = %message,
                    "Weather result failed",
                );
                Err(JobError::Source(e))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use chrono::NaiveDate;
    use riskcast_core::probabilities::probabilities_for_chart;
    use riskcast_core::result_state::ResultState;
    use riskcast_core::source::script::ScriptSource;
    use riskcast_core::source::SourceError;
    use serde_json::json;

    use super::test_support::{JsonSource, MemoryStore, Write};
    use super::*;

    fn july_4th() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 4).unwrap()
    }

    fn stored_state(store: &MemoryStore, id: DbId) -> ResultState {
        WeatherResult::try_from(store.row(id)).unwrap().state
    }

    fn sh_script(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "#!/bin/sh").expect("write shebang");
        write!(file, "{body}").expect("write body");
        file.flush().expect("flush");
        file
    }

    fn sh_source(script: &tempfile::NamedTempFile) -> ScriptSource {
        ScriptSource::new(script.path().to_str().expect("path"))
            .with_interpreter("sh")
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn successful_source_completes_record() {
        let store = MemoryStore::with_pending(1, july_4th());
        let job = WeatherProbabilityJob::new(
            store,
            JsonSource::new(json!({"probabilities": {"hot_prob": 42.5}})),
        );

        let payload = job.run(1).await.unwrap();
        assert_eq!(payload.probabilities["hot_prob"], json!(42.5));

        let state = stored_state(&job.store, 1);
        let stored = state.payload().expect("completed payload");
        assert_eq!(stored.probabilities["hot_prob"], json!(42.5));
        assert_eq!(
            serde_json::Value::Object(probabilities_for_chart(&stored.probabilities)),
            json!({"Hot": 42.5})
        );
        assert_eq!(job.store.writes(), [Write::Processing(1), Write::Completed(1)]);
    }

    #[tokio::test]
    async fn source_receives_record_coordinates_and_date() {
        let job = WeatherProbabilityJob::new(
            MemoryStore::with_pending(3, july_4th()),
            JsonSource::new(json!({"probabilities": {}})),
        );
        job.run(3).await.unwrap();

        let queries = job.source().queries.lock().unwrap().clone();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].latitude, 40.7128);
        assert_eq!(queries[0].longitude, -74.006);
        assert_eq!(queries[0].date_string(), "2024-07-04");
    }

    #[tokio::test]
    async fn domain_error_fails_record() {
        let job = WeatherProbabilityJob::new(
            MemoryStore::with_pending(1, july_4th()),
            JsonSource::new(json!({"error": "model unavailable"})),
        );

        let err = job.run(1).await.unwrap_err();
        assert_matches!(&err, JobError::Source(SourceError::Domain(_)));
        assert!(!err.is_retryable());

        assert_matches!(
            stored_state(&job.store, 1),
            ResultState::Failed(msg) if msg.contains("model unavailable")
        );
        assert_matches!(
            job.store.writes().as_slice(),
            [Write::Processing(1), Write::Failed(1, _)]
        );
    }

    #[tokio::test]
    async fn silent_script_failure_fails_record() {
        let script = sh_script("exit 3\n");
        let job = WeatherProbabilityJob::new(
            MemoryStore::with_pending(5, july_4th()),
            sh_source(&script),
        );

        let err = job.run(5).await.unwrap_err();
        assert_matches!(err, JobError::Source(SourceError::EmptyOutput { exit_code: 3, .. }));
        assert_matches!(
            stored_state(&job.store, 5),
            ResultState::Failed(msg) if msg.contains("no output")
        );
    }

    #[tokio::test]
    async fn script_is_invoked_with_iso_date() {
        let script = sh_script(
            "[ \"$5\" = \"--date\" ] && [ \"$6\" = \"2024-07-04\" ] || exit 9\n\
             echo '{\"probabilities\": {\"cold_prob\": 5.0}}'\n",
        );
        let job = WeatherProbabilityJob::new(
            MemoryStore::with_pending(2, july_4th()),
            sh_source(&script),
        );

        let payload = job.run(2).await.unwrap();
        assert_eq!(payload.probabilities["cold_prob"], json!(5.0));
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let job = WeatherProbabilityJob::new(
            MemoryStore::default(),
            JsonSource::new(json!({"probabilities": {}})),
        );
        let err = job.run(99).await.unwrap_err();
        assert_matches!(err, JobError::NotFound(99));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn second_run_conflicts_without_writes() {
        let job = WeatherProbabilityJob::new(
            MemoryStore::with_pending(1, july_4th()),
            JsonSource::new(json!({"probabilities": {"hot_prob": 1}})),
        );
        job.run(1).await.unwrap();

        let err = job.run(1).await.unwrap_err();
        assert_matches!(err, JobError::Conflict(msg) if msg.contains("completed"));
        assert_eq!(job.store.writes().len(), 2);
        assert_eq!(job.source().queries.lock().unwrap().len(), 1);
    }
}
