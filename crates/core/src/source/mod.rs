//! Probability sources.
//!
//! A [`ProbabilitySource`] turns a [`WeatherQuery`] into a
//! [`ProbabilityPayload`]. Two implementations exist:
//!
//! - [`script::ScriptSource`] runs an external script with
//!   `--lat <float> --lon <float> --date <YYYY-MM-DD>` and reads one JSON
//!   document from its output.
//! - [`synthetic::SyntheticSource`] computes deterministic synthetic
//!   probabilities in-process.
//!
//! Failures are reported as [`SourceError`]. A model that ran and reported
//! an `error` field is a [`SourceError::Domain`]; everything else means the
//! source could not produce a result at all.

pub mod script;
pub mod synthetic;

use std::future::Future;

use chrono::{Datelike, NaiveDate};
use serde_json::Value;

use crate::probabilities::{json_kind, PayloadShapeError, ProbabilityPayload};
use crate::submission::DATE_FORMAT;

/// Key a model uses to report a modeling failure.
pub const ERROR_KEY: &str = "error";

/// Coordinates and date to compute probabilities for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub date: NaiveDate,
}

impl WeatherQuery {
    /// The canonical `YYYY-MM-DD` form passed to external scripts.
    pub fn date_string(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    pub fn day_of_year(&self) -> u32 {
        self.date.ordinal()
    }
}

/// Why a source produced no usable payload.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to start probability script: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Probability script timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Probability script produced no output (exit code {exit_code}){}", stderr_suffix(.stderr))]
    EmptyOutput { exit_code: i32, stderr: String },

    #[error("Probability script returned malformed output: {0}")]
    Malformed(String),

    #[error("Probability model reported an error: {0}")]
    Domain(String),
}

impl SourceError {
    /// `true` when the model ran and reported its own error, as opposed to
    /// the source failing to run or to produce parseable output.
    pub fn is_domain(&self) -> bool {
        matches!(self, Self::Domain(_))
    }
}

/// Longest stderr excerpt carried in an error message.
const STDERR_EXCERPT_CHARS: usize = 500;

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", excerpt(trimmed, STDERR_EXCERPT_CHARS))
    }
}

/// Truncate `text` to at most `max_chars` characters, marking the cut.
pub(crate) fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

/// Anything that can compute probabilities for a query.
pub trait ProbabilitySource: Send + Sync {
    /// Compute the probability payload for `query`.
    fn fetch(
        &self,
        query: &WeatherQuery,
    ) -> impl Future<Output = Result<ProbabilityPayload, SourceError>> + Send;
}

/// Classify a JSON document returned by a source.
///
/// - a non-object is malformed;
/// - a non-null `error` key is a domain error;
/// - otherwise a `probabilities` object is required.
pub fn payload_from_json(document: Value) -> Result<ProbabilityPayload, SourceError> {
    let Value::Object(object) = &document else {
        return Err(SourceError::Malformed(format!(
            "expected a JSON object, got {}",
            json_kind(&document)
        )));
    };

    match object.get(ERROR_KEY) {
        None | Some(Value::Null) => {}
        Some(Value::String(message)) => return Err(SourceError::Domain(message.clone())),
        Some(other) => return Err(SourceError::Domain(other.to_string())),
    }

    ProbabilityPayload::from_stored(document).map_err(|e| match e {
        PayloadShapeError::NotAnObject(kind) => {
            SourceError::Malformed(format!("expected a JSON object, got {kind}"))
        }
        PayloadShapeError::MissingProbabilities => SourceError::Malformed(e.to_string()),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
