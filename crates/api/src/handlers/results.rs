//! Handlers for the `/results` resource.
//!
//! Submissions are validated, stored as `pending`, and queued for the job
//! runner in one transaction. Completed results can be exported as CSV.

use axum::extract::{Path, Query, State};
use axum::http::header::{ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use riskcast_core::error::CoreError;
use riskcast_core::probabilities::chart_to_csv;
use riskcast_core::result_state::ResultStatus;
use riskcast_core::submission::{parse_submission, NewWeatherResult, ResultSubmission, DATE_FORMAT};
use riskcast_core::types::{DbId, Timestamp};
use riskcast_db::models::weather_result::{ResultListQuery, WeatherResult, WeatherResultRow};
use riskcast_db::repositories::WeatherResultRepo;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};
use crate::form::ResultForm;
use crate::response::DataResponse;
use crate::state::AppState;

const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A weather result as returned by the API.
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub id: DbId,
    pub latitude: f64,
    pub longitude: f64,
    pub date: String,
    pub day_of_year: i16,
    pub status: ResultStatus,
    /// The stored payload, present once completed.
    pub result: Option<Value>,
    /// Present once failed.
    pub error_message: Option<String>,
    /// `label -> percentage`, present once completed.
    pub probabilities_for_chart: Option<Map<String, Value>>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<&WeatherResult> for ResultResponse {
    fn from(record: &WeatherResult) -> Self {
        let payload = record.state.payload();
        Self {
            id: record.id,
            latitude: record.latitude,
            longitude: record.longitude,
            date: record.query_date.format(DATE_FORMAT).to_string(),
            day_of_year: record.day_of_year,
            status: record.status(),
            result: payload.map(|p| p.to_value()),
            error_message: record.state.error_message().map(str::to_string),
            probabilities_for_chart: payload.map(|p| p.chart()),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Query parameters for `GET /api/v1/results/{id}`.
#[derive(Debug, Default, Deserialize)]
pub struct ShowParams {
    /// `json` or `csv`; overrides the `Accept` header.
    pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Csv,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_result(pool: &sqlx::PgPool, id: DbId) -> AppResult<WeatherResult> {
    let row = WeatherResultRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "WeatherResult",
            id,
        }))?;
    Ok(WeatherResult::try_from(row)?)
}

fn to_response(row: WeatherResultRow) -> AppResult<ResultResponse> {
    let record = WeatherResult::try_from(row)?;
    Ok(ResultResponse::from(&record))
}

/// `?format=` wins; otherwise `Accept: text/csv` selects CSV.
fn negotiate_format(params: &ShowParams, headers: &HeaderMap) -> AppResult<Format> {
    if let Some(format) = params.format.as_deref() {
        return match format.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            other => Err(AppError::BadRequest(format!(
                "Unsupported format '{other}', expected 'json' or 'csv'"
            ))),
        };
    }

    let wants_csv = headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|media| media.trim().to_ascii_lowercase().starts_with("text/csv"));

    Ok(if wants_csv { Format::Csv } else { Format::Json })
}

fn csv_response(record: &WeatherResult) -> AppResult<Response> {
    let payload = record.state.payload().ok_or_else(|| {
        AppError::Core(CoreError::Conflict(format!(
            "WeatherResult {} is {}; only completed results can be exported",
            record.id,
            record.status()
        )))
    })?;

    let body = chart_to_csv(&payload.chart());
    let disposition = format!(
        "attachment; filename=\"weather_result_{}_{}.csv\"",
        record.id,
        record.query_date.format(DATE_FORMAT)
    );

    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()), (CONTENT_DISPOSITION, disposition)],
        body,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/results
///
/// List results newest first. Supports `limit` (default 50, max 100) and
/// `offset`.
pub async fn list_results(
    State(state): State<AppState>,
    Query(params): Query<ResultListQuery>,
) -> AppResult<impl IntoResponse> {
    let rows = WeatherResultRepo::list(&state.pool, &params).await?;
    let results = rows
        .into_iter()
        .map(to_response)
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Json(DataResponse { data: results }))
}

// ---------------------------------------------------------------------------
// New / Create
// ---------------------------------------------------------------------------

/// GET /api/v1/results/new
///
/// Blank submission form.
pub async fn new_result() -> impl IntoResponse {
    let today: NaiveDate = chrono::Utc::now().date_naive();
    Json(DataResponse {
        data: ResultForm::blank(today),
    })
}

/// POST /api/v1/results
///
/// Validate the submission, store a `pending` result, and queue its job.
/// Returns 201 with the result, or 422 with the form and field errors.
pub async fn create_result(
    State(state): State<AppState>,
    Json(input): Json<ResultSubmission>,
) -> AppResult<impl IntoResponse> {
    let new = parse_submission(&input)
        .map_err(|errors| AppError::InvalidSubmission(Box::new(ResultForm::rejected(&input, errors))))?;

    let (row, job) = WeatherResultRepo::create_and_enqueue(&state.pool, &new).await?;

    tracing::info!(
        result_id = row.id,
        job_id = job.id,
        lat = new.latitude,
        lon = new.longitude,
        day_of_year = new.day_of_year,
        "Weather result submitted",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: to_response(row)? })))
}

// ---------------------------------------------------------------------------
// Show
// ---------------------------------------------------------------------------

/// GET /api/v1/results/{id}
///
/// JSON by default; CSV with `Accept: text/csv` or `?format=csv`. CSV of a
/// result that is not completed is a 409.
pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<ShowParams>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let format = negotiate_format(&params, &headers)?;
    let record = find_result(&state.pool, id).await?;

    match format {
        Format::Csv => csv_response(&record),
        Format::Json => Ok(Json(DataResponse {
            data: ResultResponse::from(&record),
        })
        .into_response()),
    }
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// POST /api/v1/results/{id}/retry
///
/// Queue a fresh `pending` result with the same coordinates and date as a
/// failed one. The failed result is left as it is. Returns 201 with the new
/// result.
pub async fn retry_result(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let original = find_result(&state.pool, id).await?;

    if original.status() != ResultStatus::Failed {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "WeatherResult {id} is {}; only failed results can be retried",
            original.status()
        ))));
    }

    let new = NewWeatherResult::new(original.latitude, original.longitude, original.query_date);
    let (row, job) = WeatherResultRepo::create_and_enqueue(&state.pool, &new).await?;

    tracing::info!(
        result_id = row.id,
        retry_of = id,
        job_id = job.id,
        "Weather result retried",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: to_response(row)? })))
}
