//! Weather result rows and their conversion into domain records.

use chrono::NaiveDate;
use riskcast_core::error::CoreError;
use riskcast_core::result_state::{ResultState, ResultStatus};
use riskcast_core::source::WeatherQuery;
use riskcast_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::{StatusId, WeatherResultStatus};

/// A row from the `weather_results` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WeatherResultRow {
    pub id: DbId,
    pub latitude: f64,
    pub longitude: f64,
    pub query_date: NaiveDate,
    pub day_of_year: i16,
    pub status_id: StatusId,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A weather result whose status and data columns have been checked
/// against each other.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherResult {
    pub id: DbId,
    pub latitude: f64,
    pub longitude: f64,
    pub query_date: NaiveDate,
    pub day_of_year: i16,
    pub state: ResultState,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WeatherResult {
    pub fn status(&self) -> ResultStatus {
        self.state.status()
    }

    /// The query handed to a probability source for this record.
    pub fn query(&self) -> WeatherQuery {
        WeatherQuery {
            latitude: self.latitude,
            longitude: self.longitude,
            date: self.query_date,
        }
    }
}

impl TryFrom<WeatherResultRow> for WeatherResult {
    type Error = CoreError;

    fn try_from(row: WeatherResultRow) -> Result<Self, Self::Error> {
        let status = WeatherResultStatus::from_id(row.status_id).ok_or_else(|| {
            CoreError::Internal(format!(
                "Unknown weather result status id {} on record {}",
                row.status_id, row.id
            ))
        })?;
        let state = ResultState::from_parts(status.into(), row.result, row.error_message)?;

        Ok(Self {
            id: row.id,
            latitude: row.latitude,
            longitude: row.longitude,
            query_date: row.query_date,
            day_of_year: row.day_of_year,
            state,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Query parameters for `GET /api/v1/results`.
#[derive(Debug, Default, Deserialize)]
pub struct ResultListQuery {
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<i64>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn row(status: WeatherResultStatus) -> WeatherResultRow {
        WeatherResultRow {
            id: 7,
            latitude: 40.7,
            longitude: -74.0,
            query_date: NaiveDate::from_ymd_opt(2024, 7, 4).unwrap(),
            day_of_year: 186,
            status_id: status.id(),
            result: None,
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn pending_row_converts() {
        let record = WeatherResult::try_from(row(WeatherResultStatus::Pending)).unwrap();
        assert_eq!(record.state, ResultState::Pending);
        assert_eq!(record.query().date_string(), "2024-07-04");
    }

    #[test]
    fn completed_row_carries_payload() {
        let mut completed = row(WeatherResultStatus::Completed);
        completed.result = Some(json!({"probabilities": {"hot_prob": 12.5}}));
        let record = WeatherResult::try_from(completed).unwrap();
        assert_eq!(record.status(), ResultStatus::Completed);
        assert_eq!(
            record.state.payload().unwrap().probabilities["hot_prob"],
            json!(12.5)
        );
    }

    #[test]
    fn inconsistent_rows_are_rejected() {
        let completed_without_payload = row(WeatherResultStatus::Completed);
        assert_matches!(
            WeatherResult::try_from(completed_without_payload),
            Err(CoreError::Internal(_))
        );

        let mut unknown = row(WeatherResultStatus::Pending);
        unknown.status_id = 9;
        assert_matches!(
            WeatherResult::try_from(unknown),
            Err(CoreError::Internal(msg)) if msg.contains("status id 9")
        );
    }
}
