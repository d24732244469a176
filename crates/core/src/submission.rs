//! Parsing and validation of a new weather result submission.
//!
//! Form posts send coordinates as strings while JSON clients send numbers,
//! so [`ResultSubmission`] accepts raw JSON values and [`parse_submission`]
//! normalizes them into a [`NewWeatherResult`]. Every problem is collected
//! into [`FieldErrors`] so the caller can re-render the form with all
//! field-level errors at once.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::CoreError;
use crate::source::WeatherQuery;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Canonical date format accepted from users and passed to the source.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Field names as they appear in request bodies and error maps.
pub const FIELD_LATITUDE: &str = "latitude";
pub const FIELD_LONGITUDE: &str = "longitude";
pub const FIELD_DATE: &str = "date";
pub const FIELD_DAY_OF_YEAR: &str = "day_of_year";

const MSG_BLANK: &str = "can't be blank";
const MSG_NOT_A_NUMBER: &str = "is not a number";
const MSG_BAD_DATE: &str = "is not a valid date (expected YYYY-MM-DD)";

// ---------------------------------------------------------------------------
// Input / output types
// ---------------------------------------------------------------------------

/// Raw body of `POST /results`.
///
/// All fields are optional JSON values; type and presence checks happen in
/// [`parse_submission`] so they surface as field errors instead of a
/// deserialization rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultSubmission {
    pub latitude: Option<Value>,
    pub longitude: Option<Value>,
    pub date: Option<Value>,
}

/// A validated submission, ready to be persisted as a `pending` record.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct NewWeatherResult {
    #[validate(range(min = -90.0, max = 90.0, message = "must be between -90 and 90"))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "must be between -180 and 180"))]
    pub longitude: f64,
    pub query_date: NaiveDate,
    #[validate(range(min = 1, max = 366, message = "must be between 1 and 366"))]
    pub day_of_year: i16,
}

impl NewWeatherResult {
    /// Build a submission from a parsed date, deriving the day-of-year.
    pub fn new(latitude: f64, longitude: f64, query_date: NaiveDate) -> Self {
        Self {
            latitude,
            longitude,
            query_date,
            day_of_year: day_of_year(query_date),
        }
    }

    /// The query the probability source will be asked.
    pub fn query(&self) -> WeatherQuery {
        WeatherQuery {
            latitude: self.latitude,
            longitude: self.longitude,
            date: self.query_date,
        }
    }

    /// Run all range checks, returning field-level errors on failure.
    pub fn check(&self) -> Result<(), FieldErrors> {
        self.validate().map_err(|e| FieldErrors::from(&e))
    }
}

/// Field name -> list of human-readable messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against `field`.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded for `field` (empty when the field is valid).
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Merge another set of errors into this one.
    pub fn extend(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{field} {}", messages.join(", ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl From<&validator::ValidationErrors> for FieldErrors {
    fn from(errors: &validator::ValidationErrors) -> Self {
        let mut out = FieldErrors::new();
        for (field, field_errors) in errors.field_errors() {
            let field = field.to_string();
            for error in field_errors {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                out.add(&field, message);
            }
        }
        out
    }
}

impl From<FieldErrors> for CoreError {
    fn from(errors: FieldErrors) -> Self {
        CoreError::Validation(errors.to_string())
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Normalize and validate a raw submission.
///
/// Collects every problem before returning, so a submission with a bad date
/// and a missing longitude reports both.
pub fn parse_submission(input: &ResultSubmission) -> Result<NewWeatherResult, FieldErrors> {
    let mut errors = FieldErrors::new();

    let latitude = parse_coordinate(input.latitude.as_ref(), FIELD_LATITUDE, &mut errors);
    let longitude = parse_coordinate(input.longitude.as_ref(), FIELD_LONGITUDE, &mut errors);
    let date = parse_date_field(input.date.as_ref(), &mut errors);

    let (Some(latitude), Some(longitude), Some(date)) = (latitude, longitude, date) else {
        return Err(errors);
    };

    let result = NewWeatherResult::new(latitude, longitude, date);
    if let Err(range_errors) = result.check() {
        errors.extend(range_errors);
    }

    if errors.is_empty() {
        Ok(result)
    } else {
        Err(errors)
    }
}

/// Parse an ISO `YYYY-MM-DD` date string.
pub fn parse_date(raw: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| CoreError::Validation(format!("Invalid date '{raw}': expected YYYY-MM-DD")))
}

/// The 1-366 ordinal of `date` within its year.
pub fn day_of_year(date: NaiveDate) -> i16 {
    // ordinal() is always in 1..=366, which fits in i16.
    date.ordinal() as i16
}

fn parse_coordinate(raw: Option<&Value>, field: &str, errors: &mut FieldErrors) -> Option<f64> {
    let parsed = match raw {
        None | Some(Value::Null) => {
            errors.add(field, MSG_BLANK);
            return None;
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.add(field, MSG_BLANK);
            return None;
        }
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match parsed.filter(|v| v.is_finite()) {
        Some(v) => Some(v),
        None => {
            errors.add(field, MSG_NOT_A_NUMBER);
            None
        }
    }
}

fn parse_date_field(raw: Option<&Value>, errors: &mut FieldErrors) -> Option<NaiveDate> {
    match raw {
        None | Some(Value::Null) => {
            errors.add(FIELD_DATE, MSG_BLANK);
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.add(FIELD_DATE, MSG_BLANK);
            None
        }
        Some(Value::String(s)) => match parse_date(s) {
            Ok(date) => Some(date),
            Err(_) => {
                errors.add(FIELD_DATE, MSG_BAD_DATE);
                None
            }
        },
        Some(_) => {
            errors.add(FIELD_DATE, MSG_BAD_DATE);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
