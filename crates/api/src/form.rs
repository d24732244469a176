//! Form descriptor for submitting a weather result.
//!
//! `GET /api/v1/results/new` returns a blank descriptor; a rejected
//! `POST /api/v1/results` returns the same descriptor with the submitted
//! values and field-level errors filled in.

use chrono::NaiveDate;
use riskcast_core::submission::{
    FieldErrors, ResultSubmission, DATE_FORMAT, FIELD_DATE, FIELD_LATITUDE, FIELD_LONGITUDE,
};
use serde::Serialize;
use serde_json::{Map, Value};

/// Where the form submits to.
pub const RESULTS_PATH: &str = "/api/v1/results";

/// One input of the form.
#[derive(Debug, Clone, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub label: &'static str,
    /// HTML input type (`number`, `date`).
    pub input_type: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<&'static str>,
}

/// The weather result form: fields, current values, and errors.
#[derive(Debug, Clone, Serialize)]
pub struct ResultForm {
    pub action: &'static str,
    pub method: &'static str,
    pub fields: Vec<FormField>,
    pub values: Map<String, Value>,
    pub errors: FieldErrors,
}

impl ResultForm {
    /// An empty form with the date defaulted to `today`.
    pub fn blank(today: NaiveDate) -> Self {
        let mut values = Map::new();
        values.insert(FIELD_LATITUDE.to_string(), Value::Null);
        values.insert(FIELD_LONGITUDE.to_string(), Value::Null);
        values.insert(
            FIELD_DATE.to_string(),
            Value::String(today.format(DATE_FORMAT).to_string()),
        );
        Self::new(values, FieldErrors::new())
    }

    /// The form re-populated with a rejected submission.
    pub fn rejected(submission: &ResultSubmission, errors: FieldErrors) -> Self {
        let mut values = Map::new();
        for (name, value) in [
            (FIELD_LATITUDE, &submission.latitude),
            (FIELD_LONGITUDE, &submission.longitude),
            (FIELD_DATE, &submission.date),
        ] {
            values.insert(name.to_string(), value.clone().unwrap_or(Value::Null));
        }
        Self::new(values, errors)
    }

    fn new(values: Map<String, Value>, errors: FieldErrors) -> Self {
        Self {
            action: RESULTS_PATH,
            method: "POST",
            fields: fields(),
            values,
            errors,
        }
    }
}

fn fields() -> Vec<FormField> {
    vec![
        FormField {
            name: FIELD_LATITUDE,
            label: "Latitude",
            input_type: "number",
            required: true,
            min: Some(-90.0),
            max: Some(90.0),
            step: Some("any"),
        },
        FormField {
            name: FIELD_LONGITUDE,
            label: "Longitude",
            input_type: "number",
            required: true,
            min: Some(-180.0),
            max: Some(180.0),
            step: Some("any"),
        },
        FormField {
            name: FIELD_DATE,
            label: "Date",
            input_type: "date",
            required: true,
            min: None,
            max: None,
            step: None,
        },
    ]
}
