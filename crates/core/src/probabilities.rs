//! Probability payloads, chart flattening, and CSV export.
//!
//! A completed record stores the source's JSON document verbatim. The
//! document must carry a `probabilities` object; everything else (`meta`,
//! raw model inputs) is preserved in [`ProbabilityPayload::extra`].
//!
//! [`probabilities_for_chart`] turns whatever nested structure the source
//! produced into a flat `label -> percentage` mapping used by both the JSON
//! view and the CSV export.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key holding the risk mapping inside a payload.
pub const PROBABILITIES_KEY: &str = "probabilities";

/// CSV header row for exports.
pub const CSV_HEADER: &str = "metric,probability";

/// Known source keys and their display labels.
const KNOWN_LABELS: &[(&str, &str)] = &[
    ("hot_prob", "Hot"),
    ("cold_prob", "Cold"),
    ("too_rainy", "Too Rainy"),
    ("too_windy", "Too Windy"),
];

/// Suffix marking any other probability key (`wet_prob` -> `Wet`).
const PROB_SUFFIX: &str = "_prob";

/// The document returned by a probability source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityPayload {
    /// Named risk factors mapped to percentages (possibly nested).
    pub probabilities: Map<String, Value>,
    /// Every other top-level key, kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Why a JSON document cannot be used as a payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadShapeError {
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("missing `probabilities` object")]
    MissingProbabilities,
}

impl ProbabilityPayload {
    /// Wrap a bare probability mapping with no extra metadata.
    pub fn from_probabilities(probabilities: Map<String, Value>) -> Self {
        Self {
            probabilities,
            extra: Map::new(),
        }
    }

    /// Rebuild a payload from a stored (or freshly parsed) JSON document.
    ///
    /// Does not look at an `error` key; callers classifying raw source
    /// output do that first.
    pub fn from_stored(value: Value) -> Result<Self, PayloadShapeError> {
        let Value::Object(mut object) = value else {
            return Err(PayloadShapeError::NotAnObject(json_kind(&value)));
        };
        match object.remove(PROBABILITIES_KEY) {
            Some(Value::Object(probabilities)) => Ok(Self {
                probabilities,
                extra: object,
            }),
            _ => Err(PayloadShapeError::MissingProbabilities),
        }
    }

    /// The payload as a single JSON document, suitable for storage.
    pub fn to_value(&self) -> Value {
        let mut object = Map::with_capacity(self.extra.len() + 1);
        object.insert(
            PROBABILITIES_KEY.to_string(),
            Value::Object(self.probabilities.clone()),
        );
        for (key, value) in &self.extra {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }

    /// Flattened `label -> percentage` view of [`Self::probabilities`].
    pub fn chart(&self) -> Map<String, Value> {
        probabilities_for_chart(&self.probabilities)
    }
}

/// Short name of a JSON value's type, for error messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Chart flattening
// ---------------------------------------------------------------------------

/// Flatten a probability mapping into display labels and numbers.
///
/// Known keys and `*_prob` keys are labeled; their value is used directly
/// if numeric, otherwise the first numeric leaf inside it. Other keys are
/// dropped, unless no key matched at all, in which case every key is
/// humanized and coerced best-effort (numeric strings included). Entries
/// with no usable number are skipped.
///
/// Running this on its own output returns the output unchanged.
pub fn probabilities_for_chart(probabilities: &Map<String, Value>) -> Map<String, Value> {
    let mut chart = Map::new();

    for (key, value) in probabilities {
        let Some(label) = label_for(key) else {
            continue;
        };
        if let Some(number) = first_numeric_leaf(value) {
            chart.insert(label, number_value(number));
        }
    }

    if chart.is_empty() && !probabilities.keys().any(|k| label_for(k).is_some()) {
        for (key, value) in probabilities {
            if let Some(number) = coerce_number(value) {
                chart.insert(humanize(key), number_value(number));
            }
        }
    }

    chart
}

/// Display label for a recognized key, or `None` if the key is unlabelable.
fn label_for(key: &str) -> Option<String> {
    if let Some((_, label)) = KNOWN_LABELS.iter().find(|(known, _)| *known == key) {
        return Some((*label).to_string());
    }
    key.strip_suffix(PROB_SUFFIX)
        .filter(|prefix| !prefix.is_empty())
        .map(humanize)
}

/// Depth-first search for the first finite number (object order, then array order).
fn first_numeric_leaf(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::Object(map) => map.values().find_map(first_numeric_leaf),
        Value::Array(items) => items.iter().find_map(first_numeric_leaf),
        _ => None,
    }
}

/// Best-effort conversion used when no key was recognized.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        other => first_numeric_leaf(other),
    }
}

fn number_value(number: f64) -> Value {
    serde_json::Number::from_f64(number)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// `very_hot` / `very hot` -> `Very Hot`. Idempotent on its own output.
pub fn humanize(key: &str) -> String {
    key.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Render a chart mapping as `metric,probability` CSV.
///
/// Values that are not numbers (never produced by [`probabilities_for_chart`])
/// are skipped.
pub fn chart_to_csv(chart: &Map<String, Value>) -> String {
    let mut lines = Vec::with_capacity(chart.len() + 1);
    lines.push(CSV_HEADER.to_string());

    for (label, value) in chart {
        if let Some(number) = value.as_f64() {
            lines.push(format!("{},{}", csv_escape(label), format_probability(number)));
        }
    }

    lines.join("\n")
}

/// Escape a value for CSV: wrap in quotes if it contains comma, quote, or newline.
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Always show a decimal part so `10` renders as `10.0`.
fn format_probability(value: f64) -> String {
    let rendered = value.to_string();
    if rendered.contains(['.', 'e', 'E']) || !value.is_finite() {
        rendered
    } else {
        format!("{rendered}.0")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
