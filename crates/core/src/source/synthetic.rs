//! Deterministic synthetic probabilities.
//!
//! Used when no external script is configured. The same coordinates and
//! day-of-year always produce the same numbers: five standard-normal scores
//! drawn from an RNG seeded with `|lat*1000| + |lon*1000| + day_of_year`,
//! shifted by a seasonal sin/cos component, then softmaxed into percentages
//! that sum to 100.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map};

use super::{ProbabilitySource, SourceError, WeatherQuery};
use crate::probabilities::ProbabilityPayload;

/// Risk factors produced by the synthetic model, in output order.
pub const SYNTHETIC_METRICS: [&str; 5] = [
    "very hot",
    "very cold",
    "very windy",
    "very wet",
    "very uncomfortable",
];

/// `data_source` value recorded in the payload metadata.
pub const DATA_SOURCE: &str = "synthetic";

/// In-process synthetic probability model.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticSource;

impl SyntheticSource {
    /// Compute the payload for `query`. Pure and deterministic.
    pub fn compute(query: &WeatherQuery) -> ProbabilityPayload {
        let day = query.day_of_year();
        let mut rng = StdRng::seed_from_u64(seed(query.latitude, query.longitude, day));

        let seasonal = seasonal_component(day);
        let scores: Vec<f64> = seasonal
            .iter()
            .map(|adjustment| standard_normal(&mut rng) + adjustment)
            .collect();

        let mut probabilities = Map::new();
        for (metric, p) in SYNTHETIC_METRICS.iter().zip(softmax(&scores)) {
            probabilities.insert((*metric).to_string(), json!(round2(p * 100.0)));
        }

        let mut extra = Map::new();
        extra.insert(
            "meta".to_string(),
            json!({
                "lat": query.latitude,
                "lon": query.longitude,
                "day_of_year": day,
                "date": query.date_string(),
                "data_source": DATA_SOURCE,
            }),
        );

        ProbabilityPayload {
            probabilities,
            extra,
        }
    }
}

impl ProbabilitySource for SyntheticSource {
    async fn fetch(&self, query: &WeatherQuery) -> Result<ProbabilityPayload, SourceError> {
        Ok(Self::compute(query))
    }
}

fn seed(latitude: f64, longitude: f64, day: u32) -> u64 {
    // Truncation toward zero mirrors integer conversion of the summed float.
    ((latitude * 1000.0).abs() + (longitude * 1000.0).abs() + f64::from(day)) as u64
}

/// Yearly cycle, one phase per metric.
fn seasonal_component(day: u32) -> [f64; 5] {
    let angle = 2.0 * PI * f64::from(day) / 365.0;
    [
        angle.sin(),
        angle.cos(),
        (angle + FRAC_PI_4).sin(),
        (angle + FRAC_PI_2).cos(),
        (angle + PI).sin(),
    ]
}

/// Box-Muller transform over two uniform draws.
fn standard_normal(rng: &mut StdRng) -> f64 {
    // `random::<f64>()` is in [0, 1); shift to (0, 1] so ln() stays finite.
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
