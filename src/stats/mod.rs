//! Descriptive statistics for persisted flux series.
//!
//! The numbers computed here feed both the metadata documents written at load
//! time and the `stats.json` endpoint of the read API. Values are kept at full
//! float precision; rounding happens only when a document is serialized.

use serde::{Deserialize, Serialize};

use crate::error::{FluxError, Result};

/// Summary statistics over one numeric series, with the ±1σ/±2σ bands the
/// map renderers use to bucket values into color classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
    pub median: f64,
    pub mean_values_1std: [f64; 2],
    pub mean_values_2std: [f64; 2],
    pub median_values_1std: [f64; 2],
    pub median_values_2std: [f64; 2],
}

impl Summary {
    /// Computes summary statistics over a series.
    ///
    /// The standard deviation is the population form (divide by `n`), matching
    /// what the downstream color classing expects. NaN entries are rejected
    /// rather than silently skipped.
    pub fn from_series(series: &[f64]) -> Result<Self> {
        if series.is_empty() {
            return Err(FluxError::Configuration(
                "cannot summarize an empty series".to_string(),
            ));
        }
        if series.iter().any(|v| v.is_nan()) {
            return Err(FluxError::Configuration(
                "cannot summarize a series containing NaN".to_string(),
            ));
        }

        let n = series.len() as f64;
        let mean = series.iter().sum::<f64>() / n;
        let min = series.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = series.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let variance = series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        let median = median(series);

        Ok(Self {
            mean,
            min,
            max,
            std,
            median,
            mean_values_1std: [mean - std, mean + std],
            mean_values_2std: [mean - 2.0 * std, mean + 2.0 * std],
            median_values_1std: [median - std, median + std],
            median_values_2std: [median - 2.0 * std, median + 2.0 * std],
        })
    }
}

fn median(series: &[f64]) -> f64 {
    let mut sorted = series.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("NaN rejected above"));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Standard score of `x` against a series mean and standard deviation.
pub fn z_score(x: f64, mean: f64, std: f64) -> f64 {
    (x - mean) / std
}
