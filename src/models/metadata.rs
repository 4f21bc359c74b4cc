//! Dataset metadata documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::config::GridSpec;
use crate::ISO_8601;

/// The describable facts about one dataset: geometry, date coverage, units,
/// and presentation fields. Persisted (plus summary statistics) as the
/// dataset's metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub title: String,
    pub gridded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridSpec>,
    pub units: BTreeMap<String, String>,
    /// `[min_x, min_y, max_x, max_y]`
    pub bbox: [f64; 4],
    pub bbox_md5: String,
    /// `[first, last]` for time series, `[anchor]` for a single slice,
    /// formatted `%Y-%m-%dT%H:%M:%S`.
    pub dates: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
}

impl DatasetMetadata {
    /// Extends this metadata's date range with another describe() result,
    /// as happens when new data is appended before or after existing data.
    /// Bounding box and hash are refreshed from the newer description.
    pub fn merge(&mut self, newer: &DatasetMetadata) {
        let mut dates: Vec<String> = self
            .dates
            .iter()
            .chain(newer.dates.iter())
            .cloned()
            .collect();
        dates.sort();
        dates.dedup();
        self.dates = match (dates.first(), dates.last()) {
            (Some(first), Some(last)) if dates.len() > 1 => {
                vec![first.clone(), last.clone()]
            }
            _ => dates,
        };

        if let Some(newer_steps) = &newer.steps {
            let steps = self.steps.get_or_insert_with(Vec::new);
            for step in newer_steps {
                if !steps.contains(step) {
                    steps.push(*step);
                }
            }
        }
        if newer.span.is_some() {
            self.span = newer.span;
        }

        self.bbox = newer.bbox;
        self.bbox_md5 = newer.bbox_md5.clone();
        if !newer.title.is_empty() {
            self.title = newer.title.clone();
        }
    }

    pub fn first_date(&self) -> Option<&str> {
        self.dates.first().map(String::as_str)
    }

    pub fn last_date(&self) -> Option<&str> {
        self.dates.last().map(String::as_str)
    }
}

/// Formats a timestamp the way every persisted document does.
pub fn format_timestamp(ts: chrono::NaiveDateTime) -> String {
    ts.format(ISO_8601).to_string()
}
