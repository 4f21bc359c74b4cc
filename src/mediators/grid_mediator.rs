//! Mediator for gridded time-series datasets.
//!
//! One data document per time slice, `_id` = timestamp, `values` = the slice
//! in coordinate-index order. The coordinate index is written once, on the
//! first save, and every later save is checked against it: a value array that
//! disagrees with the index length would desync coordinates from values for
//! the whole dataset.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde_json::json;

use crate::error::{FluxError, Result};
use crate::mediators::{SaveOutcome, TimeQuery};
use crate::models::config::ConfigOverrides;
use crate::models::frame::{round_to, CoordinateIndex, GridFrame};
use crate::models::grid::GridModel;
use crate::models::metadata::{format_timestamp, DatasetMetadata};
use crate::stats::Summary;
use crate::store::catalog::{coord_index_doc, ensure_not_reserved};
use crate::store::{DocumentStore, COORD_INDEX, METADATA, SUMMARY_STATS};
use crate::utils::ProgressReporter;

pub struct GridMediator {
    store: DocumentStore,
}

impl GridMediator {
    pub fn new(store: &DocumentStore) -> Self {
        Self {
            store: store.clone(),
        }
    }

    /// Extracts the model's frame and persists it: data documents, the
    /// coordinate index (first save only), and refreshed metadata/summary
    /// documents. Existing time slices are skipped and logged, not
    /// overwritten.
    pub fn save(
        &self,
        collection: &str,
        model: &mut GridModel,
        overrides: &ConfigOverrides,
        progress: Option<&ProgressReporter>,
    ) -> Result<SaveOutcome> {
        ensure_not_reserved(collection)?;
        let frame = model.extract(overrides)?;

        match self.store.get(COORD_INDEX, collection)? {
            None => {
                self.store.upsert(
                    COORD_INDEX,
                    collection,
                    &coord_index_doc(collection, &frame.coords().to_json()),
                )?;
            }
            Some(doc) => {
                let existing = CoordinateIndex::from_json(&doc["i"])?;
                if existing.len() != frame.n_points() {
                    return Err(FluxError::ShapeMismatch {
                        expected: existing.len(),
                        found: frame.n_points(),
                    });
                }
            }
        }

        let precision = model.config().precision;
        let mut outcome = SaveOutcome::default();
        for (step, timestamp) in frame.times().iter().enumerate() {
            let id = format_timestamp(*timestamp);
            let values: Vec<f64> = frame
                .column(step)
                .iter()
                .map(|v| match precision {
                    Some(places) => round_to(*v, places),
                    None => *v,
                })
                .collect();

            let doc = json!({ "_id": id, "values": values });
            match self.store.insert_new(collection, &id, &doc) {
                Ok(()) => outcome.written += 1,
                Err(FluxError::DuplicateKey { .. }) => {
                    tracing::warn!(collection, timestamp = %id, "time slice already loaded, skipping");
                    outcome.skipped += 1;
                }
                Err(e) => return Err(e),
            }
            if let Some(progress) = progress {
                progress.increment(1);
            }
        }

        self.refresh_metadata(collection, model, &frame)?;
        Ok(outcome)
    }

    /// Rebuilds a frame by joining the coordinate index against the data
    /// documents matching the query.
    pub fn load(&self, collection: &str, query: &TimeQuery) -> Result<GridFrame> {
        let coords_doc = self
            .store
            .get(COORD_INDEX, collection)?
            .ok_or_else(|| FluxError::NotFound(format!("coordinate index for '{}'", collection)))?;
        let coords = CoordinateIndex::from_json(&coords_doc["i"])?;

        let mut times = Vec::new();
        let mut columns = Vec::new();
        for (id, doc) in self.store.find_all(collection)? {
            let timestamp = NaiveDateTime::parse_from_str(&id, crate::ISO_8601)?;
            if !query.matches(timestamp) {
                continue;
            }
            let values: Vec<f64> = doc["values"]
                .as_array()
                .ok_or_else(|| {
                    FluxError::Configuration(format!(
                        "document '{}' in '{}' has no values array",
                        id, collection
                    ))
                })?
                .iter()
                .map(|v| v.as_f64().unwrap_or(f64::NAN))
                .collect();
            times.push(timestamp);
            columns.push(values);
        }

        if times.is_empty() {
            return Err(FluxError::NotFound(format!(
                "no data documents matched in '{}'",
                collection
            )));
        }

        GridFrame::new(coords, times, columns)
    }

    /// Descriptive statistics across every stored time step, keyed by field.
    pub fn summarize(&self, collection: &str) -> Result<BTreeMap<String, Summary>> {
        let frame = self.load(collection, &TimeQuery::all())?;
        Ok(BTreeMap::from([(
            "values".to_string(),
            Summary::from_series(&frame.flattened())?,
        )]))
    }

    fn refresh_metadata(
        &self,
        collection: &str,
        model: &mut GridModel,
        frame: &GridFrame,
    ) -> Result<()> {
        let described = model.describe(Some(frame))?;
        let merged = match self.store.get(METADATA, collection)? {
            Some(existing_doc) => {
                let mut existing: DatasetMetadata = serde_json::from_value(existing_doc)?;
                existing.merge(&described);
                existing
            }
            None => described,
        };

        let stats = self.summarize(collection)?;
        let mut doc = serde_json::to_value(&merged)?;
        doc["_id"] = json!(collection);
        doc["stats"] = serde_json::to_value(&stats)?;
        self.store.upsert(METADATA, collection, &doc)?;

        if let Some(primary) = stats.get("values") {
            let mut summary_doc = serde_json::to_value(primary)?;
            summary_doc["_id"] = json!(collection);
            summary_doc["about_collection"] = json!(collection);
            summary_doc["tags"] = json!([]);
            summary_doc["timestamp_start"] = json!(merged.first_date());
            summary_doc["timestamp_end"] = json!(merged.last_date());
            self.store.upsert(SUMMARY_STATS, collection, &summary_doc)?;
        }
        Ok(())
    }
}
