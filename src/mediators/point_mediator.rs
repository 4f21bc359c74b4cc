//! Mediator for point-feature datasets.
//!
//! Point retrievals persist either as one document holding a `features`
//! array (when the source declares itself a single logical collection) or as
//! one document per record. Both layouts share the coordinate-index and
//! metadata conventions of the gridded shape.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde_json::{json, Value};

use crate::error::{FluxError, Result};
use crate::mediators::{SaveOutcome, TimeQuery};
use crate::models::config::ConfigOverrides;
use crate::models::frame::{PointFrame, PointRecord};
use crate::models::metadata::{format_timestamp, DatasetMetadata};
use crate::models::point::PointModel;
use crate::stats::Summary;
use crate::store::catalog::{coord_index_doc, ensure_not_reserved};
use crate::store::{DocumentStore, COORD_INDEX, METADATA, SUMMARY_STATS};

pub struct PointMediator {
    store: DocumentStore,
}

impl PointMediator {
    pub fn new(store: &DocumentStore) -> Self {
        Self {
            store: store.clone(),
        }
    }

    /// Extracts the model's rows and persists them, plus the coordinate
    /// index (first save only) and refreshed metadata/summary documents.
    pub fn save(
        &self,
        collection: &str,
        model: &mut PointModel,
        overrides: &ConfigOverrides,
    ) -> Result<SaveOutcome> {
        ensure_not_reserved(collection)?;
        let frame = model.extract(overrides)?;
        let anchor = model.config().require_timestamp()?;
        let anchor_id = format_timestamp(anchor);

        if !self.store.contains(COORD_INDEX, collection)? {
            let coords = frame.coordinate_index()?;
            self.store.upsert(
                COORD_INDEX,
                collection,
                &coord_index_doc(collection, &coords.to_json()),
            )?;
        }

        let features: Vec<Value> = frame.rows().iter().map(feature_doc).collect();
        let as_collection = model
            .config()
            .geometry
            .as_ref()
            .map(|g| g.is_collection)
            .unwrap_or(false);

        let mut outcome = SaveOutcome::default();
        if as_collection {
            let doc = json!({
                "_id": anchor_id,
                "features": features,
                "span": model.config().span,
            });
            match self.store.insert_new(collection, &anchor_id, &doc) {
                Ok(()) => outcome.written += 1,
                Err(FluxError::DuplicateKey { .. }) => {
                    tracing::warn!(collection, timestamp = %anchor_id, "slice already loaded, skipping");
                    outcome.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        } else {
            for (row, feature) in features.iter().enumerate() {
                let id = format!("{}.{:06}", anchor_id, row);
                match self.store.insert_new(collection, &id, feature) {
                    Ok(()) => outcome.written += 1,
                    Err(FluxError::DuplicateKey { .. }) => {
                        tracing::warn!(collection, record = %id, "record already loaded, skipping");
                        outcome.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        self.refresh_metadata(collection, model, &frame)?;
        Ok(outcome)
    }

    /// Rebuilds the point rows from matching documents, whichever layout
    /// they were stored in.
    pub fn load(&self, collection: &str, query: &TimeQuery) -> Result<PointFrame> {
        let mut rows = Vec::new();
        for (id, doc) in self.store.find_all(collection)? {
            match doc.get("features").and_then(Value::as_array) {
                Some(features) => {
                    for feature in features {
                        if let Some(record) = record_from_feature(feature)? {
                            if query.matches(record.timestamp) {
                                rows.push(record);
                            }
                        }
                    }
                }
                None => {
                    if let Some(record) = record_from_feature(&doc)? {
                        if query.matches(record.timestamp) {
                            rows.push(record);
                        }
                    } else {
                        return Err(FluxError::Configuration(format!(
                            "document '{}' in '{}' is not a point feature",
                            id, collection
                        )));
                    }
                }
            }
        }

        if rows.is_empty() {
            return Err(FluxError::NotFound(format!(
                "no data documents matched in '{}'",
                collection
            )));
        }
        PointFrame::new(rows)
    }

    /// Descriptive statistics keyed by field name (`value`, `error`).
    pub fn summarize(&self, collection: &str) -> Result<BTreeMap<String, Summary>> {
        let frame = self.load(collection, &TimeQuery::all())?;
        Ok(BTreeMap::from([
            (
                "value".to_string(),
                Summary::from_series(&frame.values())?,
            ),
            (
                "error".to_string(),
                Summary::from_series(&frame.errors())?,
            ),
        ]))
    }

    fn refresh_metadata(
        &self,
        collection: &str,
        model: &mut PointModel,
        frame: &PointFrame,
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

        if let Some(primary) = stats.get("value") {
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

fn feature_doc(record: &PointRecord) -> Value {
    json!({
        "coordinates": [record.longitude, record.latitude],
        "value": record.value,
        "error": record.error,
        "timestamp": format_timestamp(record.timestamp),
    })
}

fn record_from_feature(feature: &Value) -> Result<Option<PointRecord>> {
    let coordinates = match feature.get("coordinates").and_then(Value::as_array) {
        Some(pair) if pair.len() == 2 => pair,
        _ => return Ok(None),
    };
    let timestamp = match feature.get("timestamp").and_then(Value::as_str) {
        Some(raw) => NaiveDateTime::parse_from_str(raw, crate::ISO_8601)?,
        None => return Ok(None),
    };
    Ok(Some(PointRecord {
        longitude: coordinates[0].as_f64().unwrap_or(f64::NAN),
        latitude: coordinates[1].as_f64().unwrap_or(f64::NAN),
        value: feature["value"].as_f64().unwrap_or(f64::NAN),
        error: feature["error"].as_f64().unwrap_or(f64::NAN),
        timestamp,
    }))
}
