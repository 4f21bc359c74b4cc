//! GeoJSON shaping for persisted time slices.
//!
//! Used by both the read API and the `export` command. A "slice feature" is
//! the stored document form: an object with `coordinates` and a value under
//! `flux` or `value`.

use std::path::Path;

use serde_json::{json, Value};

use crate::error::Result;
use crate::models::frame::CoordinateIndex;
use crate::stats::Summary;
use crate::utils::colors::ColorRamp;

pub struct GeoJsonWriter;

impl GeoJsonWriter {
    /// Joins a coordinate index against a value array, producing stored-form
    /// slice features in index order.
    pub fn features_from_values(coords: &CoordinateIndex, values: &[f64]) -> Vec<Value> {
        coords
            .pairs()
            .iter()
            .zip(values)
            .map(|(&(lon, lat), &flux)| json!({ "coordinates": [lon, lat], "flux": flux }))
            .collect()
    }

    /// A GeoJSON `FeatureCollection` of `Point` features carrying a `flux`
    /// property.
    pub fn feature_collection(features: &[Value]) -> Value {
        json!({
            "type": "FeatureCollection",
            "features": features
                .iter()
                .map(|feature| {
                    json!({
                        "type": "Feature",
                        "geometry": {
                            "type": "Point",
                            "coordinates": feature["coordinates"],
                        },
                        "properties": { "flux": flux_of(feature) },
                    })
                })
                .collect::<Vec<_>>(),
        })
    }

    /// The `GeometryCollection` variant of the same payload.
    pub fn geometry_collection(features: &[Value]) -> Value {
        json!({
            "type": "GeometryCollection",
            "geometries": features
                .iter()
                .map(|feature| {
                    json!({
                        "type": "Point",
                        "coordinates": feature["coordinates"],
                        "properties": { "flux": flux_of(feature) },
                    })
                })
                .collect::<Vec<_>>(),
        })
    }

    /// Like [`feature_collection`](Self::feature_collection), but each
    /// feature also carries its standard-score class and the matching ramp
    /// style identifier, the way the map overlays color-code cells.
    pub fn styled_feature_collection(
        features: &[Value],
        ramp: &ColorRamp,
        summary: &Summary,
    ) -> Value {
        json!({
            "type": "FeatureCollection",
            "features": features
                .iter()
                .map(|feature| {
                    let flux = flux_of(feature).as_f64().unwrap_or(f64::NAN);
                    let score = ramp.score_class(flux, summary.mean, summary.std);
                    json!({
                        "type": "Feature",
                        "geometry": {
                            "type": "Point",
                            "coordinates": feature["coordinates"],
                        },
                        "properties": {
                            "flux": flux_of(feature),
                            "score": score,
                            "styleUrl": ramp.style_id(score),
                        },
                    })
                })
                .collect::<Vec<_>>(),
        })
    }

    pub fn write(path: &Path, document: &Value) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(file, document)?;
        Ok(())
    }
}

fn flux_of(feature: &Value) -> Value {
    if feature["flux"].is_null() {
        feature["value"].clone()
    } else {
        feature["flux"].clone()
    }
}
