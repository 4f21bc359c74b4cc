//! Read API handlers.
//!
//! Three views over the persisted documents, all read-only:
//!
//! - `GET /<dataset>/stats.json`: the dataset's summary document, minus
//!   internal fields.
//! - `GET /<dataset>.json?time=&timeformat=`: one time slice as stored
//!   features plus the echoed timestamp.
//! - `GET /<dataset>.geojson?time=&timeformat=&collection=`: the same slice
//!   as a GeoJSON FeatureCollection or GeometryCollection.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::server::ApiState;
use crate::models::frame::CoordinateIndex;
use crate::models::metadata::format_timestamp;
use crate::store::{COORD_INDEX, SUMMARY_STATS};
use crate::writers::GeoJsonWriter;
use crate::ISO_8601;

/// Fields of the summary document that never leave the server.
const INTERNAL_FIELDS: [&str; 3] = ["about_collection", "tags", "_id"];

#[derive(Debug, Deserialize)]
pub struct SliceQuery {
    pub time: Option<String>,
    pub timeformat: Option<String>,
    pub collection: Option<String>,
}

/// `GET /:dataset/stats.json`
pub async fn dataset_stats(
    State(state): State<ApiState>,
    Path(dataset): Path<String>,
) -> Response {
    let doc = match state.store.get(SUMMARY_STATS, &dataset) {
        Ok(Some(doc)) => doc,
        Ok(None) => return not_found(&dataset),
        Err(e) => return server_error(e),
    };

    let mut doc = doc;
    if let Some(map) = doc.as_object_mut() {
        for field in INTERNAL_FIELDS {
            map.remove(field);
        }
    }
    Json(doc).into_response()
}

/// `GET /:dataset.json` and `GET /:dataset.geojson`
pub async fn dataset_slice(
    State(state): State<ApiState>,
    Path(resource): Path<String>,
    Query(query): Query<SliceQuery>,
) -> Response {
    let Some((dataset, extension)) = resource.rsplit_once('.') else {
        return not_found(&resource);
    };
    if extension != "json" && extension != "geojson" {
        return not_found(&resource);
    }

    // Legacy clients depend on a 500 (not a 400) for a missing time value.
    let time = match query.time.as_deref() {
        Some(time) if !time.is_empty() => time,
        _ => return (StatusCode::INTERNAL_SERVER_ERROR, "Bad Request").into_response(),
    };
    let format = query.timeformat.as_deref().unwrap_or(ISO_8601);
    let timestamp = match NaiveDateTime::parse_from_str(time, format) {
        Ok(timestamp) => timestamp,
        Err(_) => return (StatusCode::INTERNAL_SERVER_ERROR, "Bad Request").into_response(),
    };

    let id = format_timestamp(timestamp);
    let doc = match state.store.get(dataset, &id) {
        Ok(Some(doc)) => doc,
        Ok(None) => return not_found(&format!("{} at {}", dataset, id)),
        Err(e) => return server_error(e),
    };

    let features = match slice_features(&state, dataset, &doc) {
        Ok(features) => features,
        Err(response) => return response,
    };

    match extension {
        "json" => Json(json!({ "features": features, "timestamp": time })).into_response(),
        _ => {
            let collection = query.collection.as_deref().unwrap_or("features");
            let body = if collection == "geometries" {
                GeoJsonWriter::geometry_collection(&features)
            } else {
                GeoJsonWriter::feature_collection(&features)
            };
            Json(body).into_response()
        }
    }
}

/// The slice's stored feature array, or one synthesized by joining the
/// coordinate index against the document's value array.
fn slice_features(
    state: &ApiState,
    dataset: &str,
    doc: &Value,
) -> std::result::Result<Vec<Value>, Response> {
    if let Some(features) = doc.get("features").and_then(Value::as_array) {
        return Ok(features.clone());
    }

    let values: Vec<f64> = doc
        .get("values")
        .and_then(Value::as_array)
        .map(|array| array.iter().map(|v| v.as_f64().unwrap_or(f64::NAN)).collect())
        .unwrap_or_default();

    let index_doc = match state.store.get(COORD_INDEX, dataset) {
        Ok(Some(index_doc)) => index_doc,
        Ok(None) => return Err(not_found(&format!("coordinate index for {}", dataset))),
        Err(e) => return Err(server_error(e)),
    };
    let coords = match CoordinateIndex::from_json(&index_doc["i"]) {
        Ok(coords) => coords,
        Err(e) => return Err(server_error(e)),
    };

    Ok(GeoJsonWriter::features_from_values(&coords, &values))
}

fn not_found(what: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("Not Found: {}", what)).into_response()
}

fn server_error(e: impl std::fmt::Display) -> Response {
    tracing::error!("read API failure: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}
