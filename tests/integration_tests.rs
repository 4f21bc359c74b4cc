use std::fs::File;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use ndarray::array;
use ndarray_npy::NpzWriter;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use flux_processor::mediators::{GridMediator, TimeQuery};
use flux_processor::models::config::{parse_timestamp, ConfigOverrides};
use flux_processor::models::GridModel;
use flux_processor::store::{Catalog, DocumentStore, COORD_INDEX, METADATA};

/// Three grid cells, two 3-hourly steps, anchored at the CASA GFED epoch.
fn seeded_store(dir: &TempDir) -> DocumentStore {
    let path = dir.path().join("casagfed.npz");
    let matrix = array![
        [-166.5, 65.5, 0.08129, 0.125],
        [-165.5, 61.5, 0.3333, 0.25],
        [-164.5, 61.5, -1.004, 0.5],
    ];
    let mut npz = NpzWriter::new(File::create(&path).unwrap());
    npz.add_array("casa_gfed_2004", &matrix).unwrap();
    npz.finish().unwrap();

    let store = DocumentStore::temporary().unwrap();
    let mut model = GridModel::open(&path, None).unwrap();
    let overrides = ConfigOverrides {
        timestamp: Some(parse_timestamp("2003-12-22T03:00:00").unwrap()),
        title: Some("CASA GFED 3-hourly".to_string()),
        ..Default::default()
    };
    GridMediator::new(&store)
        .save("casa_gfed", &mut model, &overrides, None)
        .unwrap();
    store
}

#[test]
fn test_grid_round_trip_preserves_coordinate_order() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);

    let frame = GridMediator::new(&store)
        .load("casa_gfed", &TimeQuery::all())
        .unwrap();

    assert_eq!(
        frame.coords().pairs(),
        &[(-166.5, 65.5), (-165.5, 61.5), (-164.5, 61.5)]
    );
    assert_eq!(frame.n_steps(), 2);
    assert_eq!(frame.column(0), &[0.08, 0.33, -1.0]);
    assert_eq!(frame.column(1), &[0.13, 0.25, 0.5]);

    let index = store.get(COORD_INDEX, "casa_gfed").unwrap().unwrap();
    assert_eq!(
        index["i"].as_array().unwrap().len(),
        frame.coords().len()
    );
}

#[test]
fn test_rename_preserves_metadata_and_retires_old_name() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let catalog = Catalog::new(&store);

    let before = store.get(METADATA, "casa_gfed").unwrap().unwrap();
    catalog.rename_dataset("casa_gfed", "casa_gfed_v2").unwrap();

    let mut after = store.get(METADATA, "casa_gfed_v2").unwrap().unwrap();
    // Identical content apart from the identifier itself
    assert_eq!(after["_id"], "casa_gfed_v2");
    after["_id"] = before["_id"].clone();
    assert_eq!(before, after);

    assert!(store.get(METADATA, "casa_gfed").unwrap().is_none());
    assert_eq!(store.count("casa_gfed").unwrap(), 0);
    assert!(matches!(
        GridMediator::new(&store).load("casa_gfed", &TimeQuery::all()),
        Err(flux_processor::FluxError::NotFound(_))
    ));
}

#[test]
fn test_remove_leaves_zero_residuals() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);

    Catalog::new(&store).remove_dataset("casa_gfed").unwrap();

    assert_eq!(store.count("casa_gfed").unwrap(), 0);
    for collection in flux_processor::store::RESERVED_COLLECTION_NAMES {
        for (id, _) in store.find_all(collection).unwrap() {
            assert_ne!(id, "casa_gfed");
        }
    }
}

#[test]
fn test_audit_clean_after_load() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);

    let report = Catalog::new(&store).audit().unwrap();
    assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);
    assert_eq!(report.datasets, 1);
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_stats_endpoint_strips_internal_fields() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let app = flux_processor::api::router(store, "http://localhost").unwrap();

    let (status, body) = get(app, "/casa_gfed/stats.json").await;
    assert_eq!(status, StatusCode::OK);

    assert!(body.get("_id").is_none());
    assert!(body.get("about_collection").is_none());
    assert!(body.get("tags").is_none());
    assert_eq!(body["timestamp_start"], "2003-12-22T03:00:00");
    assert_eq!(body["timestamp_end"], "2003-12-22T06:00:00");
    assert!(body["mean"].is_f64());
    assert!(body["mean_values_1std"].is_array());
}

#[tokio::test]
async fn test_json_slice_endpoint() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let app = flux_processor::api::router(store, "http://localhost").unwrap();

    let (status, body) = get(app, "/casa_gfed.json?time=2003-12-22T03:00:00").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timestamp"], "2003-12-22T03:00:00");

    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 3);
    assert_eq!(features[0]["coordinates"], serde_json::json!([-166.5, 65.5]));
    assert_eq!(features[0]["flux"], 0.08);
}

#[tokio::test]
async fn test_geojson_feature_count_matches_coordinate_index() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let index_len = store
        .get(COORD_INDEX, "casa_gfed")
        .unwrap()
        .unwrap()["i"]
        .as_array()
        .unwrap()
        .len();
    let app = flux_processor::api::router(store, "http://localhost").unwrap();

    let (status, body) = get(
        app.clone(),
        "/casa_gfed.geojson?time=2003-12-22T03:00:00&collection=features",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "FeatureCollection");

    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), index_len);
    for feature in features {
        assert_eq!(feature["geometry"]["type"], "Point");
        assert!(feature["properties"]["flux"].is_f64());
    }

    let (status, body) = get(
        app,
        "/casa_gfed.geojson?time=2003-12-22T03:00:00&collection=geometries",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "GeometryCollection");
    assert_eq!(body["geometries"].as_array().unwrap().len(), index_len);
}

#[tokio::test]
async fn test_missing_time_parameter_is_legacy_500() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let app = flux_processor::api::router(store, "http://localhost").unwrap();

    let (status, _) = get(app.clone(), "/casa_gfed.json").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = get(app, "/casa_gfed.geojson?time=").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unknown_dataset_and_timestamp_are_404() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let app = flux_processor::api::router(store, "http://localhost").unwrap();

    let (status, _) = get(app.clone(), "/nowhere/stats.json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(app, "/casa_gfed.json?time=1999-01-01T00:00:00").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
