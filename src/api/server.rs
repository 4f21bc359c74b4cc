//! Read API server assembly.

use std::net::SocketAddr;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::handlers;
use crate::error::{FluxError, Result};
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct ApiState {
    pub store: DocumentStore,
}

/// Builds the API router: per-dataset stats, time-sliced JSON, and GeoJSON.
/// Every response carries a CORS allow-origin header for the configured host.
pub fn router(store: DocumentStore, cors_host: &str) -> Result<Router> {
    let origin: HeaderValue = cors_host.parse().map_err(|_| {
        FluxError::Configuration(format!("invalid CORS host '{}'", cors_host))
    })?;

    Ok(Router::new()
        .route("/:dataset/stats.json", get(handlers::dataset_stats))
        .route("/:resource", get(handlers::dataset_slice))
        .layer(CorsLayer::new().allow_origin(origin))
        .with_state(ApiState { store }))
}

pub async fn serve(store: DocumentStore, listen: &str, cors_host: &str) -> Result<()> {
    let app = router(store, cors_host)?;
    let addr: SocketAddr = listen
        .parse()
        .map_err(|_| FluxError::Configuration(format!("invalid listen address '{}'", listen)))?;

    tracing::info!("read API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
