//! fleetwatch -- anomaly decision engine for vehicle fleet telemetry.
//!
//! Per-record feature vectors go through three independent detectors (fuel
//! theft rules, a two-sigma emission check, and an isolation forest) whose
//! verdicts are merged into one severity. A separate daily path flags
//! excessive idling per device.

pub mod api;
pub mod config;
pub mod detect;
pub mod params;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::detect::engine::AnomalyEngine;
use crate::params::ParameterStore;

/// Engine backed by a lazily loaded store over `model_dir`.
pub fn build_engine(model_dir: &Path) -> AnomalyEngine {
    AnomalyEngine::new(Arc::new(ParameterStore::new(model_dir)))
}

/// Start the HTTP API. Artifacts are loaded eagerly so a broken deployment
/// fails at startup rather than on the first request.
pub async fn serve(bind: &str, model_dir: &Path) -> Result<()> {
    tracing::info!(model_dir = %model_dir.display(), "Loading detection parameters");
    let engine = build_engine(model_dir);
    let store_engine = engine.clone();
    tokio::task::spawn_blocking(move || store_engine.store().get().map(|_| ())).await??;

    let addr: std::net::SocketAddr = bind.parse()?;
    let app = api::router(api::state::AppState { engine });

    tracing::info!(%addr, "fleetwatch listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
