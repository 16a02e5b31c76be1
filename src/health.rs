//! Liveness and readiness probes

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use axum_server::Handle;
use tracing::info;

use crate::proxy::Proxy;
use crate::{Error, Result};

/// Body returned by `/readyz` before the proxy is ready
pub const NOT_READY: &str = "proxy not yet configured";

/// Build the probe router
pub fn health_router(proxy: Arc<dyn Proxy>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz))
        .with_state(proxy)
}

async fn readyz(State(proxy): State<Arc<dyn Proxy>>) -> (StatusCode, &'static str) {
    if proxy.is_ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, NOT_READY)
    }
}

/// Serve probes on plain HTTP until `handle` shuts the server down
pub async fn serve(addr: SocketAddr, proxy: Arc<dyn Proxy>, handle: Handle) -> Result<()> {
    info!(addr = %addr, "Starting health probe server");
    axum_server::bind(addr)
        .handle(handle)
        .serve(health_router(proxy).into_make_service())
        .await
        .map_err(|e| Error::internal(format!("health probe server error: {}", e)))
}
