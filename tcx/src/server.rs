use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use tcx_collector::Scraper;
use tcx_netlink::TcBackend;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Shared state for axum handlers.
struct AppState<B> {
    scraper: Scraper<B>,
}

/// The `/metrics` and `/healthz` endpoints.
pub fn router<B: TcBackend>(scraper: Scraper<B>) -> Router {
    let state = Arc::new(AppState { scraper });

    Router::new()
        .route("/metrics", get(metrics_handler::<B>))
        .route("/healthz", get(healthz_handler))
        .with_state(state)
}

/// Serve `scraper` on `addr` until `cancel` fires.
pub async fn serve<B: TcBackend>(
    scraper: Scraper<B>,
    addr: &str,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await.with_context(|| format!("listening on {addr}"))?;
    let local_addr = listener.local_addr().context("getting local address")?;

    tracing::info!(addr = %local_addr, "metrics server started");

    axum::serve(listener, router(scraper).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("serving metrics")?;

    tracing::info!("metrics server stopped");
    Ok(())
}

/// GET /metrics - runs one scrape and renders it in the Prometheus text format.
async fn metrics_handler<B: TcBackend>(
    State(state): State<Arc<AppState<B>>>,
) -> impl IntoResponse {
    let samples = state.scraper.collect().await;

    match state.scraper.registry().encode_text(&samples) {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => {
            tracing::error!(error = %e, "encoding metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "encoding error".to_string())
        }
    }
}

/// GET /healthz - Simple health check.
async fn healthz_handler() -> &'static str {
    "ok"
}
