//! HTTP scrape surface.
//!
//! Serves the registry in the Prometheus text format on `/metrics`. The
//! handler only reads the gauges; refresh problems show up as stale or
//! missing series, never as HTTP errors.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::metrics::CheckGauges;

const LANDING_PAGE: &str = "AWS Trusted Advisor exporter\n\nMetrics are served on /metrics\n";

pub fn router(gauges: CheckGauges) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(gauges)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    gauges: CheckGauges,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Serving metrics on /metrics");

    axum::serve(listener, router(gauges))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn landing() -> &'static str {
    LANDING_PAGE
}

async fn metrics(State(gauges): State<CheckGauges>) -> Response {
    match gauges.encode() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
