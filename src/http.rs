//! HTTP server for the scrape endpoint.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::publisher::{MetricsPublisher, OPENMETRICS_CONTENT_TYPE};

/// Create the HTTP router.
pub fn create_router(publisher: MetricsPublisher) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(publisher)
}

async fn metrics_handler(State(publisher): State<MetricsPublisher>) -> Response {
    match publisher.render() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("failed to encode metrics: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Serve the scrape endpoint on an already bound listener until the process exits.
pub async fn serve(listener: TcpListener, publisher: MetricsPublisher) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(addr = %addr, "scrape endpoint listening on /metrics");

    axum::serve(listener, create_router(publisher))
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))
}
