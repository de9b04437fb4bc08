use axum::{extract::State, http::header, response::IntoResponse};

use btcd_collector::TEXT_CONTENT_TYPE;

use crate::state::SharedState;

/// `GET /metrics`
///
/// Runs one collection cycle against the node and returns it in the
/// Prometheus text format. Upstream queries block, so the cycle runs on the
/// blocking thread pool. The response is always `200`; a failed cycle shows
/// up as `btcd_up 0`.
pub async fn metrics(State(state): State<SharedState>) -> impl IntoResponse {
    let registry = state.metrics.clone();
    let body = match tokio::task::spawn_blocking(move || registry.gather_text()).await {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "metrics collection task failed");
            String::new()
        }
    };

    ([(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], body)
}
