use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::{
    metrics::gather_metrics,
    receiver::{AlertManagerWebhook, AlertRelay},
};

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn metrics() -> Response {
    match gather_metrics() {
        Ok(body) => body.into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Always acknowledges with 200; delivery problems only show up in logs and
/// in the returned counts.
pub async fn alert_receiver(
    State(relay): State<Arc<AlertRelay>>,
    Json(payload): Json<AlertManagerWebhook>,
) -> Response {
    let summary = relay.handle(payload).await;
    (StatusCode::OK, Json(summary)).into_response()
}
