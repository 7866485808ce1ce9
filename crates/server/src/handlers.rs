use super::{errors::AppError, state::AppState};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use boxvision::{InvocationResponse, SkillError, WebhookEvent};
use tracing::info;

/// The root handler.
pub async fn root() -> &'static str {
    "boxvision server is running."
}

/// The health check handler.
pub async fn health_check() -> &'static str {
    "OK"
}

/// The handler for the `/invoke` endpoint.
///
/// Accepts a serverless-style event whose `body` is the webhook payload
/// encoded as a JSON string. An envelope that does not deserialize is a
/// malformed event like any other.
pub async fn invoke_handler(
    State(app_state): State<AppState>,
    payload: Result<Json<WebhookEvent>, JsonRejection>,
) -> Result<Json<InvocationResponse>, AppError> {
    let Json(event) =
        payload.map_err(|rejection| SkillError::MalformedEvent(rejection.body_text()))?;
    info!("Received invocation event ({} bytes).", event.body.len());

    let response = app_state.pipeline.handle_event(&event).await?;
    Ok(Json(response))
}

/// The handler for the `/webhook` endpoint.
///
/// Accepts the raw webhook delivery and wraps it into a `WebhookEvent`.
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<InvocationResponse>, AppError> {
    let delivery_id = headers
        .get("box-delivery-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    info!(delivery_id, "Received webhook delivery.");

    let response = app_state
        .pipeline
        .handle_event(&WebhookEvent::new(body))
        .await?;
    Ok(Json(response))
}
