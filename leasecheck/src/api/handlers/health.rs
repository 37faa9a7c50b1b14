use axum::{Json, extract::State};

use crate::AppState;
use crate::api::models::health::HealthResponse;

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    summary = "Service health",
    description = "Reports that the service is up and whether a Gemini API key is configured. Never calls the model.",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        gemini_configured: state.config.gemini_configured(),
    })
}
