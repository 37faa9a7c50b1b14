use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always "ok" while the process is serving requests
    pub status: String,
    /// Whether a model API key is present. No connectivity check is made.
    pub gemini_configured: bool,
}
