use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Overall verdict on a contract, serialized with the Korean labels the client renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SafetyLevel {
    #[serde(rename = "안전함")]
    Safe,
    #[serde(rename = "주의")]
    Caution,
    #[serde(rename = "위험")]
    Danger,
}

/// Structured assessment of a lease contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub summary: String,
    pub safety_level: SafetyLevel,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Body of a successful `POST /api/analyze`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub analysis: AnalysisResult,
}

impl From<AnalysisResult> for AnalyzeResponse {
    fn from(analysis: AnalysisResult) -> Self {
        Self { success: true, analysis }
    }
}

/// Body of every failed API response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FailureResponse {
    pub success: bool,
    pub error: String,
}

impl FailureResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}
