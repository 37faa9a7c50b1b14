//! OpenAPI documentation for the `/api/*` endpoints, served as JSON at `/api/openapi.json` and
//! rendered with Scalar at `/api/docs`.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "leasecheck",
        description = "Upload a residential lease contract and receive an AI-generated risk assessment.

Assessments are informational only and are not legal advice."
    ),
    paths(
        api::handlers::analyze::analyze_contract,
        api::handlers::health::health,
    ),
    components(schemas(
        api::models::analysis::AnalysisResult,
        api::models::analysis::SafetyLevel,
        api::models::analysis::AnalyzeResponse,
        api::models::analysis::FailureResponse,
        api::models::health::HealthResponse,
    )),
    tags(
        (name = "analysis", description = "Contract upload and assessment"),
        (name = "health", description = "Service status"),
    )
)]
pub struct ApiDoc;
