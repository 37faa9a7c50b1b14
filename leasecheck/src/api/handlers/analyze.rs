//! HTTP handler for contract analysis.

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};

use crate::AppState;
use crate::api::models::analysis::{AnalyzeResponse, FailureResponse};
use crate::errors::{Error, Result};
use crate::upload::NO_FILE_MESSAGE;

#[utoipa::path(
    post,
    path = "/api/analyze",
    tag = "analysis",
    summary = "Analyze lease contract",
    description = "Upload a lease contract (PDF, JPEG or PNG, at most 10 MB) in the `contract` field and receive a structured risk assessment.

When the model answers with something that is not the expected JSON, a cautious fallback assessment is returned instead of an error.",
    request_body(
        content_type = "multipart/form-data",
        description = "Single file field named `contract`"
    ),
    responses(
        (status = 200, description = "Assessment produced", body = AnalyzeResponse),
        (status = 400, description = "Missing, empty, oversized or unsupported file", body = FailureResponse),
        (status = 500, description = "The model call failed", body = FailureResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn analyze_contract(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>> {
    let mut multipart = multipart.map_err(|rejection| {
        tracing::debug!("Request is not a multipart upload: {}", rejection);
        Error::validation(NO_FILE_MESSAGE)
    })?;

    let document = state.uploads.receive(&mut multipart).await?;
    let analysis = state.analyzer.analyze(document).await?;

    Ok(Json(analysis.into()))
}

#[cfg(test)]
mod tests {
    use crate::analysis::gemini::InlineDocument;
    use crate::api::models::analysis::SafetyLevel;
    use crate::errors::ANALYSIS_FAILED_MESSAGE;
    use crate::test_utils::{StubModel, contract_form, create_test_app, create_test_config, stored_uploads};
    use crate::types::MediaType;
    use crate::upload::{EMPTY_FILE_MESSAGE, NO_FILE_MESSAGE, UNSUPPORTED_TYPE_MESSAGE};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::{Value, json};

    const MB: usize = 1024 * 1024;

    fn pdf_bytes(len: usize) -> Vec<u8> {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.resize(len, b'0');
        bytes
    }

    #[test_log::test(tokio::test)]
    async fn test_structured_reply_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let model = StubModel::replying(r#"{"summary":"ok","safetyLevel":"안전함","riskFactors":[],"recommendations":[]}"#);
        let app = create_test_app(create_test_config(dir.path()), model.clone()).await;

        let bytes = pdf_bytes(2 * MB);
        let response = app
            .post("/api/analyze")
            .multipart(contract_form(bytes.clone(), "lease.pdf", "application/pdf"))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(
            body,
            json!({
                "success": true,
                "analysis": {
                    "summary": "ok",
                    "safetyLevel": "안전함",
                    "riskFactors": [],
                    "recommendations": []
                }
            })
        );

        assert_eq!(model.last_document(), Some(InlineDocument::encode(MediaType::Pdf, &bytes)));
        assert!(stored_uploads(dir.path()).is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_oversized_file_is_rejected_without_storage() {
        let dir = tempfile::tempdir().unwrap();
        let model = StubModel::replying("{}");
        let app = create_test_app(create_test_config(dir.path()), model.clone()).await;

        let response = app
            .post("/api/analyze")
            .multipart(contract_form(vec![0xFF; 11 * 1000 * 1000], "scan.jpg", "image/jpeg"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "파일 크기는 10MB를 초과할 수 없습니다.");
        assert_eq!(model.calls(), 0);
        assert!(stored_uploads(dir.path()).is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_far_oversized_file_gets_the_same_message() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(create_test_config(dir.path()), StubModel::replying("{}")).await;

        let response = app
            .post("/api/analyze")
            .multipart(contract_form(vec![0; 24 * MB], "huge.pdf", "application/pdf"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "파일 크기는 10MB를 초과할 수 없습니다.");
        assert!(stored_uploads(dir.path()).is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_prose_reply_returns_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let prose = "이 계약서는 보증금 반환 조건이 모호합니다. ".repeat(20);
        let app = create_test_app(create_test_config(dir.path()), StubModel::replying(prose.clone())).await;

        let response = app
            .post("/api/analyze")
            .multipart(contract_form(pdf_bytes(4096), "lease.pdf", "application/pdf"))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        let expected_summary: String = prose.chars().take(300).collect();
        assert_eq!(body["success"], true);
        assert_eq!(body["analysis"]["summary"], expected_summary);
        assert_eq!(body["analysis"]["safetyLevel"], "주의");
        assert_eq!(body["analysis"]["riskFactors"], json!(["AI가 분석하지 못했습니다."]));
        assert_eq!(body["analysis"]["recommendations"], json!(["전문가 자문을 구하세요."]));
        assert!(stored_uploads(dir.path()).is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_model_failure_is_generic_500() {
        let dir = tempfile::tempdir().unwrap();
        let model = StubModel::failing();
        let app = create_test_app(create_test_config(dir.path()), model.clone()).await;

        let response = app
            .post("/api/analyze")
            .multipart(contract_form(b"\x89PNG\r\n\x1a\n".to_vec(), "scan.png", "image/png"))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body, json!({ "success": false, "error": ANALYSIS_FAILED_MESSAGE }));
        assert_eq!(model.calls(), 1);
        assert!(stored_uploads(dir.path()).is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_unsupported_media_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let model = StubModel::replying("{}");
        let app = create_test_app(create_test_config(dir.path()), model.clone()).await;

        let response = app
            .post("/api/analyze")
            .multipart(contract_form(b"plain text lease".to_vec(), "lease.txt", "text/plain"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body, json!({ "success": false, "error": UNSUPPORTED_TYPE_MESSAGE }));
        assert_eq!(model.calls(), 0);
        assert!(stored_uploads(dir.path()).is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_jpg_alias_is_sent_as_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let model = StubModel::replying(r#"{"summary":"사진 판독","safetyLevel":"위험","riskFactors":["등기부 확인 필요"],"recommendations":[]}"#);
        let app = create_test_app(create_test_config(dir.path()), model.clone()).await;

        let response = app
            .post("/api/analyze")
            .multipart(contract_form(vec![0xFF, 0xD8, 0xFF], "photo.jpg", "image/jpg"))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["analysis"]["safetyLevel"], "위험");
        assert_eq!(model.last_document().map(|d| d.media_type), Some(MediaType::Jpeg));
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_contract_field() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(create_test_config(dir.path()), StubModel::replying("{}")).await;

        let form = MultipartForm::new()
            .add_text("note", "no file here")
            .add_part("attachment", Part::bytes(pdf_bytes(64)).file_name("lease.pdf").mime_type("application/pdf"));
        let response = app.post("/api/analyze").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], NO_FILE_MESSAGE);
        assert!(stored_uploads(dir.path()).is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_text_contract_part_counts_as_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let model = StubModel::replying("{}");
        let app = create_test_app(create_test_config(dir.path()), model.clone()).await;

        let form = MultipartForm::new().add_text("contract", "lease.pdf");
        let response = app.post("/api/analyze").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body, json!({ "success": false, "error": NO_FILE_MESSAGE }));
        assert_eq!(model.calls(), 0);
        assert!(stored_uploads(dir.path()).is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn test_non_multipart_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_test_app(create_test_config(dir.path()), StubModel::replying("{}")).await;

        let response = app.post("/api/analyze").json(&json!({ "contract": "lease.pdf" })).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body, json!({ "success": false, "error": NO_FILE_MESSAGE }));
    }

    #[test_log::test(tokio::test)]
    async fn test_empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let model = StubModel::replying("{}");
        let app = create_test_app(create_test_config(dir.path()), model.clone()).await;

        let response = app
            .post("/api/analyze")
            .multipart(contract_form(Vec::new(), "empty.pdf", "application/pdf"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], EMPTY_FILE_MESSAGE);
        assert_eq!(model.calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_smaller_configured_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = create_test_config(dir.path());
        config.uploads.max_file_size = MB as u64;
        let app = create_test_app(config, StubModel::replying("{}")).await;

        let response = app
            .post("/api/analyze")
            .multipart(contract_form(pdf_bytes(MB + 1), "lease.pdf", "application/pdf"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "파일 크기는 1MB를 초과할 수 없습니다.");
    }

    #[test_log::test(tokio::test)]
    async fn test_file_at_exact_limit_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = create_test_config(dir.path());
        config.uploads.max_file_size = MB as u64;
        let model = StubModel::replying(r#"{"summary":"ok","safetyLevel":"주의","riskFactors":[],"recommendations":[]}"#);
        let app = create_test_app(config, model).await;

        let response = app
            .post("/api/analyze")
            .multipart(contract_form(pdf_bytes(MB), "lease.pdf", "application/pdf"))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(
            serde_json::from_value::<SafetyLevel>(body["analysis"]["safetyLevel"].clone()).unwrap(),
            SafetyLevel::Caution
        );
    }
}
