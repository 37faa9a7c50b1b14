//! Instruction sent alongside every contract.

/// Asks for a tenant-side review of the attached lease contract in the exact JSON shape of
/// [`crate::api::models::analysis::AnalysisResult`].
pub const CONTRACT_REVIEW_PROMPT: &str = r#"당신은 부동산 전문 변호사입니다. 첨부된 임대차 계약서를 임차인의 입장에서 검토하고 위험 요소를 분석해주세요.
반드시 아래 JSON 형식으로만 응답해주세요:
{
    "summary": "계약서 요약",
    "safetyLevel": "안전함|주의|위험",
    "riskFactors": ["위험요소1", "위험요소2"],
    "recommendations": ["개선사항1", "개선사항2"]
}"#;
