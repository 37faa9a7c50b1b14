//! Turning the model's free-form reply into an [`AnalysisResult`].
//!
//! Extraction is deliberately lenient: everything from the first `{` to the last `}` is taken as
//! the JSON candidate, whatever surrounds it (markdown fences, preamble, trailing notes). When
//! that fails the caller still gets a usable result: the fallback below.

use crate::api::models::analysis::{AnalysisResult, SafetyLevel};

/// How much of the raw reply the fallback summary keeps, in characters.
pub const FALLBACK_SUMMARY_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The reply contained no `{ ... }` span at all
    NoJson,
    /// A brace span was found but did not deserialize into the expected shape
    Unparsable,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::NoJson => "no_json",
            FallbackReason::Unparsable => "unparsable",
        }
    }

    fn advice(&self) -> (&'static str, &'static str) {
        match self {
            FallbackReason::NoJson => ("AI가 분석하지 못했습니다.", "전문가 자문을 구하세요."),
            FallbackReason::Unparsable => ("분석 중 오류가 발생했습니다.", "다시 시도하거나 전문가에게 문의하세요."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReply {
    Structured(AnalysisResult),
    Fallback { result: AnalysisResult, reason: FallbackReason },
}

impl ParsedReply {
    pub fn into_result(self) -> AnalysisResult {
        match self {
            ParsedReply::Structured(result) | ParsedReply::Fallback { result, .. } => result,
        }
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self {
            ParsedReply::Structured(_) => None,
            ParsedReply::Fallback { reason, .. } => Some(*reason),
        }
    }
}

/// Parse a model reply. Never fails.
pub fn parse_reply(raw: &str) -> ParsedReply {
    let Some(candidate) = extract_json_object(raw) else {
        return ParsedReply::Fallback {
            result: fallback_result(raw, FallbackReason::NoJson),
            reason: FallbackReason::NoJson,
        };
    };

    match serde_json::from_str::<AnalysisResult>(candidate) {
        Ok(result) => ParsedReply::Structured(result),
        Err(e) => {
            tracing::debug!(error = %e, "Model reply did not match the analysis shape");
            ParsedReply::Fallback {
                result: fallback_result(raw, FallbackReason::Unparsable),
                reason: FallbackReason::Unparsable,
            }
        }
    }
}

/// The span from the first `{` to the last `}`, if there is one.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Degraded result: the start of the raw text as summary, a cautious verdict, fixed advice.
pub fn fallback_result(raw: &str, reason: FallbackReason) -> AnalysisResult {
    let (risk, recommendation) = reason.advice();
    AnalysisResult {
        summary: raw.chars().take(FALLBACK_SUMMARY_CHARS).collect(),
        safety_level: SafetyLevel::Caution,
        risk_factors: vec![risk.to_string()],
        recommendations: vec![recommendation.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_reply_is_returned_unchanged() {
        let raw = r#"{"summary":"ok","safetyLevel":"안전함","riskFactors":[],"recommendations":[]}"#;

        let parsed = parse_reply(raw);

        assert_eq!(
            parsed,
            ParsedReply::Structured(AnalysisResult {
                summary: "ok".to_string(),
                safety_level: SafetyLevel::Safe,
                risk_factors: vec![],
                recommendations: vec![],
            })
        );
    }

    #[test]
    fn test_json_inside_markdown_fence() {
        let raw = "분석 결과입니다.\n```json\n{\n  \"summary\": \"특약에 원상복구 범위가 과도합니다.\",\n  \"safetyLevel\": \"위험\",\n  \"riskFactors\": [\"원상복구 특약\", \"관리비 미기재\"],\n  \"recommendations\": [\"특약 삭제 요청\"]\n}\n```\n참고하세요.";

        let result = parse_reply(raw).into_result();

        assert_eq!(result.safety_level, SafetyLevel::Danger);
        assert_eq!(result.risk_factors, vec!["원상복구 특약", "관리비 미기재"]);
        assert_eq!(result.recommendations, vec!["특약 삭제 요청"]);
    }

    #[test]
    fn test_nested_objects_stay_inside_the_span() {
        let raw = r#"{"summary":"s","safetyLevel":"주의","riskFactors":["a"],"recommendations":["b"],"meta":{"pages":2}}"#;
        let parsed = parse_reply(raw);
        assert!(parsed.fallback_reason().is_none());
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let parsed = parse_reply(r#"{"summary":"s","safetyLevel":"주의"}"#);
        let result = parsed.into_result();
        assert!(result.risk_factors.is_empty());
        assert!(result.recommendations.is_empty());
    }

    #[test]
    fn test_prose_without_braces_falls_back() {
        let raw = "이 계약서는 전반적으로 무난하지만 보증금 반환 시기가 명시되어 있지 않습니다.";

        let parsed = parse_reply(raw);

        assert_eq!(parsed.fallback_reason(), Some(FallbackReason::NoJson));
        let result = parsed.into_result();
        assert_eq!(result.summary, raw);
        assert_eq!(result.safety_level, SafetyLevel::Caution);
        assert_eq!(result.risk_factors, vec!["AI가 분석하지 못했습니다."]);
        assert_eq!(result.recommendations, vec!["전문가 자문을 구하세요."]);
    }

    #[test]
    fn test_broken_json_falls_back() {
        let raw = r#"{"summary": "잘린 응답", "safetyLevel": "#;
        let raw = format!("{raw} }}");

        let parsed = parse_reply(&raw);

        assert_eq!(parsed.fallback_reason(), Some(FallbackReason::Unparsable));
        let result = parsed.into_result();
        assert_eq!(result.summary, raw);
        assert_eq!(result.risk_factors, vec!["분석 중 오류가 발생했습니다."]);
        assert_eq!(result.recommendations, vec!["다시 시도하거나 전문가에게 문의하세요."]);
    }

    #[test]
    fn test_unknown_safety_level_falls_back() {
        let raw = r#"{"summary":"s","safetyLevel":"보통","riskFactors":[],"recommendations":[]}"#;
        assert_eq!(parse_reply(raw).fallback_reason(), Some(FallbackReason::Unparsable));
    }

    #[test]
    fn test_two_objects_are_not_split_apart() {
        let raw = r#"{"summary":"a","safetyLevel":"주의"} 그리고 {"summary":"b","safetyLevel":"위험"}"#;
        assert_eq!(parse_reply(raw).fallback_reason(), Some(FallbackReason::Unparsable));
    }

    #[test]
    fn test_closing_brace_before_opening_brace() {
        assert_eq!(parse_reply("} 잘못된 순서 {").fallback_reason(), Some(FallbackReason::NoJson));
    }

    #[test]
    fn test_fallback_summary_truncates_by_character() {
        let raw = "가".repeat(FALLBACK_SUMMARY_CHARS + 50);

        let result = parse_reply(&raw).into_result();

        assert_eq!(result.summary.chars().count(), FALLBACK_SUMMARY_CHARS);
        assert_eq!(result.summary, "가".repeat(FALLBACK_SUMMARY_CHARS));
    }

    #[test]
    fn test_empty_reply_falls_back_with_empty_summary() {
        let result = parse_reply("").into_result();
        assert_eq!(result.summary, "");
        assert_eq!(result.safety_level, SafetyLevel::Caution);
    }
}
