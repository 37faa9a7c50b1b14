//! Contract analysis: from a stored upload to an [`AnalysisResult`].
//!
//! [`Analyzer::analyze`] takes ownership of an [`UploadedDocument`], sends it to the configured
//! [`GenerativeModel`] with the fixed review prompt, parses the reply (falling back to a degraded
//! result when the reply is not usable JSON) and removes the stored file on every path.
//!
//! - [`gemini`]: the model seam and its Gemini implementation
//! - [`parse`]: lenient JSON extraction and the fallback result
//! - [`prompt`]: the review instruction

pub mod gemini;
pub mod parse;
pub mod prompt;

use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::api::models::analysis::AnalysisResult;
use crate::errors::Result;
use crate::upload::UploadedDocument;
use gemini::{GenerativeModel, InlineDocument};
use parse::{ParsedReply, parse_reply};

/// Runs the analysis pipeline against an injected model.
#[derive(Clone)]
pub struct Analyzer {
    model: Arc<dyn GenerativeModel>,
}

impl Analyzer {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    /// Analyze a stored contract. The document is removed before this returns, whatever the outcome.
    #[instrument(skip_all, fields(media_type = %document.media_type(), size = document.size()))]
    pub async fn analyze(&self, document: UploadedDocument) -> Result<AnalysisResult> {
        let outcome = self.run(&document).await;

        let path = document.path().to_path_buf();
        if let Err(e) = document.remove().await {
            tracing::error!(path = %path.display(), error = %e, "Failed to remove transient upload");
        }

        let outcome_label = match &outcome {
            Ok(ParsedReply::Structured(_)) => "parsed",
            Ok(ParsedReply::Fallback { .. }) => "fallback",
            Err(_) => "failed",
        };
        metrics::counter!("leasecheck_analyses_total", "outcome" => outcome_label).increment(1);

        outcome.map(ParsedReply::into_result)
    }

    async fn run(&self, document: &UploadedDocument) -> Result<ParsedReply> {
        let bytes = document.read().await.context("reading stored upload")?;
        let inline = InlineDocument::encode(document.media_type(), &bytes);

        let started = Instant::now();
        let reply = self.model.generate(prompt::CONTRACT_REVIEW_PROMPT, &inline).await;
        metrics::histogram!("leasecheck_model_call_duration_seconds").record(started.elapsed().as_secs_f64());
        let text = reply?;

        let parsed = parse_reply(&text);
        match parsed.fallback_reason() {
            None => info!(reply_chars = text.chars().count(), "Model reply parsed"),
            Some(reason) => warn!(
                reason = reason.as_str(),
                reply_chars = text.chars().count(),
                "Model reply was not usable JSON, returning fallback result"
            ),
        }

        Ok(parsed)
    }
}
