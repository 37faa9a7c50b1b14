//! Test utilities for integration testing (available with `test-utils` feature).

use crate::analysis::gemini::{GenerativeModel, InlineDocument, ModelError};
use crate::config::{Config, UploadConfig};
use async_trait::async_trait;
use axum_test::TestServer;
use axum_test::multipart::{MultipartForm, Part};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

enum StubReply {
    Text(String),
    Fail,
}

/// In-process stand-in for the generative model that records what it was asked.
pub struct StubModel {
    reply: StubReply,
    calls: AtomicUsize,
    last_call: Mutex<Option<(String, InlineDocument)>>,
}

impl StubModel {
    fn with_reply(reply: StubReply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            last_call: Mutex::new(None),
        })
    }

    /// Always answers with `text`.
    pub fn replying(text: impl Into<String>) -> Arc<Self> {
        Self::with_reply(StubReply::Text(text.into()))
    }

    /// Always fails as an overloaded upstream would.
    pub fn failing() -> Arc<Self> {
        Self::with_reply(StubReply::Fail)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_call.lock().unwrap().as_ref().map(|(prompt, _)| prompt.clone())
    }

    pub fn last_document(&self) -> Option<InlineDocument> {
        self.last_call.lock().unwrap().as_ref().map(|(_, document)| document.clone())
    }
}

#[async_trait]
impl GenerativeModel for StubModel {
    async fn generate(&self, prompt: &str, document: &InlineDocument) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_call.lock().unwrap() = Some((prompt.to_string(), document.clone()));

        match &self.reply {
            StubReply::Text(text) => Ok(text.clone()),
            StubReply::Fail => Err(ModelError::Status {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                body: "model overloaded".to_string(),
            }),
        }
    }
}

pub fn create_test_config(upload_dir: &Path) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        uploads: UploadConfig {
            dir: upload_dir.to_path_buf(),
            ..Default::default()
        },
        enable_metrics: false,
        enable_otel_export: false,
        ..Default::default()
    }
}

/// Build the full router around `model` and wrap it in a test server.
pub async fn create_test_app(config: Config, model: Arc<dyn GenerativeModel>) -> TestServer {
    let app = crate::Application::with_model(config, model)
        .await
        .expect("Failed to create application");
    app.into_test_server()
}

/// A form carrying one `contract` file part.
pub fn contract_form(bytes: Vec<u8>, file_name: &str, mime_type: &str) -> MultipartForm {
    MultipartForm::new().add_part("contract", Part::bytes(bytes).file_name(file_name).mime_type(mime_type))
}

/// Files currently sitting in the upload directory.
pub fn stored_uploads(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|entry| entry.ok().map(|e| e.path())).collect())
        .unwrap_or_default()
}
