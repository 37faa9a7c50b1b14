//! Contract upload handling.
//!
//! [`UploadStore::receive`] pulls the `contract` field out of a multipart request, checks its
//! declared media type before reading a single byte, enforces the size limit while chunks stream
//! in, and only then writes the file to transient storage. The returned [`UploadedDocument`] owns
//! the stored file: it is removed explicitly by the consumer, and on drop if that never happens.

use anyhow::Context;
use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use rand::prelude::RngExt;
use rand::rng;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::UploadConfig;
use crate::errors::{Error, Result};
use crate::types::MediaType;

/// Multipart field carrying the contract file
pub const CONTRACT_FIELD: &str = "contract";

pub const NO_FILE_MESSAGE: &str = "파일이 업로드되지 않았습니다.";
pub const UNSUPPORTED_TYPE_MESSAGE: &str = "지원하지 않는 파일 형식입니다.";
pub const EMPTY_FILE_MESSAGE: &str = "빈 파일은 분석할 수 없습니다.";

const MAX_NAME_CHARS: usize = 100;

/// A contract file sitting in transient storage for the duration of one request.
#[derive(Debug)]
pub struct UploadedDocument {
    path: PathBuf,
    media_type: MediaType,
    size: u64,
    original_name: String,
    removed: bool,
}

impl UploadedDocument {
    /// Take ownership of a file that is already on disk.
    pub fn adopt(path: impl Into<PathBuf>, media_type: MediaType, size: u64, original_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            media_type,
            size,
            original_name: original_name.into(),
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }

    /// Delete the stored file. A file that is already gone counts as removed.
    pub async fn remove(mut self) -> io::Result<()> {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for UploadedDocument {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        // Blocking remove: only reached on cancellation or error paths, never per request.
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed transient upload on drop"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove transient upload"),
        }
    }
}

/// Validates uploads and writes them to the transient directory.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_file_size: u64,
}

impl UploadStore {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            max_file_size: config.max_file_size,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the transient directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating upload directory {}", self.dir.display()))
    }

    pub fn too_large_message(&self) -> String {
        format!("파일 크기는 {}MB를 초과할 수 없습니다.", self.max_file_size.div_ceil(1024 * 1024))
    }

    fn too_large(&self) -> Error {
        metrics::counter!("leasecheck_uploads_rejected_total", "reason" => "size").increment(1);
        Error::validation(self.too_large_message())
    }

    fn multipart_error(&self, e: MultipartError) -> Error {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return self.too_large();
        }
        metrics::counter!("leasecheck_uploads_rejected_total", "reason" => "malformed").increment(1);
        Error::validation(format!("업로드 데이터를 읽을 수 없습니다: {}", e.body_text()))
    }

    /// Type filter, applied to the declared content type before anything is read or stored.
    pub fn check_media_type(&self, declared: Option<&str>) -> Result<MediaType> {
        declared.unwrap_or_default().parse::<MediaType>().map_err(|e| {
            debug!(error = %e, "Rejecting upload");
            metrics::counter!("leasecheck_uploads_rejected_total", "reason" => "media_type").increment(1);
            Error::validation(UNSUPPORTED_TYPE_MESSAGE)
        })
    }

    /// Read the `contract` field from a multipart request and store it.
    pub async fn receive(&self, multipart: &mut Multipart) -> Result<UploadedDocument> {
        let mut received: Option<(String, MediaType, Bytes)> = None;

        while let Some(mut field) = multipart.next_field().await.map_err(|e| self.multipart_error(e))? {
            if field.name() != Some(CONTRACT_FIELD) || received.is_some() {
                // Ignore unrelated fields and any repeated contract field
                continue;
            }
            if field.file_name().is_none() {
                debug!("Ignoring non-file `contract` part");
                continue;
            }

            let media_type = self.check_media_type(field.content_type())?;
            let original_name = field.file_name().unwrap_or(CONTRACT_FIELD).to_string();

            let mut bytes = BytesMut::new();
            while let Some(chunk) = field.chunk().await.map_err(|e| self.multipart_error(e))? {
                if (bytes.len() + chunk.len()) as u64 > self.max_file_size {
                    warn!(
                        filename = %original_name,
                        received = bytes.len() + chunk.len(),
                        max_file_size = self.max_file_size,
                        "File size limit exceeded, aborting upload"
                    );
                    return Err(self.too_large());
                }
                bytes.extend_from_slice(&chunk);
            }

            received = Some((original_name, media_type, bytes.freeze()));
        }

        let Some((original_name, media_type, bytes)) = received else {
            metrics::counter!("leasecheck_uploads_rejected_total", "reason" => "missing").increment(1);
            return Err(Error::validation(NO_FILE_MESSAGE));
        };

        if bytes.is_empty() {
            metrics::counter!("leasecheck_uploads_rejected_total", "reason" => "empty").increment(1);
            return Err(Error::validation(EMPTY_FILE_MESSAGE));
        }

        self.persist(&original_name, media_type, &bytes).await
    }

    /// Write already-validated bytes under a collision-free name.
    pub async fn persist(&self, original_name: &str, media_type: MediaType, bytes: &[u8]) -> Result<UploadedDocument> {
        let path = self.dir.join(unique_file_name(original_name));
        let document = write_document(path, media_type, bytes, original_name).await?;

        info!(
            path = %document.path().display(),
            media_type = %media_type,
            size = bytes.len(),
            "Stored contract upload"
        );

        Ok(document)
    }
}

/// Write `bytes` to `path` with the guard already in place, so a failed write leaves nothing behind.
async fn write_document(path: PathBuf, media_type: MediaType, bytes: &[u8], original_name: &str) -> Result<UploadedDocument> {
    let document = UploadedDocument::adopt(path, media_type, bytes.len() as u64, original_name);

    tokio::fs::write(document.path(), bytes)
        .await
        .with_context(|| format!("writing upload to {}", document.path().display()))?;

    Ok(document)
}

/// `<unix millis>-<random suffix>-<sanitized name>`, unique across concurrent requests.
pub fn unique_file_name(original_name: &str) -> String {
    let suffix = rng().random_range(0..1_000_000_000u32);
    format!("{}-{}-{}", Utc::now().timestamp_millis(), suffix, sanitize_file_name(original_name))
}

/// Reduce a client-supplied name to a single safe path component.
pub fn sanitize_file_name(original_name: &str) -> String {
    let base = original_name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .take(MAX_NAME_CHARS)
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        CONTRACT_FIELD.to_string()
    } else {
        cleaned.to_string()
    }
}
