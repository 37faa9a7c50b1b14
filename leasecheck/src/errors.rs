use crate::analysis::gemini::ModelError;
use crate::api::models::analysis::FailureResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

/// Message shown to the client for every downstream failure, whatever the cause.
pub const ANALYSIS_FAILED_MESSAGE: &str = "분석 중 오류가 발생했습니다.";

#[derive(ThisError, Debug)]
pub enum Error {
    /// Missing, oversized, empty or wrongly typed upload
    #[error("{message}")]
    Validation { message: String },

    /// The generative model call failed for any reason
    #[error("Contract analysis failed: {source}")]
    Analysis {
        #[source]
        source: ModelError,
    },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation { message: message.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::Analysis { .. } | Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { message } => message.clone(),
            Error::Analysis { .. } | Error::Internal { .. } | Error::Other(_) => ANALYSIS_FAILED_MESSAGE.to_string(),
        }
    }
}

impl From<ModelError> for Error {
    fn from(source: ModelError) -> Self {
        Error::Analysis { source }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Analysis { .. } | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Validation { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = FailureResponse::new(self.user_message());
        (status, Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
