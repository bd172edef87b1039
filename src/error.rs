// Error types for the HTTP surface.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::quota::{QuotaClass, QuotaRecord};
use crate::upstream::UpstreamError;

#[derive(Error, Debug)]
pub enum AppError {
    // Login with the wrong password
    #[error("Incorrect password.")]
    InvalidPassword,

    // Token is not (or no longer) in the session store
    #[error("Session is invalid or has expired. Please log in again.")]
    InvalidSession,

    // Free or premium limit reached; carries the usage snapshot
    #[error("usage limit reached for {} tier", .0.class.as_str())]
    QuotaExceeded(QuotaRecord),

    #[error("Prompt is required.")]
    MissingPrompt,

    // Details are logged, never returned to the caller
    #[error("upstream generation failed: {0}")]
    Upstream(#[from] UpstreamError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidPassword | AppError::InvalidSession => StatusCode::UNAUTHORIZED,
            AppError::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::MissingPrompt => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidPassword => "INVALID_PASSWORD",
            AppError::InvalidSession => "INVALID_SESSION",
            AppError::QuotaExceeded(usage) => match usage.class {
                QuotaClass::Free => "FREE_USAGE_EXCEEDED",
                QuotaClass::Premium => "PREMIUM_USAGE_EXCEEDED",
            },
            AppError::MissingPrompt => "MISSING_PROMPT",
            AppError::Upstream(_) => "GENERATION_FAILED",
        }
    }

    // Message safe to show to the caller
    fn public_message(&self) -> String {
        match self {
            AppError::QuotaExceeded(usage) => match usage.class {
                QuotaClass::Free => {
                    "Free usage completed. Please enter password to continue.".to_string()
                }
                QuotaClass::Premium => "Today's usage limit has been reached.".to_string(),
            },
            AppError::Upstream(_) => "Failed to generate phrases.".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Upstream(ref e) = self {
            error!(error = %e, "phrase generation failed");
        }

        let mut body = json!({
            "error": self.public_message(),
            "code": self.code(),
        });
        if let AppError::QuotaExceeded(usage) = &self {
            body["usage"] = json!(usage);
        }

        (self.status_code(), Json(body)).into_response()
    }
}
