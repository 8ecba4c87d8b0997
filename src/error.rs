//! Error handler for passgate.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use validator::ValidationErrors;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid JSON in request body")]
    Body(#[from] JsonRejection),

    #[error("Please wait {0} seconds before requesting again")]
    RateLimited(u64),

    #[error("Username required")]
    MissingUsername,

    #[error("No secure word found. Please start over.")]
    MissingChallenge,

    #[error("Secure word has expired. Please start over.")]
    ChallengeExpired,

    #[error("Invalid secure word")]
    WrongSecureWord,

    #[error("Invalid password")]
    WrongPassword,

    #[error("Invalid token")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Token username mismatch")]
    TokenMismatch,

    #[error("Account locked due to too many failed attempts")]
    Locked,

    #[error("Invalid MFA code. {0} attempts remaining.")]
    WrongCode(u8),

    #[error("system clock error")]
    Time(#[from] std::time::SystemTimeError),

    #[error("internal server error, {details}")]
    Internal { details: String },
}

/// First human-readable message carried by the failed checks.
fn validation_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|issues| issues.iter())
        .filter_map(|issue| issue.message.as_ref().map(ToString::to_string))
        .next()
        .unwrap_or_else(|| "Validation error".to_owned())
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Token(_) | Self::TokenMismatch => StatusCode::UNAUTHORIZED,
            Self::Locked => StatusCode::LOCKED,
            Self::Time(_) | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };

        // internal details are logged, never returned to the caller.
        let message = match &self {
            Self::Validation(errors) => validation_message(errors),
            Self::Time(err) => {
                tracing::error!(error = %err, "server returned 500 status");
                "Internal server error".to_owned()
            }
            Self::Internal { details } => {
                tracing::error!(%details, "server returned 500 status");
                "Internal server error".to_owned()
            }
            _ => self.to_string(),
        };

        let mut body = serde_json::json!({ "error": message });
        if let Self::WrongCode(remaining) = &self {
            body["remainingAttempts"] = serde_json::json!(remaining);
        }

        (status, axum::Json(body)).into_response()
    }
}
