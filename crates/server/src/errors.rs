use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use boxvision::SkillError;
use serde_json::json;
use tracing::error;

/// A custom error type for the server application.
///
/// This enum encapsulates the errors a handler can return, allowing them to
/// be converted into appropriate HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Errors originating from the `boxvision` pipeline.
    Skill(SkillError),
    /// Generic internal server errors.
    Internal(anyhow::Error),
}

/// Conversion from `SkillError` to `AppError`.
impl From<SkillError> for AppError {
    fn from(err: SkillError) -> Self {
        AppError::Skill(err)
    }
}

/// Conversion from `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match self {
            AppError::Skill(err) => {
                error!("SkillError: {:?}", err);
                match &err {
                    SkillError::MalformedEvent(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                    SkillError::FileTooLarge { .. } => {
                        (StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
                    }
                    SkillError::MissingStorageConnector | SkillError::MissingAnnotationService => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Server is not configured correctly.".to_string(),
                    ),
                    upstream if upstream.is_upstream() => {
                        (StatusCode::BAD_GATEWAY, err.to_string())
                    }
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
                }
            }
            AppError::Internal(err) => {
                error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status_code, body).into_response()
    }
}
