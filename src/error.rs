use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const NO_PROFILE_MESSAGE: &str =
    "Please complete the movie survey first to get personalized recommendations";

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Likelihood check attempted before the survey was completed
    #[error("{}", NO_PROFILE_MESSAGE)]
    NoProfile,

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Text encoder error: {0}")]
    Encoder(String),

    #[error("Language model error: {0}")]
    LanguageModel(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::NoProfile => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            AppError::VectorStore(_)
            | AppError::Encoder(_)
            | AppError::LanguageModel(_)
            | AppError::HttpClient(_) => {
                tracing::error!(error = %self, "Dependency failure");
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::Internal(_) => {
                tracing::error!(error = %self, "Internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
