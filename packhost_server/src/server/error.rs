use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use packhost_core::api::ErrorResponse;
use tracing::error;

use super::storage::blob::BlobError;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("database error: {0}")]
    SqlxDatabase(#[from] sqlx::Error),
    #[error("multipart error: {0}")]
    MultipartError(#[from] MultipartError),
    #[error("i/o error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("blob store error: {0}")]
    Blob(#[from] BlobError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("No file uploaded.")]
    NoFile,
    #[error("invalid filename")]
    InvalidFilename,
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::SqlxDatabase(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            ApiError::MultipartError(_) => (StatusCode::BAD_REQUEST, "MULTIPART_ERROR"),
            ApiError::IoError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            ApiError::Blob(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            ApiError::Task(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::NoFile => (StatusCode::BAD_REQUEST, "NO_FILE"),
            ApiError::InvalidFilename => (StatusCode::BAD_REQUEST, "INVALID_FILENAME"),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!("{:#?}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error: code.to_string(),
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}
