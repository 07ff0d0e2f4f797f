use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use koe_services::BatchError;
use koe_services::dao::DaoError;
use koe_services::storage::StorageError;
use koe_transcription::{ConfigurationError, RecognitionError, RecognitionErrorKind};
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        };

        if status.is_server_error() {
            tracing::error!(%message, "Request failed");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DaoError> for ApiError {
    fn from(err: DaoError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<ConfigurationError> for ApiError {
    fn from(err: ConfigurationError) -> Self {
        match err {
            ConfigurationError::UnknownProvider(name) => ApiError::BadRequest(format!(
                "Unsupported provider: {name}. Supported: {}",
                koe_transcription::ProviderRegistry::supported().join(", ")
            )),
            ConfigurationError::MissingCredentials { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<RecognitionError> for ApiError {
    fn from(err: RecognitionError) -> Self {
        match err.kind {
            RecognitionErrorKind::NoMatch => {
                ApiError::BadRequest(format!("Speech could not be recognized: {}", err.message))
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Validation(msg) => ApiError::BadRequest(msg),
            BatchError::Configuration(e) => e.into(),
            BatchError::Resolution(e) => e.into(),
        }
    }
}
