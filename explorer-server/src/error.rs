use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use explorer_engine::ExplorerError;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ApiSuccess<T> {
    pub status: String,
    pub data: T,
}

impl<T> ApiSuccess<T> {
    pub fn new(data: T) -> Json<Self> {
        Json(Self {
            status: "success".to_string(),
            data,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub status: String,
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
}

/// Error half of the response envelope, with the HTTP status to send.
#[derive(Debug)]
pub struct ApiErrorResponse {
    pub status: StatusCode,
    pub error: ApiError,
}

impl ApiErrorResponse {
    pub fn new(status: StatusCode, error_type: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            error: ApiError {
                status: "error".to_string(),
                error: ErrorDetails {
                    message: message.into(),
                    error_type: error_type.to_string(),
                },
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BadRequest", message)
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<ExplorerError> for ApiErrorResponse {
    fn from(err: ExplorerError) -> Self {
        let status = match &err {
            ExplorerError::SessionNotFound { .. } | ExplorerError::MissingPrerequisite { .. } => {
                StatusCode::NOT_FOUND
            }
            ExplorerError::Parse { .. }
            | ExplorerError::UnknownColumn { .. }
            | ExplorerError::DuplicateColumn { .. }
            | ExplorerError::ColumnType { .. }
            | ExplorerError::EmptySelection { .. }
            | ExplorerError::Config { .. } => StatusCode::BAD_REQUEST,
            ExplorerError::SchemaMismatch { .. }
            | ExplorerError::Chart { .. }
            | ExplorerError::Arrow(_)
            | ExplorerError::Io { .. }
            | ExplorerError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", err);
        }

        Self::new(status, err.kind(), err.to_string())
    }
}

impl From<String> for ApiErrorResponse {
    fn from(message: String) -> Self {
        Self::bad_request(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_status_codes() {
        let missing = ApiErrorResponse::from(ExplorerError::SessionNotFound {
            session_id: "abc".to_string(),
        });
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
        assert_eq!(missing.error.error.error_type, "SessionNotFound");

        let column = ApiErrorResponse::from(ExplorerError::UnknownColumn {
            column: "x".to_string(),
        });
        assert_eq!(column.status, StatusCode::BAD_REQUEST);

        let internal = ApiErrorResponse::from(ExplorerError::Internal {
            message: "boom".to_string(),
        });
        assert_eq!(internal.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
