use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::error::Error;
use std::fmt;

use crate::scanner::ScanError;
use crate::worker::WorkerError;

/// Error returned by gallery handlers and the services behind them.
///
/// Every variant renders as the same JSON envelope
/// `{error: {code, message, details?}, status, timestamp}`.
#[derive(Debug)]
pub enum AppError {
    /// Unexpected failure; the client only sees an error id.
    Internal(anyhow::Error),
    BadRequest(String),
    /// Missing image directory, photo or catalog row.
    NotFound(String),
    /// Catalog pool exhausted or not reachable.
    ServiceUnavailable(String),
    /// Catalog query or transaction failure.
    Database(String),
    InvalidInput(String),
    /// Directory could not be read from disk.
    Scanner(String),
    /// Scan or render task returned an error or no reply.
    Worker(String),
    ValidationError { field: String, message: String },
    IoError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::InvalidInput(_) | AppError::ValidationError { .. } => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_)
            | AppError::Database(_)
            | AppError::Scanner(_)
            | AppError::Worker(_)
            | AppError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::Scanner(_) => "SCANNER_ERROR",
            AppError::Worker(_) => "WORKER_ERROR",
            AppError::ValidationError { .. } => "VALIDATION_ERROR",
            AppError::IoError(_) => "IO_ERROR",
        }
    }

    /// Message and optional details for the response body. Server-side
    /// failures are logged here and reduced to a generic message.
    fn public_parts(self) -> (String, Option<Value>) {
        match self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "internal error: {:?}", e);
                ("An internal server error occurred".into(), Some(json!({ "error_id": error_id.to_string() })))
            }
            AppError::Database(msg) => {
                tracing::error!("catalog error: {}", msg);
                ("A database error occurred".into(), Some(json!({ "details": msg })))
            }
            AppError::IoError(msg) => {
                tracing::error!("io error: {}", msg);
                ("An I/O error occurred".into(), Some(json!({ "details": msg })))
            }
            AppError::Scanner(msg) | AppError::Worker(msg) => {
                tracing::warn!("{}", msg);
                (msg, None)
            }
            AppError::ValidationError { field, message } => (
                format!("Validation failed for field '{}'", field),
                Some(json!({ "field": field, "message": message })),
            ),
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::ServiceUnavailable(msg)
            | AppError::InvalidInput(msg) => (msg, None),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::Scanner(msg) => write!(f, "Scanner error: {}", msg),
            AppError::Worker(msg) => write!(f, "Worker error: {}", msg),
            AppError::ValidationError { field, message } => {
                write!(f, "Validation error on field '{}': {}", field, message)
            }
            AppError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let (message, details) = self.public_parts();

        let mut body = json!({
            "error": { "code": code, "message": message },
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if let Some(details) = details {
            body["error"]["details"] = details;
        }
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
            sqlx::Error::PoolTimedOut => {
                AppError::ServiceUnavailable("Database connection pool timed out".to_string())
            }
            _ => AppError::Database(format!("Database error: {}", err)),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            return AppError::NotFound(err.to_string());
        }
        AppError::IoError(format!("{}: {}", err.kind(), err))
    }
}

impl From<ScanError> for AppError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::NotFound(path) => AppError::NotFound(format!("Directory not found: {}", path)),
            ScanError::InvalidPath(msg) => AppError::ValidationError {
                field: "path".to_string(),
                message: msg,
            },
            other => AppError::Scanner(other.to_string()),
        }
    }
}

impl From<WorkerError> for AppError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::NotFound(msg) => AppError::NotFound(msg),
            other => AppError::Worker(other.to_string()),
        }
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// Helpers for request validation.
pub mod validation {
    use super::*;

    /// Rejects empty size values and sizes beyond what a thumbnail needs.
    pub fn validate_thumbnail_size(size: u32) -> AppResult<()> {
        if size == 0 || size > 4096 {
            return Err(AppError::ValidationError {
                field: "size".to_string(),
                message: format!("Size must be in 1..=4096, got {}", size),
            });
        }
        Ok(())
    }

    /// Rejects paths containing null characters.
    pub fn validate_path(path: &str) -> AppResult<()> {
        if path.contains('\0') {
            return Err(AppError::ValidationError {
                field: "path".to_string(),
                message: "Path contains null characters".to_string(),
            });
        }
        Ok(())
    }
}
