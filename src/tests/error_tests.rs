#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::io;

    use crate::error::{validation, AppError};
    use crate::scanner::ScanError;
    use crate::worker::WorkerError;

    #[test]
    fn test_app_error_display() {
        let error = AppError::BadRequest("Invalid input".to_string());
        assert_eq!(format!("{}", error), "Bad request: Invalid input");

        let error = AppError::NotFound("Resource not found".to_string());
        assert_eq!(format!("{}", error), "Not found: Resource not found");

        let error = AppError::Worker("task failed: boom".to_string());
        assert_eq!(format!("{}", error), "Worker error: task failed: boom");
    }

    #[test]
    fn test_app_error_into_response() {
        let cases = [
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::ServiceUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Scanner("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Worker("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::IoError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_error_envelope() {
        let error = AppError::ValidationError { field: "size".into(), message: "too big".into() };
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["details"]["field"], "size");
        assert_eq!(json["status"], 400);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_from_io_error() {
        let app_error: AppError = io::Error::new(io::ErrorKind::NotFound, "File not found").into();
        assert!(matches!(app_error, AppError::NotFound(_)));

        let app_error: AppError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        match app_error {
            AppError::IoError(msg) => assert!(msg.contains("denied")),
            other => panic!("Expected IoError variant, got {:?}", other),
        }
    }

    #[test]
    fn test_from_scan_error() {
        let app_error: AppError = ScanError::NotFound("2019".into()).into();
        match app_error {
            AppError::NotFound(msg) => assert!(msg.contains("2019")),
            other => panic!("Expected NotFound, got {:?}", other),
        }

        let app_error: AppError = ScanError::InvalidPath("../x escapes the image root".into()).into();
        assert!(matches!(app_error, AppError::ValidationError { ref field, .. } if field == "path"));

        let app_error: AppError = ScanError::NotADirectory("a.jpg".into()).into();
        assert!(matches!(app_error, AppError::Scanner(_)));
    }

    #[test]
    fn test_from_worker_and_sqlx_errors() {
        let app_error: AppError = WorkerError::EmptyReply.into();
        assert!(matches!(app_error, AppError::Worker(_)));

        let app_error: AppError = WorkerError::NotFound("directory not found: 2019".into()).into();
        assert_eq!(app_error.status(), StatusCode::NOT_FOUND);

        let app_error: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(app_error, AppError::NotFound(_)));

        let app_error: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(app_error, AppError::ServiceUnavailable(_)));

        let app_error: AppError = anyhow::anyhow!("boom").into();
        assert!(matches!(app_error, AppError::Internal(_)));
    }

    #[test]
    fn test_validate_path() {
        assert!(validation::validate_path("2019/summer").is_ok());
        assert!(validation::validate_path("").is_ok());

        match validation::validate_path("path\0with\0null").unwrap_err() {
            AppError::ValidationError { field, message } => {
                assert_eq!(field, "path");
                assert_eq!(message, "Path contains null characters");
            }
            other => panic!("Expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_thumbnail_size() {
        assert!(validation::validate_thumbnail_size(1).is_ok());
        assert!(validation::validate_thumbnail_size(4096).is_ok());
        assert!(validation::validate_thumbnail_size(0).is_err());
        assert!(validation::validate_thumbnail_size(4097).is_err());
    }
}
