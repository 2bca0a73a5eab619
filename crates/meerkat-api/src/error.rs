use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Request-fatal error taxonomy. Every variant maps to exactly one HTTP
/// status; nothing here is retried locally.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid or expired session token")]
    InvalidToken,

    #[error("forbidden")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("too many requests")]
    RateLimited,

    #[error("internal error")]
    Internal(anyhow::Error),
}

/// Duplicate-key races slip past the handlers' exists checks; the UNIQUE
/// constraint is the backstop, and it reports as a Conflict like the
/// checks do, not as an internal error.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(rusqlite::Error::SqliteFailure(code, _)) = err.downcast_ref::<rusqlite::Error>()
        {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                return ApiError::Conflict("resource already exists".into());
            }
        }
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidCredentials | ApiError::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // The underlying cause stays in the log; the body only carries the
        // display string, which never includes hashes or confirmation codes.
        if let ApiError::Internal(source) = &self {
            error!("internal error: {source:#}");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn each_variant_maps_to_its_status() {
        assert_eq!(status_of(ApiError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ApiError::InvalidToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ApiError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_of(ApiError::NotFound("board")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ApiError::Conflict("username is already taken".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Validation("password too short".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ApiError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            status_of(ApiError::Internal(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unique_constraint_violation_becomes_conflict() {
        let sqlite_err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE),
            Some("UNIQUE constraint failed: users.username".into()),
        );
        let err = ApiError::from(anyhow::Error::new(sqlite_err));
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn other_database_errors_stay_internal() {
        let sqlite_err = rusqlite::Error::QueryReturnedNoRows;
        let err = ApiError::from(anyhow::Error::new(sqlite_err));
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
