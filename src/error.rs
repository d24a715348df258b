use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::brix::BrixError;
use crate::domain::scaler::ScaleError;

/// Error taxonomy surfaced at the HTTP boundary. Everything a handler can
/// fail with funnels through here so status mapping lives in one place.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    BadRequest { kind: &'static str, message: String },

    #[error("Invalid or expired session")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            kind: "bad_request",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest { kind, message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: message,
                    kind: Some(kind.to_string()),
                    correlation_id: None,
                },
            ),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    error: "Invalid or expired session".into(),
                    kind: None,
                    correlation_id: None,
                },
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    error: "Forbidden".into(),
                    kind: None,
                    correlation_id: None,
                },
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: "Not found".into(),
                    kind: None,
                    correlation_id: None,
                },
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorBody {
                    error: msg,
                    kind: None,
                    correlation_id: None,
                },
            ),
            ApiError::Unprocessable(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    error: msg,
                    kind: None,
                    correlation_id: None,
                },
            ),
            ApiError::Internal(e) => {
                let correlation_id = Uuid::new_v4();
                tracing::error!(error = %e, %correlation_id, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "Internal server error".into(),
                        kind: None,
                        correlation_id: Some(correlation_id.to_string()),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => ApiError::NotFound,
            // Lost races on unique columns (concurrent signup on the same
            // email) are conflicts, not server faults.
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ApiError::Conflict("Resource already exists".into())
            }
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<BrixError> for ApiError {
    fn from(e: BrixError) -> Self {
        ApiError::BadRequest {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<ScaleError> for ApiError {
    fn from(e: ScaleError) -> Self {
        ApiError::BadRequest {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct UniqueViolation;

    impl fmt::Display for UniqueViolation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "duplicate key value violates unique constraint")
        }
    }

    impl StdError for UniqueViolation {}

    impl DatabaseError for UniqueViolation {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some("23505".into())
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err: ApiError = sqlx::Error::Database(Box::new(UniqueViolation)).into();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ApiError::NotFound));
    }
}
