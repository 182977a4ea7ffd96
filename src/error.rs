//! Error types for the circulation server

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Name of the partial unique index guarding one active loan per member and book.
pub const ACTIVE_LOAN_INDEX: &str = "loans_active_member_book_idx";

/// Foreign key tying a loan to a registered member.
pub const LOAN_MEMBER_FK: &str = "loans_member_id_fkey";

/// SQLSTATE codes meaning "no decision was made, try again":
/// serialization failure, deadlock, lock timeout, statement cancelled.
const TRANSIENT_SQLSTATES: [&str; 4] = ["40001", "40P01", "55P03", "57014"];

/// Numeric error codes returned in every error body.
///
/// Each error kind owns exactly one code so callers can tell them apart
/// even when two kinds share an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthenticated = 2,
    DbFailure = 3,
    NotFound = 4,
    OutOfStock = 5,
    LimitExceeded = 6,
    DuplicateActive = 7,
    Forbidden = 8,
    AlreadyReturned = 9,
    NotAuthorized = 10,
    BadValue = 11,
    Transient = 12,
    Consistency = 13,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Out of stock: {0}")]
    OutOfStock(String),

    #[error("Loan limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Duplicate active loan: {0}")]
    DuplicateActive(String),

    /// Ownership violation on return
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Already returned: {0}")]
    AlreadyReturned(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Caller lacks the role required by a route
    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Lock contention, timeouts or lost connections. Safe to retry the whole call.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Persisted state contradicts itself (e.g. a loan pointing at a deleted book)
    #[error("Consistency violation: {0}")]
    Consistency(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for failures where no business decision was taken.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::OutOfStock(_) => ErrorCode::OutOfStock,
            AppError::LimitExceeded(_) => ErrorCode::LimitExceeded,
            AppError::DuplicateActive(_) => ErrorCode::DuplicateActive,
            AppError::Forbidden(_) => ErrorCode::Forbidden,
            AppError::AlreadyReturned(_) => ErrorCode::AlreadyReturned,
            AppError::Authentication(_) => ErrorCode::NotAuthenticated,
            AppError::Authorization(_) => ErrorCode::NotAuthorized,
            AppError::Validation(_) | AppError::BadRequest(_) => ErrorCode::BadValue,
            AppError::Transient(_) => ErrorCode::Transient,
            AppError::Consistency(_) => ErrorCode::Consistency,
            AppError::Database(_) => ErrorCode::DbFailure,
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::OutOfStock(_) | AppError::DuplicateActive(_) | AppError::AlreadyReturned(_) => {
                StatusCode::CONFLICT
            }
            AppError::LimitExceeded(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Forbidden(_) | AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Consistency(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn classify_sqlx(e: &sqlx::Error) -> Option<AppError> {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            Some(AppError::Transient(e.to_string()))
        }
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.into_owned());
            match code.as_deref() {
                Some(c) if TRANSIENT_SQLSTATES.contains(&c) => {
                    Some(AppError::Transient(db.message().to_string()))
                }
                Some("23505") if db.constraint() == Some(ACTIVE_LOAN_INDEX) => Some(
                    AppError::DuplicateActive("You already have an active loan for this book".to_string()),
                ),
                Some("23503") if db.constraint() == Some(LOAN_MEMBER_FK) => Some(
                    AppError::Consistency("Loan references an unregistered member".to_string()),
                ),
                _ => None,
            }
        }
        _ => None,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match classify_sqlx(&e) {
            Some(err) => err,
            None => AppError::Database(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Consistency(msg) => {
                tracing::error!("Consistency violation: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Transient(msg) => {
                tracing::warn!("Transient failure: {}", msg);
                "Temporarily unavailable, retry the request".to_string()
            }
            AppError::NotFound(msg)
            | AppError::OutOfStock(msg)
            | AppError::LimitExceeded(msg)
            | AppError::DuplicateActive(msg)
            | AppError::Forbidden(msg)
            | AppError::AlreadyReturned(msg)
            | AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::Validation(msg)
            | AppError::BadRequest(msg) => msg.clone(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
