/// Unified Error Handling Module
///
/// Error kinds are deliberately coarse at the boundary: cryptographic and
/// session failures collapse to opaque variants before they reach a caller,
/// while the internal sub-cause is logged. This keeps verification from
/// acting as an oracle (a caller must not learn *why* a token was rejected).

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// Authentication and session-lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Wrong email or wrong password; identical for both so login cannot
    /// be used to enumerate registered accounts.
    InvalidCredentials,
    /// Signature, issuer, audience, or expiry failure on token
    /// verification. All sub-causes collapse here.
    InvalidToken,
    /// Refresh token verified cryptographically but its session row is
    /// missing, revoked, expired, or carries a different token hash.
    InvalidOrRevokedSession,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid email or password"),
            AuthError::InvalidToken => write!(f, "Invalid or expired token"),
            AuthError::InvalidOrRevokedSession => {
                write!(f, "Session is invalid or has been revoked")
            }
        }
    }
}

impl StdError for AuthError {}

/// Persistence-layer errors
#[derive(Debug, Clone)]
pub enum StoreError {
    /// Key already present on insert (session id or email collision).
    Conflict(String),
    /// Row addressed by key does not exist.
    NotFound(String),
    /// Conditional revoke hit a row that was already revoked; the caller
    /// lost a rotation race. Normalized by the rotation engine, never
    /// surfaced over HTTP.
    AlreadyRevoked(String),
    /// Backend failure. Surfaced as retryable/fatal, never downgraded to
    /// "invalid session".
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Conflict(key) => write!(f, "Duplicate entry: {}", key),
            StoreError::NotFound(key) => write!(f, "Not found: {}", key),
            StoreError::AlreadyRevoked(key) => write!(f, "Already revoked: {}", key),
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
        }
    }
}

impl StdError for StoreError {}

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Auth(AuthError),
    Store(StoreError),
    Validation(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Store(e) => write!(f, "{}", e),
            AppError::Validation(msg) => write!(f, "{}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Conflict("unique constraint".to_string())
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(StoreError::from(err))
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for log correlation
    pub error_id: String,
    /// Human-readable error message (coarse kind only)
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl AppError {
    fn response_parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    e.to_string(),
                ),
                AuthError::InvalidToken => {
                    (StatusCode::UNAUTHORIZED, "TOKEN_INVALID", e.to_string())
                }
                AuthError::InvalidOrRevokedSession => {
                    (StatusCode::UNAUTHORIZED, "SESSION_INVALID", e.to_string())
                }
            },
            AppError::Store(e) => match e {
                StoreError::Conflict(_) => {
                    (StatusCode::CONFLICT, "DUPLICATE_ENTRY", e.to_string())
                }
                StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
                // A raw race loss should have been normalized by the
                // rotation engine; respond as a generic session failure.
                StoreError::AlreadyRevoked(_) => (
                    StatusCode::UNAUTHORIZED,
                    "SESSION_INVALID",
                    AuthError::InvalidOrRevokedSession.to_string(),
                ),
                StoreError::Unavailable(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "STORE_UNAVAILABLE",
                    "Persistence backend temporarily unavailable".to_string(),
                ),
            },
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }

    fn log(&self, error_id: &str) {
        match self {
            AppError::Auth(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Authentication error");
            }
            AppError::Store(StoreError::Unavailable(msg)) => {
                tracing::error!(error_id = error_id, error = %msg, "Store unavailable");
            }
            AppError::Store(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Store error");
            }
            AppError::Validation(msg) => {
                tracing::warn!(error_id = error_id, error = %msg, "Validation error");
            }
            AppError::Internal(msg) => {
                tracing::error!(error_id = error_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log(&error_id);

        let (status, code, message) = self.response_parts();
        let body = ErrorResponse::new(error_id, message, code.to_string(), status.as_u16());

        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.response_parts().0
    }
}
