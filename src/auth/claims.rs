/// Token claim set (RFC 7519)
///
/// Shared by access and refresh tokens. The `jti` doubles as the session
/// primary key for refresh tokens; access tokens carry a throwaway one.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::error::{AppError, AuthError};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Unique token identifier
    pub jti: String,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn new(
        subject: Uuid,
        jti: String,
        issuer: String,
        audience: String,
        ttl_seconds: i64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: subject.to_string(),
            jti,
            iss: issuer,
            aud: audience,
            iat: now,
            exp: now + ttl_seconds,
        }
    }

    /// Extract the subject as a user ID.
    ///
    /// # Errors
    /// Returns `InvalidToken` if the subject is not a valid UUID.
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| {
            tracing::warn!("Token subject is not a valid UUID");
            AppError::Auth(AuthError::InvalidToken)
        })
    }
}
