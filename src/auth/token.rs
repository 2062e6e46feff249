/// Token Codec
///
/// Signs and verifies the two token kinds as HS256 JWTs. Each kind has
/// its own secret and its own time-to-live; verification checks signature,
/// issuer, audience, and expiry with a 10 second clock-skew tolerance.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError};

/// Allowed clock skew between issuer and verifier, in seconds.
const CLOCK_SKEW_LEEWAY_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn secret<'a>(&self, settings: &'a AuthSettings) -> &'a str {
        match self {
            TokenKind::Access => &settings.access_secret,
            TokenKind::Refresh => &settings.refresh_secret,
        }
    }

    fn ttl_seconds(&self, settings: &AuthSettings) -> i64 {
        match self {
            TokenKind::Access => settings.access_token_ttl,
            TokenKind::Refresh => settings.refresh_token_ttl,
        }
    }
}

/// Sign a token of the given kind for `subject`, carrying `jti`.
///
/// # Errors
/// Returns error if encoding fails.
pub fn sign_token(
    kind: TokenKind,
    subject: &Uuid,
    jti: &str,
    settings: &AuthSettings,
) -> Result<String, AppError> {
    let claims = Claims::new(
        *subject,
        jti.to_string(),
        settings.issuer.clone(),
        settings.audience.clone(),
        kind.ttl_seconds(settings),
    );

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(kind.secret(settings).as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
}

/// Verify a token of the given kind and extract its claims.
///
/// Every failure (bad signature, wrong kind's secret, wrong issuer or
/// audience, expired) collapses to the single opaque `InvalidToken`; the
/// sub-cause is logged, never returned, so verification cannot be used
/// as an oracle.
pub fn verify_token(
    kind: TokenKind,
    token: &str,
    settings: &AuthSettings,
) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&settings.issuer]);
    validation.set_audience(&[&settings.audience]);
    validation.leeway = CLOCK_SKEW_LEEWAY_SECS;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(kind.secret(settings).as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!(kind = ?kind, "Token verification failed: {}", e);
        AuthError::InvalidToken
    })
}
