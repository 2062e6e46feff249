/// Rotation Engine
///
/// Orchestrates the refresh-token session lifecycle: login issues a token
/// pair and roots a lineage, refresh rotates the lineage forward under a
/// single-use guarantee, logout revokes. Each lineage node moves from
/// ACTIVE to exactly one of ROTATED (rotation) or REVOKED (logout or
/// misuse); terminal states never transition.
///
/// Plain async functions generic over the store traits — the HTTP layer
/// is a thin caller, and tests drive these directly against the
/// in-memory store.

use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::{sign_token, verify_token, TokenKind};
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError, StoreError};
use crate::store::{SessionMeta, SessionStore, UserStore};

/// The pair returned by login and refresh. The refresh token is expected
/// to be carried by a transport-layer mechanism outside this core.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Public view of a principal; never carries the password hash.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
}

/// Register a new user. Issues no tokens; login does that.
///
/// # Errors
/// `Conflict` if the email is already registered.
pub async fn register<S: UserStore>(
    store: &S,
    email: &str,
    password: &str,
    name: &str,
) -> Result<UserView, AppError> {
    let password_hash = hash_password(password)?;
    let user = store.create_user(email, &password_hash, name).await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok(UserView {
        id: user.id.to_string(),
        email: user.email,
        name: user.name,
        role: user.role,
    })
}

/// Authenticate and root a new session lineage.
///
/// Unknown email and wrong password take the same exit so login cannot
/// be used to enumerate accounts.
pub async fn login<S: SessionStore + UserStore>(
    store: &S,
    settings: &AuthSettings,
    email: &str,
    password: &str,
    meta: SessionMeta,
) -> Result<TokenPair, AppError> {
    let user = store
        .find_user_by_email(email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(&user.password_hash, password) {
        return Err(AuthError::InvalidCredentials.into());
    }

    let refresh_jti = Uuid::new_v4().to_string();
    let access_token = sign_token(
        TokenKind::Access,
        &user.id,
        &Uuid::new_v4().to_string(),
        settings,
    )?;
    let refresh_token = sign_token(TokenKind::Refresh, &user.id, &refresh_jti, settings)?;

    store
        .create_session(
            &refresh_jti,
            user.id,
            &refresh_token,
            settings.refresh_token_ttl,
            meta,
        )
        .await?;

    tracing::info!(user_id = %user.id, jti = %refresh_jti, "Session created");

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Rotate a refresh token: verify, validate against the store, revoke
/// the old node and mint a successor in one atomic store operation.
///
/// A token that verifies cryptographically but fails the session check
/// (missing, revoked, expired, or hash mismatch) is defensively revoked
/// and rejected with `InvalidOrRevokedSession`. Of concurrent refreshes
/// presenting the same token, at most one wins the rotation; losers take
/// the same `InvalidOrRevokedSession` exit.
pub async fn refresh<S: SessionStore>(
    store: &S,
    settings: &AuthSettings,
    presented: &str,
) -> Result<TokenPair, AppError> {
    let claims = verify_token(TokenKind::Refresh, presented, settings)?;
    let user_id = claims.user_id()?;
    let old_jti = claims.jti;

    if !store.validate_session(&old_jti, presented).await? {
        // Defensive revoke on replay or mismatch; idempotent, and its
        // own store failure must not mask the rejection.
        if let Err(e) = store.revoke_session(&old_jti).await {
            tracing::warn!(jti = %old_jti, error = %e, "Defensive revoke failed");
        }
        tracing::warn!(user_id = %user_id, jti = %old_jti, "Refresh token replay or mismatch");
        return Err(AuthError::InvalidOrRevokedSession.into());
    }

    let new_jti = Uuid::new_v4().to_string();
    let new_refresh = sign_token(TokenKind::Refresh, &user_id, &new_jti, settings)?;
    let new_access = sign_token(
        TokenKind::Access,
        &user_id,
        &Uuid::new_v4().to_string(),
        settings,
    )?;

    match store
        .rotate_session(&old_jti, &new_jti, &new_refresh, settings.refresh_token_ttl)
        .await
    {
        Ok(_) => {}
        // Lost the race (or the row vanished between validate and
        // rotate): deterministic failure, never a second success.
        Err(StoreError::NotFound(_)) | Err(StoreError::AlreadyRevoked(_)) => {
            tracing::warn!(user_id = %user_id, jti = %old_jti, "Concurrent rotation lost");
            return Err(AuthError::InvalidOrRevokedSession.into());
        }
        Err(other) => return Err(other.into()),
    }

    tracing::info!(user_id = %user_id, old_jti = %old_jti, new_jti = %new_jti, "Session rotated");

    Ok(TokenPair {
        access_token: new_access,
        refresh_token: new_refresh,
    })
}

/// Revoke the session behind a refresh token.
///
/// Always succeeds from the caller's perspective: a missing token, or
/// one that fails verification, is an already-logged-out state. Only a
/// store outage surfaces as an error.
pub async fn logout<S: SessionStore>(
    store: &S,
    settings: &AuthSettings,
    presented: Option<&str>,
) -> Result<(), AppError> {
    let Some(token) = presented else {
        return Ok(());
    };
    let Ok(claims) = verify_token(TokenKind::Refresh, token, settings) else {
        return Ok(());
    };

    store.revoke_session(&claims.jti).await?;
    tracing::info!(jti = %claims.jti, "Session revoked on logout");

    Ok(())
}
