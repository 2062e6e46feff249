/// Session and User Persistence
///
/// One row per issued refresh token, keyed by the token's jti. The store
/// is the single source of truth for validity and revocation: access
/// tokens are never persisted, and the raw refresh token never is either —
/// only its SHA-256 hash.

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::StoreError;

/// Hash a raw refresh token for at-rest storage (SHA-256 hex).
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// One node of a rotation lineage.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Refresh token jti; primary key.
    pub id: String,
    pub user_id: Uuid,
    /// SHA-256 hex of the signed refresh token. Never the raw value.
    pub refresh_token_hash: String,
    /// Monotonic: false -> true, never back.
    pub is_revoked: bool,
    pub expires_at: DateTime<Utc>,
    /// Successor session id, set only by rotation. Chains never branch.
    pub replaced_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Audit metadata captured at login, immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct SessionMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Keyed session persistence.
///
/// Every operation is atomic with respect to concurrent callers on the
/// same key; `rotate_session` in particular must commit its revoke and
/// insert together or not at all. The ordering guarantee for concurrent
/// rotation lives here, not in application-level locks.
#[allow(async_fn_in_trait)]
pub trait SessionStore: Send + Sync {
    /// Insert a new lineage node. Hashes `raw_token`, computes
    /// `expires_at = now + ttl_seconds`.
    ///
    /// # Errors
    /// `Conflict` if `id` already exists.
    async fn create_session(
        &self,
        id: &str,
        user_id: Uuid,
        raw_token: &str,
        ttl_seconds: i64,
        meta: SessionMeta,
    ) -> Result<String, StoreError>;

    /// Pure read: true iff the row exists, is not revoked, expires
    /// strictly after now, and the presented token hashes to the stored
    /// hash. Never mutates — repeated validation is side-effect-free.
    async fn validate_session(&self, id: &str, raw_token: &str) -> Result<bool, StoreError>;

    /// Atomically revoke `old_id` (setting `replaced_by = new_id`) and
    /// insert the successor under `new_id`, owned by the same user.
    ///
    /// # Errors
    /// `NotFound` if `old_id` does not exist; `AlreadyRevoked` if the
    /// conditional revoke finds the row already revoked (a concurrent
    /// rotation won the race).
    async fn rotate_session(
        &self,
        old_id: &str,
        new_id: &str,
        raw_new_token: &str,
        ttl_seconds: i64,
    ) -> Result<String, StoreError>;

    /// Idempotent revoke: marks the row revoked if present and active,
    /// succeeds as a no-op when already revoked or absent. Always safe
    /// to call speculatively during failure handling.
    async fn revoke_session(&self, id: &str) -> Result<(), StoreError>;
}

/// Principal persistence; backs login, registration, and `/auth/me`.
#[allow(async_fn_in_trait)]
pub trait UserStore: Send + Sync {
    /// # Errors
    /// `Conflict` if the email is already registered.
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: &str,
    ) -> Result<UserRecord, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_hashing_is_deterministic() {
        let hash1 = hash_refresh_token("some-signed-token");
        let hash2 = hash_refresh_token("some-signed-token");

        assert_eq!(hash1, hash2);
        // SHA-256 hex is 64 chars
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_hash_differs_from_raw_token() {
        let token = "header.payload.signature";
        assert_ne!(hash_refresh_token(token), token);
    }

    #[test]
    fn test_different_tokens_different_hashes() {
        assert_ne!(hash_refresh_token("token-a"), hash_refresh_token("token-b"));
    }
}
