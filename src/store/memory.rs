/// In-memory store backend
///
/// Reference semantics for the store contract, used by the test suite and
/// for running the server without Postgres. A single mutex guards both
/// maps, so every operation — including rotation's revoke-plus-insert —
/// is trivially atomic.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{
    hash_refresh_token, SessionMeta, SessionRecord, SessionStore, UserRecord, UserStore,
};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, UserRecord>,
    sessions: HashMap<String, SessionRecord>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a session row, for inspection in tests.
    pub async fn session(&self, id: &str) -> Option<SessionRecord> {
        self.inner.lock().await.sessions.get(id).cloned()
    }
}

impl SessionStore for InMemoryStore {
    async fn create_session(
        &self,
        id: &str,
        user_id: Uuid,
        raw_token: &str,
        ttl_seconds: i64,
        meta: SessionMeta,
    ) -> Result<String, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.sessions.contains_key(id) {
            return Err(StoreError::Conflict(id.to_string()));
        }

        inner.sessions.insert(
            id.to_string(),
            SessionRecord {
                id: id.to_string(),
                user_id,
                refresh_token_hash: hash_refresh_token(raw_token),
                is_revoked: false,
                expires_at: Utc::now() + Duration::seconds(ttl_seconds),
                replaced_by: None,
                created_at: Utc::now(),
                ip: meta.ip,
                user_agent: meta.user_agent,
            },
        );

        Ok(id.to_string())
    }

    async fn validate_session(&self, id: &str, raw_token: &str) -> Result<bool, StoreError> {
        let inner = self.inner.lock().await;
        let Some(row) = inner.sessions.get(id) else {
            return Ok(false);
        };
        if row.is_revoked {
            return Ok(false);
        }
        // Strict: a session expiring at exactly `now` is already expired.
        if row.expires_at <= Utc::now() {
            return Ok(false);
        }

        Ok(row.refresh_token_hash == hash_refresh_token(raw_token))
    }

    async fn rotate_session(
        &self,
        old_id: &str,
        new_id: &str,
        raw_new_token: &str,
        ttl_seconds: i64,
    ) -> Result<String, StoreError> {
        let mut inner = self.inner.lock().await;

        let user_id = match inner.sessions.get(old_id) {
            None => return Err(StoreError::NotFound(old_id.to_string())),
            Some(row) if row.is_revoked => {
                return Err(StoreError::AlreadyRevoked(old_id.to_string()))
            }
            Some(row) => row.user_id,
        };
        if inner.sessions.contains_key(new_id) {
            return Err(StoreError::Conflict(new_id.to_string()));
        }

        // Both writes happen under the one lock; no observer can see the
        // old row revoked without its successor, or vice versa.
        if let Some(old) = inner.sessions.get_mut(old_id) {
            old.is_revoked = true;
            old.replaced_by = Some(new_id.to_string());
        }

        inner.sessions.insert(
            new_id.to_string(),
            SessionRecord {
                id: new_id.to_string(),
                user_id,
                refresh_token_hash: hash_refresh_token(raw_new_token),
                is_revoked: false,
                expires_at: Utc::now() + Duration::seconds(ttl_seconds),
                replaced_by: None,
                created_at: Utc::now(),
                ip: None,
                user_agent: None,
            },
        );

        Ok(new_id.to_string())
    }

    async fn revoke_session(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(row) = inner.sessions.get_mut(id) {
            row.is_revoked = true;
        }
        Ok(())
    }
}

impl UserStore for InMemoryStore {
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: &str,
    ) -> Result<UserRecord, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.users.values().any(|u| u.email == email) {
            return Err(StoreError::Conflict(email.to_string()));
        }

        let user = UserRecord {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            name: name.to_string(),
            role: "user".to_string(),
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.get(&id).cloned())
    }
}
