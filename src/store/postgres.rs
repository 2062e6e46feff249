/// Postgres store backend
///
/// Rotation runs inside one transaction whose first statement is a
/// conditional revoke (`... AND is_revoked = FALSE`). That update is the
/// per-row compare-and-set the protocol relies on: of two concurrent
/// rotations of the same node, exactly one updates a row, and the loser
/// observes the row already revoked.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{
    hash_refresh_token, SessionMeta, SessionStore, UserRecord, UserStore,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Bootstrap the schema. Safe to run repeatedly.
    pub async fn init_db(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                full_name VARCHAR(50) NOT NULL DEFAULT '',
                role VARCHAR(20) NOT NULL DEFAULT 'user',
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(36) PRIMARY KEY,
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                refresh_token_hash VARCHAR(255) NOT NULL,
                is_revoked BOOLEAN NOT NULL DEFAULT FALSE,
                expires_at TIMESTAMPTZ NOT NULL,
                replaced_by VARCHAR(36),
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                ip VARCHAR(45),
                user_agent TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS sessions_user_idx ON sessions (user_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS sessions_exp_idx ON sessions (expires_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

impl SessionStore for PgStore {
    async fn create_session(
        &self,
        id: &str,
        user_id: Uuid,
        raw_token: &str,
        ttl_seconds: i64,
        meta: SessionMeta,
    ) -> Result<String, StoreError> {
        let token_hash = hash_refresh_token(raw_token);
        let expires_at = Utc::now() + Duration::seconds(ttl_seconds);

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, refresh_token_hash, is_revoked, expires_at, created_at, ip, user_agent)
            VALUES ($1, $2, $3, FALSE, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(&meta.ip)
        .bind(&meta.user_agent)
        .execute(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Conflict(_) => StoreError::Conflict(id.to_string()),
            other => other,
        })?;

        Ok(id.to_string())
    }

    async fn validate_session(&self, id: &str, raw_token: &str) -> Result<bool, StoreError> {
        let row = sqlx::query_as::<_, (String, bool, chrono::DateTime<Utc>)>(
            "SELECT refresh_token_hash, is_revoked, expires_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((stored_hash, is_revoked, expires_at)) = row else {
            return Ok(false);
        };
        if is_revoked {
            return Ok(false);
        }
        // Strict: a session expiring at exactly `now` is already expired.
        if expires_at <= Utc::now() {
            return Ok(false);
        }

        Ok(stored_hash == hash_refresh_token(raw_token))
    }

    async fn rotate_session(
        &self,
        old_id: &str,
        new_id: &str,
        raw_new_token: &str,
        ttl_seconds: i64,
    ) -> Result<String, StoreError> {
        let new_hash = hash_refresh_token(raw_new_token);
        let expires_at = Utc::now() + Duration::seconds(ttl_seconds);

        let mut tx = self.pool.begin().await?;

        // Conditional revoke doubles as the compare-and-set on the old
        // row; zero rows updated means the node was missing or a
        // concurrent rotation got there first.
        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE sessions
            SET is_revoked = TRUE, replaced_by = $1
            WHERE id = $2 AND is_revoked = FALSE
            RETURNING user_id
            "#,
        )
        .bind(new_id)
        .bind(old_id)
        .fetch_optional(&mut tx)
        .await?;

        let Some(user_id) = user_id else {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM sessions WHERE id = $1)",
            )
            .bind(old_id)
            .fetch_one(&mut tx)
            .await?;

            return if exists {
                Err(StoreError::AlreadyRevoked(old_id.to_string()))
            } else {
                Err(StoreError::NotFound(old_id.to_string()))
            };
        };

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, refresh_token_hash, is_revoked, expires_at, created_at)
            VALUES ($1, $2, $3, FALSE, $4, $5)
            "#,
        )
        .bind(new_id)
        .bind(user_id)
        .bind(&new_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&mut tx)
        .await?;

        // Revoke and insert become visible together or not at all.
        tx.commit().await?;

        Ok(new_id.to_string())
    }

    async fn revoke_session(&self, id: &str) -> Result<(), StoreError> {
        // No-op when absent or already revoked; rows affected is ignored.
        sqlx::query("UPDATE sessions SET is_revoked = TRUE WHERE id = $1 AND is_revoked = FALSE")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

impl UserStore for PgStore {
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: &str,
    ) -> Result<UserRecord, StoreError> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, full_name, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'user', $5, $5)
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Conflict(_) => StoreError::Conflict(email.to_string()),
            other => other,
        })?;

        Ok(UserRecord {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            name: name.to_string(),
            role: "user".to_string(),
            created_at: now,
        })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, String, String, String, String, chrono::DateTime<Utc>)>(
            "SELECT id, email, password_hash, full_name, role, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, email, password_hash, name, role, created_at)| UserRecord {
            id,
            email,
            password_hash,
            name,
            role,
            created_at,
        }))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, String, String, String, String, chrono::DateTime<Utc>)>(
            "SELECT id, email, password_hash, full_name, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, email, password_hash, name, role, created_at)| UserRecord {
            id,
            email,
            password_hash,
            name,
            role,
            created_at,
        }))
    }
}
