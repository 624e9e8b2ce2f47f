//! Identity provider
//!
//! Workflows only depend on the `IdentityProvider` trait. `SqliteIdentity`
//! is the bundled implementation: users in the `users` table with Argon2id
//! password hashes, sessions keyed by the SHA-256 of an opaque bearer token.

use crate::error::{conflict_on_unique, Error, Result};
use crate::models::Actor;
use crate::validation::{normalize_optional, Validator};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Session lifetime
pub const SESSION_DAYS: i64 = 30;

const TOKEN_LENGTH: usize = 48;
const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub rank_override: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserIdentity {
    pub fn actor(&self) -> Actor {
        Actor::new(self.id.clone(), self.email.clone())
    }

    /// Full name if set, otherwise the local part of the email
    pub fn display_name(&self) -> String {
        match &self.full_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => self.email.split('@').next().unwrap_or_default().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserIdentity,
}

/// Metadata edit; `None` leaves a field unchanged, an empty string clears it
#[derive(Debug, Clone, Default)]
pub struct UserMetadataUpdate {
    pub full_name: Option<String>,
    pub rank_override: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, full_name: Option<String>) -> Result<UserIdentity>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self, token: &str) -> Result<()>;

    /// User behind a session token, if the session is valid
    async fn get_user(&self, token: &str) -> Result<Option<UserIdentity>>;

    async fn list_users(&self) -> Result<Vec<UserIdentity>>;

    async fn get_user_by_id(&self, id: &str) -> Result<Option<UserIdentity>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserIdentity>>;

    async fn update_user_by_id(&self, id: &str, update: UserMetadataUpdate) -> Result<UserIdentity>;

    async fn delete_user(&self, id: &str) -> Result<()>;

    /// Bulk lookup; unknown ids are absent from the map
    async fn users_by_ids(&self, ids: &[String]) -> Result<HashMap<String, UserIdentity>>;

    async fn emails_by_ids(&self, ids: &[String]) -> Result<HashMap<String, String>> {
        Ok(self
            .users_by_ids(ids)
            .await?
            .into_iter()
            .map(|(id, user)| (id, user.email))
            .collect())
    }
}

/// SQLite-backed identity provider
#[derive(Debug, Clone)]
pub struct SqliteIdentity {
    db: SqlitePool,
}

impl SqliteIdentity {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| Error::Upstream(format!("Failed to hash password: {e}")))
    })
    .await
    .map_err(|e| Error::Upstream(format!("Password hashing task failed: {e}")))?
}

async fn verify_password(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash)
            .map_err(|e| Error::Upstream(format!("Invalid password hash format: {e}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| Error::Upstream(format!("Password verification task failed: {e}")))?
}

const USER_COLUMNS: &str = "id, email, full_name, rank_override, created_at";

#[async_trait]
impl IdentityProvider for SqliteIdentity {
    async fn sign_up(&self, email: &str, password: &str, full_name: Option<String>) -> Result<UserIdentity> {
        let email = email.trim().to_lowercase();
        Validator::new()
            .email("email", &email)
            .check(
                password.chars().count() >= MIN_PASSWORD_LENGTH,
                "password",
                "A palavra-passe deve ter pelo menos 6 caracteres.",
            )
            .finish()?;

        let password_hash = hash_password(password.to_string()).await?;
        let user = UserIdentity {
            id: Uuid::new_v4().to_string(),
            email,
            full_name: normalize_optional(full_name),
            rank_override: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO users (id, email, password_hash, full_name, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&password_hash)
        .bind(&user.full_name)
        .bind(user.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| conflict_on_unique(e, "Já existe uma conta com este email."))?;

        info!(user_id = %user.id, "User signed up");
        Ok(user)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, password_hash FROM users WHERE email = ?")
                .bind(email.trim())
                .fetch_optional(&self.db)
                .await?;

        let invalid = || Error::validation("password", "Email ou palavra-passe incorretos.");

        let (user_id, stored_hash) = row.ok_or_else(invalid)?;
        if !verify_password(password.to_string(), stored_hash).await? {
            return Err(invalid());
        }

        let user = self.get_user_by_id(&user_id).await?.ok_or_else(invalid)?;
        let token = generate_token();
        let now = Utc::now();
        let expires_at = now + Duration::days(SESSION_DAYS);

        let purged = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.db)
            .await?
            .rows_affected();
        if purged > 0 {
            debug!(purged, "Expired sessions removed");
        }

        sqlx::query("INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
            .bind(hash_token(&token))
            .bind(&user.id)
            .bind(now)
            .bind(expires_at)
            .execute(&self.db)
            .await?;

        info!(user_id = %user.id, "User signed in");
        Ok(Session { token, expires_at, user })
    }

    async fn sign_out(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(hash_token(token))
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn get_user(&self, token: &str) -> Result<Option<UserIdentity>> {
        let user = sqlx::query_as::<_, UserIdentity>(
            r#"
            SELECT u.id, u.email, u.full_name, u.rank_override, u.created_at
            FROM sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.token_hash = ? AND s.expires_at > ?
            "#,
        )
        .bind(hash_token(token))
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        if user.is_none() {
            debug!("Session token not recognised or expired");
        }
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<UserIdentity>> {
        let users = sqlx::query_as::<_, UserIdentity>(&format!(
            "SELECT {} FROM users ORDER BY created_at, email",
            USER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn get_user_by_id(&self, id: &str) -> Result<Option<UserIdentity>> {
        let user = sqlx::query_as::<_, UserIdentity>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserIdentity>> {
        let user = sqlx::query_as::<_, UserIdentity>(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email.trim())
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_user_by_id(&self, id: &str, update: UserMetadataUpdate) -> Result<UserIdentity> {
        let mut user = self
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("utilizador {}", id)))?;

        if let Some(full_name) = update.full_name {
            user.full_name = normalize_optional(Some(full_name));
        }
        if let Some(rank_override) = update.rank_override {
            user.rank_override = normalize_optional(Some(rank_override));
        }

        sqlx::query("UPDATE users SET full_name = ?, rank_override = ? WHERE id = ?")
            .bind(&user.full_name)
            .bind(&user.rank_override)
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(user)
    }

    async fn delete_user(&self, id: &str) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(Error::NotFound(format!("utilizador {}", id)));
        }
        info!(user_id = %id, "User deleted");
        Ok(())
    }

    async fn users_by_ids(&self, ids: &[String]) -> Result<HashMap<String, UserIdentity>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM users WHERE id IN (", USER_COLUMNS));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let users: Vec<UserIdentity> = query.build_query_as().fetch_all(&self.db).await?;
        Ok(users.into_iter().map(|u| (u.id.clone(), u)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    async fn provider() -> SqliteIdentity {
        SqliteIdentity::new(init_memory_database().await.unwrap())
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let idp = provider().await;
        let user = idp
            .sign_up("Maria@Example.pt", "segredo123", Some("Maria".into()))
            .await
            .unwrap();
        assert_eq!(user.email, "maria@example.pt");

        let session = idp.sign_in_with_password("maria@example.pt", "segredo123").await.unwrap();
        assert_eq!(session.user.id, user.id);
        assert_eq!(session.token.len(), TOKEN_LENGTH);

        let resolved = idp.get_user(&session.token).await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let idp = provider().await;
        idp.sign_up("joao@example.pt", "segredo123", None).await.unwrap();

        let err = idp.sign_in_with_password("joao@example.pt", "errado").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let idp = provider().await;
        idp.sign_up("ana@example.pt", "segredo123", None).await.unwrap();

        let err = idp.sign_up("ANA@example.pt", "outro123", None).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn test_sign_up_validation() {
        let idp = provider().await;
        match idp.sign_up("not-an-email", "123", None).await {
            Err(Error::Validation(errors)) => {
                assert!(errors.has("email"));
                assert!(errors.has("password"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sign_in_purges_expired_sessions() {
        let idp = provider().await;
        let user = idp.sign_up("ines@example.pt", "segredo123", None).await.unwrap();
        let long_ago = Utc::now() - Duration::days(SESSION_DAYS + 1);
        sqlx::query("INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
            .bind("stale")
            .bind(&user.id)
            .bind(long_ago)
            .bind(long_ago + Duration::days(1))
            .execute(&idp.db)
            .await
            .unwrap();

        let session = idp.sign_in_with_password("ines@example.pt", "segredo123").await.unwrap();

        let remaining: Vec<String> = sqlx::query_scalar("SELECT token_hash FROM sessions")
            .fetch_all(&idp.db)
            .await
            .unwrap();
        assert_eq!(remaining, vec![hash_token(&session.token)]);
    }

    #[tokio::test]
    async fn test_sign_out_invalidates_session() {
        let idp = provider().await;
        idp.sign_up("rui@example.pt", "segredo123", None).await.unwrap();
        let session = idp.sign_in_with_password("rui@example.pt", "segredo123").await.unwrap();

        idp.sign_out(&session.token).await.unwrap();
        assert!(idp.get_user(&session.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_metadata_and_clear_override() {
        let idp = provider().await;
        let user = idp.sign_up("eva@example.pt", "segredo123", None).await.unwrap();

        let updated = idp
            .update_user_by_id(
                &user.id,
                UserMetadataUpdate {
                    full_name: Some("Eva Lopes".into()),
                    rank_override: Some("Grão-Mestre".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.rank_override.as_deref(), Some("Grão-Mestre"));

        let cleared = idp
            .update_user_by_id(
                &user.id,
                UserMetadataUpdate {
                    full_name: None,
                    rank_override: Some(String::new()),
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.rank_override, None);
        assert_eq!(cleared.full_name.as_deref(), Some("Eva Lopes"));
    }

    #[tokio::test]
    async fn test_bulk_email_lookup() {
        let idp = provider().await;
        let a = idp.sign_up("a@example.pt", "segredo123", None).await.unwrap();
        let b = idp.sign_up("b@example.pt", "segredo123", None).await.unwrap();

        let emails = idp
            .emails_by_ids(&[a.id.clone(), b.id.clone(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[&a.id], "a@example.pt");
        assert!(idp.emails_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_user_is_not_found() {
        let idp = provider().await;
        assert!(matches!(idp.delete_user("nobody").await, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = UserIdentity {
            id: "1".into(),
            email: "confrade@example.pt".into(),
            full_name: None,
            rank_override: None,
            created_at: Utc::now(),
        };
        assert_eq!(user.display_name(), "confrade");
    }
}
