//! User administration, rank lookup and application settings

use crate::db::settings;
use crate::error::{Error, Result};
use crate::guard::{Action, AuthorizationGuard, Target};
use crate::identity::{IdentityProvider, UserIdentity, UserMetadataUpdate};
use crate::models::{Actor, SubmissionStatus};
use crate::rank::{compute_rank, RankStatus};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// Row of the admin user list
#[derive(Debug, Clone, Serialize)]
pub struct UserOverview {
    #[serde(flatten)]
    pub user: UserIdentity,
    pub is_admin: bool,
    pub sealed_count: i64,
    pub approved_submission_count: i64,
    pub rank: RankStatus,
}

#[derive(Clone)]
pub struct UserWorkflow {
    db: SqlitePool,
    guard: AuthorizationGuard,
    identity: Arc<dyn IdentityProvider>,
}

fn as_counter(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

impl UserWorkflow {
    pub fn new(db: SqlitePool, guard: AuthorizationGuard, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { db, guard, identity }
    }

    /// (seals granted by the user, approved submissions of the user)
    async fn counters(&self, user_id: &str) -> Result<(i64, i64)> {
        let sealed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seals WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
        let approved: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE user_id = ? AND status = ?")
            .bind(user_id)
            .bind(SubmissionStatus::Aprovado.as_str())
            .fetch_one(&self.db)
            .await?;
        Ok((sealed, approved))
    }

    async fn overview(&self, user: UserIdentity) -> Result<UserOverview> {
        let (sealed, approved) = self.counters(&user.id).await?;
        let rank = compute_rank(as_counter(sealed), as_counter(approved), user.rank_override.as_deref());
        Ok(UserOverview {
            is_admin: self.guard.is_admin(&user.actor()),
            sealed_count: sealed,
            approved_submission_count: approved,
            rank,
            user,
        })
    }

    pub async fn user_rank(&self, user_id: &str) -> Result<RankStatus> {
        let user = self
            .identity
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("utilizador {}", user_id)))?;
        Ok(self.overview(user).await?.rank)
    }

    /// Profile of the caller, as shown on their account page
    pub async fn me(&self, actor: Option<&Actor>) -> Result<UserOverview> {
        let actor = self.guard.require_actor(actor)?;
        let user = self
            .identity
            .get_user_by_id(&actor.id)
            .await?
            .ok_or(Error::NotAuthenticated)?;
        self.overview(user).await
    }

    // ========================================================================
    // Admin
    // ========================================================================

    pub async fn list_users(&self, actor: Option<&Actor>) -> Result<Vec<UserOverview>> {
        self.guard.require(actor, Action::ManageUsers, Target::None)?;
        let mut rows = Vec::new();
        for user in self.identity.list_users().await? {
            rows.push(self.overview(user).await?);
        }
        Ok(rows)
    }

    /// Edit full name and rank override; an empty override clears it
    pub async fn update_user(&self, actor: Option<&Actor>, user_id: &str, update: UserMetadataUpdate) -> Result<UserOverview> {
        self.guard.require(actor, Action::ManageUsers, Target::None)?;
        let user = self.identity.update_user_by_id(user_id, update).await?;
        info!(user_id, rank_override = ?user.rank_override, "User metadata updated");
        self.overview(user).await
    }

    pub async fn delete_user(&self, actor: Option<&Actor>, user_id: &str) -> Result<()> {
        self.guard.require(actor, Action::ManageUsers, Target::None)?;
        self.identity.delete_user(user_id).await
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Mapbox key for address autocomplete; any signed-in user may read it
    pub async fn mapbox_api_key(&self, actor: Option<&Actor>) -> Result<Option<String>> {
        self.guard.require_actor(actor)?;
        settings::get_mapbox_api_key(&self.db).await
    }

    pub async fn set_mapbox_api_key(&self, actor: Option<&Actor>, key: &str) -> Result<()> {
        self.guard.require(actor, Action::ManageSettings, Target::None)?;
        settings::set_mapbox_api_key(&self.db, key).await?;
        info!("Mapbox API key updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SqliteIdentity;
    use crate::workflow::testing::*;

    async fn setup() -> (SqlitePool, UserWorkflow, Actor, Actor) {
        let pool = pool().await;
        let identity = Arc::new(SqliteIdentity::new(pool.clone()));
        let workflow = UserWorkflow::new(pool.clone(), guard(), identity);
        let admin = admin(&pool).await;
        let user = insert_user(&pool, "u-1", "confrade@example.pt").await;
        (pool, workflow, admin, user)
    }

    async fn approved_submission(pool: &SqlitePool, user_id: &str, type_id: i64) {
        sqlx::query(
            "INSERT INTO submissions (user_id, discovery_title, editorial, region, type_id, date, status) \
             VALUES (?, 'Título', 'Editorial longo', 'Norte', ?, CURRENT_TIMESTAMP, 'Aprovado')",
        )
        .bind(user_id)
        .bind(type_id)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_rank_from_counters() {
        let (pool, workflow, _admin, user) = setup().await;
        let type_id = insert_type(&pool, "Vinho").await;
        assert_eq!(workflow.user_rank(&user.id).await.unwrap().rank_name, "Noviço");

        let discovery_id = insert_discovery(&pool, "vinho-verde", type_id, None).await;
        sqlx::query("INSERT INTO seals (user_id, discovery_id) VALUES (?, ?)")
            .bind(&user.id)
            .bind(discovery_id)
            .execute(&pool)
            .await
            .unwrap();
        approved_submission(&pool, &user.id, type_id).await;

        let rank = workflow.user_rank(&user.id).await.unwrap();
        assert_eq!(rank.rank_name, "Confrade");
        assert_eq!(rank.next_rank_name.as_deref(), Some("Mestre de Prova"));
    }

    #[tokio::test]
    async fn test_override_set_and_cleared_by_admin() {
        let (_pool, workflow, admin, user) = setup().await;
        let updated = workflow
            .update_user(
                Some(&admin),
                &user.id,
                UserMetadataUpdate { full_name: None, rank_override: Some("Mestre de Prova".into()) },
            )
            .await
            .unwrap();
        assert_eq!(updated.rank.rank_name, "Mestre de Prova");
        assert_eq!(updated.rank.progress_percent, 100.0);

        let cleared = workflow
            .update_user(
                Some(&admin),
                &user.id,
                UserMetadataUpdate { full_name: None, rank_override: Some(String::new()) },
            )
            .await
            .unwrap();
        assert_eq!(cleared.rank.rank_name, "Noviço");
    }

    #[tokio::test]
    async fn test_user_admin_requires_admin() {
        let (_pool, workflow, admin, user) = setup().await;
        assert!(matches!(workflow.list_users(Some(&user)).await, Err(Error::NotAuthorized(_))));

        let users = workflow.list_users(Some(&admin)).await.unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().any(|u| u.is_admin && u.user.email == ADMIN_EMAIL));

        workflow.delete_user(Some(&admin), &user.id).await.unwrap();
        assert!(matches!(workflow.user_rank(&user.id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_mapbox_key_settings() {
        let (_pool, workflow, admin, user) = setup().await;
        assert!(matches!(
            workflow.set_mapbox_api_key(Some(&user), "pk.x").await,
            Err(Error::NotAuthorized(_))
        ));

        workflow.set_mapbox_api_key(Some(&admin), "pk.live").await.unwrap();
        assert_eq!(workflow.mapbox_api_key(Some(&user)).await.unwrap().as_deref(), Some("pk.live"));
        assert!(matches!(workflow.mapbox_api_key(None).await, Err(Error::NotAuthenticated)));
    }
}
