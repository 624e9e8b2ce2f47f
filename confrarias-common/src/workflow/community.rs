//! Seals and testimonials
//!
//! A seal is the existence of a (user, discovery) row and toggles freely.
//! Testimonials are one per (user, discovery) and only their author or the
//! admin may delete them.

use crate::error::{conflict_on_unique, Error, Result};
use crate::guard::{Action, AuthorizationGuard, Target};
use crate::identity::IdentityProvider;
use crate::models::{Actor, Testimonial};
use crate::validation::Validator;
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// Seal state of a discovery as seen by one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SealState {
    pub sealed: bool,
    pub seal_count: i64,
}

/// Testimonial with the author's display name
#[derive(Debug, Clone, Serialize)]
pub struct TestimonialView {
    #[serde(flatten)]
    pub testimonial: Testimonial,
    pub author_name: String,
}

#[derive(Clone)]
pub struct CommunityWorkflow {
    db: SqlitePool,
    guard: AuthorizationGuard,
    identity: Arc<dyn IdentityProvider>,
}

pub(crate) async fn seal_count(db: &SqlitePool, discovery_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM seals WHERE discovery_id = ?")
        .bind(discovery_id)
        .fetch_one(db)
        .await?;
    Ok(count)
}

/// Testimonials of a discovery, newest first, with author names resolved
/// through the identity provider
pub(crate) async fn testimonials_with_authors(
    db: &SqlitePool,
    identity: &dyn IdentityProvider,
    discovery_id: i64,
) -> Result<Vec<TestimonialView>> {
    let testimonials = sqlx::query_as::<_, Testimonial>(
        "SELECT * FROM testimonials WHERE discovery_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(discovery_id)
    .fetch_all(db)
    .await?;

    let ids: Vec<String> = testimonials.iter().map(|t| t.user_id.clone()).collect();
    let users = identity.users_by_ids(&ids).await?;

    Ok(testimonials
        .into_iter()
        .map(|testimonial| TestimonialView {
            author_name: users
                .get(&testimonial.user_id)
                .map(|u| u.display_name())
                .unwrap_or_else(|| "Confrade".to_string()),
            testimonial,
        })
        .collect())
}

impl CommunityWorkflow {
    pub fn new(db: SqlitePool, guard: AuthorizationGuard, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { db, guard, identity }
    }

    async fn ensure_discovery(&self, discovery_id: i64) -> Result<()> {
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discoveries WHERE id = ?")
            .bind(discovery_id)
            .fetch_one(&self.db)
            .await?;
        if exists == 0 {
            return Err(Error::NotFound(format!("descoberta {}", discovery_id)));
        }
        Ok(())
    }

    async fn state_for(&self, actor: &Actor, discovery_id: i64) -> Result<SealState> {
        Ok(SealState {
            sealed: self.has_sealed(Some(actor), discovery_id).await?,
            seal_count: seal_count(&self.db, discovery_id).await?,
        })
    }

    // ========================================================================
    // Seals
    // ========================================================================

    pub async fn grant_seal(&self, actor: Option<&Actor>, discovery_id: i64) -> Result<SealState> {
        self.guard.require(actor, Action::GrantSeal, Target::None)?;
        let actor = self.guard.require_actor(actor)?;
        self.ensure_discovery(discovery_id).await?;

        sqlx::query("INSERT OR IGNORE INTO seals (user_id, discovery_id, created_at) VALUES (?, ?, ?)")
            .bind(&actor.id)
            .bind(discovery_id)
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        info!(discovery_id, user_id = %actor.id, "Seal granted");
        self.state_for(actor, discovery_id).await
    }

    /// Remove the caller's seal; no-op when there is none, even if the
    /// discovery is gone
    pub async fn revoke_seal(&self, actor: Option<&Actor>, discovery_id: i64) -> Result<SealState> {
        self.guard.require(actor, Action::RevokeSeal, Target::None)?;
        let actor = self.guard.require_actor(actor)?;

        sqlx::query("DELETE FROM seals WHERE user_id = ? AND discovery_id = ?")
            .bind(&actor.id)
            .bind(discovery_id)
            .execute(&self.db)
            .await?;

        info!(discovery_id, user_id = %actor.id, "Seal revoked");
        self.state_for(actor, discovery_id).await
    }

    pub async fn toggle_seal(&self, actor: Option<&Actor>, discovery_id: i64) -> Result<SealState> {
        if self.has_sealed(actor, discovery_id).await? {
            self.revoke_seal(actor, discovery_id).await
        } else {
            self.grant_seal(actor, discovery_id).await
        }
    }

    /// False for anonymous callers
    pub async fn has_sealed(&self, actor: Option<&Actor>, discovery_id: i64) -> Result<bool> {
        let Some(actor) = actor else {
            return Ok(false);
        };
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seals WHERE user_id = ? AND discovery_id = ?")
            .bind(&actor.id)
            .bind(discovery_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count > 0)
    }

    // ========================================================================
    // Testimonials
    // ========================================================================

    pub async fn create_testimonial(&self, actor: Option<&Actor>, discovery_id: i64, content: &str) -> Result<Testimonial> {
        self.guard.require(actor, Action::WriteTestimonial, Target::None)?;
        let actor = self.guard.require_actor(actor)?;
        Validator::new().min_len("content", content, 10).finish()?;
        self.ensure_discovery(discovery_id).await?;

        let id = sqlx::query("INSERT INTO testimonials (user_id, discovery_id, content, created_at) VALUES (?, ?, ?, ?)")
            .bind(&actor.id)
            .bind(discovery_id)
            .bind(content.trim())
            .bind(Utc::now())
            .execute(&self.db)
            .await
            .map_err(|e| conflict_on_unique(e, "Já deixaste um testemunho nesta descoberta."))?
            .last_insert_rowid();

        info!(testimonial_id = id, discovery_id, user_id = %actor.id, "Testimonial created");
        let testimonial = sqlx::query_as::<_, Testimonial>("SELECT * FROM testimonials WHERE id = ?")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        Ok(testimonial)
    }

    pub async fn delete_testimonial(&self, actor: Option<&Actor>, testimonial_id: i64) -> Result<()> {
        self.guard.require_actor(actor)?;
        let testimonial = sqlx::query_as::<_, Testimonial>("SELECT * FROM testimonials WHERE id = ?")
            .bind(testimonial_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| Error::NotFound(format!("testemunho {}", testimonial_id)))?;

        self.guard.require(
            actor,
            Action::DeleteTestimonial,
            Target::OwnedBy { user_id: &testimonial.user_id },
        )?;

        sqlx::query("DELETE FROM testimonials WHERE id = ?")
            .bind(testimonial_id)
            .execute(&self.db)
            .await?;

        info!(testimonial_id, "Testimonial deleted");
        Ok(())
    }

    pub async fn list_testimonials(&self, discovery_id: i64) -> Result<Vec<TestimonialView>> {
        testimonials_with_authors(&self.db, self.identity.as_ref(), discovery_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SqliteIdentity;
    use crate::workflow::testing::*;

    async fn setup() -> (SqlitePool, CommunityWorkflow, Actor, Actor, i64) {
        let pool = pool().await;
        let identity = Arc::new(SqliteIdentity::new(pool.clone()));
        let workflow = CommunityWorkflow::new(pool.clone(), guard(), identity);
        let admin = admin(&pool).await;
        let user = insert_user(&pool, "u-1", "confrade@example.pt").await;
        let type_id = insert_type(&pool, "Doce").await;
        let discovery_id = insert_discovery(&pool, "ovos-moles", type_id, None).await;
        (pool, workflow, admin, user, discovery_id)
    }

    #[tokio::test]
    async fn test_grant_then_revoke_restores_count() {
        let (pool, workflow, _admin, user, discovery_id) = setup().await;
        let before = seal_count(&pool, discovery_id).await.unwrap();

        let granted = workflow.grant_seal(Some(&user), discovery_id).await.unwrap();
        assert_eq!(granted, SealState { sealed: true, seal_count: before + 1 });

        // granting twice does not double count
        workflow.grant_seal(Some(&user), discovery_id).await.unwrap();
        assert_eq!(seal_count(&pool, discovery_id).await.unwrap(), before + 1);

        let revoked = workflow.revoke_seal(Some(&user), discovery_id).await.unwrap();
        assert_eq!(revoked, SealState { sealed: false, seal_count: before });
    }

    #[tokio::test]
    async fn test_revoke_without_seal_is_noop() {
        let (_pool, workflow, _admin, user, discovery_id) = setup().await;
        let state = workflow.revoke_seal(Some(&user), discovery_id).await.unwrap();
        assert_eq!(state.seal_count, 0);
    }

    #[tokio::test]
    async fn test_revoke_on_missing_discovery_is_noop() {
        let (_pool, workflow, _admin, user, _discovery_id) = setup().await;
        let state = workflow.revoke_seal(Some(&user), 404).await.unwrap();
        assert_eq!(state, SealState { sealed: false, seal_count: 0 });
    }

    #[tokio::test]
    async fn test_toggle_and_missing_discovery() {
        let (_pool, workflow, _admin, user, discovery_id) = setup().await;
        assert!(workflow.toggle_seal(Some(&user), discovery_id).await.unwrap().sealed);
        assert!(!workflow.toggle_seal(Some(&user), discovery_id).await.unwrap().sealed);

        assert!(matches!(workflow.grant_seal(Some(&user), 404).await, Err(Error::NotFound(_))));
        assert!(matches!(workflow.grant_seal(None, discovery_id).await, Err(Error::NotAuthenticated)));
        assert!(!workflow.has_sealed(None, discovery_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_one_testimonial_per_user() {
        let (_pool, workflow, _admin, user, discovery_id) = setup().await;
        workflow
            .create_testimonial(Some(&user), discovery_id, "Os melhores ovos moles de Aveiro.")
            .await
            .unwrap();

        let again = workflow
            .create_testimonial(Some(&user), discovery_id, "Continuam a ser os melhores.")
            .await;
        assert!(matches!(again, Err(Error::Conflict(_))));

        let short = workflow.create_testimonial(Some(&user), discovery_id, "Bom").await;
        assert!(matches!(short, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_testimonial_deletion_rights() {
        let (pool, workflow, admin, user, discovery_id) = setup().await;
        let other = insert_user(&pool, "u-2", "outro@example.pt").await;
        let first = workflow
            .create_testimonial(Some(&user), discovery_id, "Uma tradição que vale a viagem.")
            .await
            .unwrap();
        let second = workflow
            .create_testimonial(Some(&other), discovery_id, "Recomendo a toda a família.")
            .await
            .unwrap();

        assert!(matches!(
            workflow.delete_testimonial(Some(&other), first.id).await,
            Err(Error::NotAuthorized(_))
        ));
        workflow.delete_testimonial(Some(&user), first.id).await.unwrap();
        workflow.delete_testimonial(Some(&admin), second.id).await.unwrap();
        assert!(workflow.list_testimonials(discovery_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_resolves_author_names() {
        let (_pool, workflow, _admin, user, discovery_id) = setup().await;
        workflow
            .create_testimonial(Some(&user), discovery_id, "Doce conventual delicioso.")
            .await
            .unwrap();

        let listing = workflow.list_testimonials(discovery_id).await.unwrap();
        assert_eq!(listing[0].author_name, "confrade");
    }
}
