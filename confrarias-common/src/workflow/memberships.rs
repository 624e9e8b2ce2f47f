//! Membership workflow
//!
//! Per (user, confraria) pair: `none → pending → approved`, `pending → none`
//! on cancel or reject, `approved → none` on removal. Managerial rights are
//! re-derived from the stored confraria on every call.

use super::fetch_confraria;
use crate::error::{conflict_on_unique, Error, Result};
use crate::guard::{Action, AuthorizationGuard, Target};
use crate::identity::IdentityProvider;
use crate::models::{Actor, ConfrariaMember, MembershipStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// Membership row as shown to a confraria manager
#[derive(Debug, Clone, Serialize)]
pub struct MemberEntry {
    #[serde(flatten)]
    pub member: ConfrariaMember,
    pub email: Option<String>,
}

/// The caller's own membership, with the confraria name
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MyMembership {
    pub id: i64,
    pub confraria_id: i64,
    pub confraria_name: String,
    #[sqlx(try_from = "String")]
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct MembershipWorkflow {
    db: SqlitePool,
    guard: AuthorizationGuard,
    identity: Arc<dyn IdentityProvider>,
}

impl MembershipWorkflow {
    pub fn new(db: SqlitePool, guard: AuthorizationGuard, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { db, guard, identity }
    }

    async fn fetch_member(&self, id: i64) -> Result<ConfrariaMember> {
        sqlx::query_as::<_, ConfrariaMember>("SELECT * FROM confraria_members WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| Error::NotFound(format!("pedido de adesão {}", id)))
    }

    /// Load a membership row and check the caller manages its confraria
    async fn managed_member(&self, actor: Option<&Actor>, id: i64) -> Result<ConfrariaMember> {
        self.guard.require_actor(actor)?;
        let member = self.fetch_member(id).await?;
        let confraria = fetch_confraria(&self.db, member.confraria_id).await?;
        self.guard.require(
            actor,
            Action::ManageMembership,
            Target::Confraria {
                responsible_user_id: confraria.responsible_user_id.as_deref(),
            },
        )?;
        Ok(member)
    }

    pub async fn request_join(&self, actor: Option<&Actor>, confraria_id: i64) -> Result<ConfrariaMember> {
        self.guard.require(actor, Action::RequestMembership, Target::None)?;
        let actor = self.guard.require_actor(actor)?;
        fetch_confraria(&self.db, confraria_id).await?;

        let id = sqlx::query(
            "INSERT INTO confraria_members (user_id, confraria_id, status, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&actor.id)
        .bind(confraria_id)
        .bind(MembershipStatus::Pending.as_str())
        .bind(Utc::now())
        .execute(&self.db)
        .await
        .map_err(|e| conflict_on_unique(e, "Já pediste para aderir a esta confraria."))?
        .last_insert_rowid();

        info!(membership_id = id, confraria_id, user_id = %actor.id, "Membership requested");
        self.fetch_member(id).await
    }

    /// Withdraw the caller's pending request; no-op when there is none
    pub async fn cancel_request(&self, actor: Option<&Actor>, confraria_id: i64) -> Result<()> {
        let actor = self.guard.require_actor(actor)?;
        self.guard.require(
            Some(actor),
            Action::CancelMembership,
            Target::OwnedBy { user_id: &actor.id },
        )?;

        let removed = sqlx::query(
            "DELETE FROM confraria_members WHERE user_id = ? AND confraria_id = ? AND status = ?",
        )
        .bind(&actor.id)
        .bind(confraria_id)
        .bind(MembershipStatus::Pending.as_str())
        .execute(&self.db)
        .await?
        .rows_affected();

        if removed > 0 {
            info!(confraria_id, user_id = %actor.id, "Membership request cancelled");
        }
        Ok(())
    }

    pub async fn approve(&self, actor: Option<&Actor>, id: i64) -> Result<ConfrariaMember> {
        let member = self.managed_member(actor, id).await?;
        if member.status != MembershipStatus::Pending {
            return Err(Error::InvalidTransition("o membro já foi aprovado".to_string()));
        }

        sqlx::query("UPDATE confraria_members SET status = ? WHERE id = ? AND status = ?")
            .bind(MembershipStatus::Approved.as_str())
            .bind(id)
            .bind(MembershipStatus::Pending.as_str())
            .execute(&self.db)
            .await?;

        info!(membership_id = id, confraria_id = member.confraria_id, "Membership approved");
        self.fetch_member(id).await
    }

    /// Decline a pending request
    pub async fn reject(&self, actor: Option<&Actor>, id: i64) -> Result<()> {
        self.delete_in_state(actor, id, MembershipStatus::Pending, "só pedidos pendentes podem ser rejeitados")
            .await?;
        info!(membership_id = id, "Membership request rejected");
        Ok(())
    }

    /// Expel an approved member
    pub async fn remove(&self, actor: Option<&Actor>, id: i64) -> Result<()> {
        self.delete_in_state(actor, id, MembershipStatus::Approved, "só membros aprovados podem ser removidos")
            .await?;
        info!(membership_id = id, "Member removed");
        Ok(())
    }

    async fn delete_in_state(
        &self,
        actor: Option<&Actor>,
        id: i64,
        expected: MembershipStatus,
        message: &str,
    ) -> Result<()> {
        let member = self.managed_member(actor, id).await?;
        if member.status != expected {
            return Err(Error::InvalidTransition(message.to_string()));
        }

        sqlx::query("DELETE FROM confraria_members WHERE id = ? AND status = ?")
            .bind(id)
            .bind(expected.as_str())
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Pending and approved members of a confraria, with their emails
    pub async fn list_for_manager(&self, actor: Option<&Actor>, confraria_id: i64) -> Result<Vec<MemberEntry>> {
        self.guard.require_actor(actor)?;
        let confraria = fetch_confraria(&self.db, confraria_id).await?;
        self.guard.require(
            actor,
            Action::ViewMembers,
            Target::Confraria {
                responsible_user_id: confraria.responsible_user_id.as_deref(),
            },
        )?;

        let members = sqlx::query_as::<_, ConfrariaMember>(
            "SELECT * FROM confraria_members WHERE confraria_id = ? ORDER BY status DESC, created_at, id",
        )
        .bind(confraria_id)
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<String> = members.iter().map(|m| m.user_id.clone()).collect();
        let emails = self.identity.emails_by_ids(&ids).await?;

        Ok(members
            .into_iter()
            .map(|member| MemberEntry {
                email: emails.get(&member.user_id).cloned(),
                member,
            })
            .collect())
    }

    pub async fn list_mine(&self, actor: Option<&Actor>) -> Result<Vec<MyMembership>> {
        let actor = self.guard.require_actor(actor)?;
        let rows = sqlx::query_as::<_, MyMembership>(
            r#"
            SELECT m.id, m.confraria_id, c.name AS confraria_name, m.status, m.created_at
            FROM confraria_members m
            JOIN confrarias c ON c.id = m.confraria_id
            WHERE m.user_id = ?
            ORDER BY c.name
            "#,
        )
        .bind(&actor.id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

pub(crate) async fn approved_member_count(db: &SqlitePool, confraria_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM confraria_members WHERE confraria_id = ? AND status = ?")
        .bind(confraria_id)
        .bind(MembershipStatus::Approved.as_str())
        .fetch_one(db)
        .await?;
    Ok(count)
}
