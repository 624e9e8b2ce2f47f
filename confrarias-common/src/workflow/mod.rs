//! Workflow operations
//!
//! Each workflow owns cloned handles to its collaborators (pool, guard,
//! identity provider, blob store) and checks authorization before any
//! mutation. Multi-row effects run inside one transaction.

pub mod catalog;
pub mod community;
pub mod content;
pub mod memberships;
pub mod submissions;
pub mod users;

pub use catalog::CatalogWorkflow;
pub use community::CommunityWorkflow;
pub use content::ContentWorkflow;
pub use memberships::MembershipWorkflow;
pub use submissions::SubmissionWorkflow;
pub use users::UserWorkflow;

use crate::error::{Error, Result};
use crate::models::Confraria;
use sqlx::{Executor, Sqlite};

/// Length of the auto-generated discovery description
pub const DESCRIPTION_CHARS: usize = 100;

/// First `DESCRIPTION_CHARS` characters of the editorial, with an ellipsis
/// when cut
pub fn summarize_editorial(editorial: &str) -> String {
    let editorial = editorial.trim();
    let mut chars = editorial.chars();
    let head: String = chars.by_ref().take(DESCRIPTION_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

pub(crate) async fn fetch_confraria<'e, E>(executor: E, id: i64) -> Result<Confraria>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Confraria>("SELECT * FROM confrarias WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::NotFound(format!("confraria {}", id)))
}

pub(crate) async fn discovery_type_exists<'e, E>(executor: E, type_id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discovery_types WHERE id = ?")
        .bind(type_id)
        .fetch_one(executor)
        .await?;
    Ok(count > 0)
}

pub(crate) async fn confraria_exists<'e, E>(executor: E, confraria_id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM confrarias WHERE id = ?")
        .bind(confraria_id)
        .fetch_one(executor)
        .await?;
    Ok(count > 0)
}
