//! Submission workflow
//!
//! `Pendente → Aprovado` and `Pendente → Rejeitado`, both terminal.
//! Approval publishes a discovery and records its id on the submission so
//! later edits reach it without matching on titles.

use super::{confraria_exists, discovery_type_exists, summarize_editorial};
use crate::error::{Error, Result};
use crate::guard::{Action, AuthorizationGuard, Target};
use crate::models::{Actor, Discovery, Region, Submission, SubmissionStatus};
use crate::slug::{derive_slug, slug_candidate};
use crate::validation::{normalize_optional, Validator};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::info;

/// Image attached to a discovery approved without one
pub const PLACEHOLDER_IMAGE_URL: &str = "https://placehold.co/600x400.png";

/// Slug used when a title has no word characters at all
const FALLBACK_SLUG: &str = "descoberta";

/// Create and edit payload
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionPayload {
    pub discovery_title: String,
    pub editorial: String,
    pub region: Region,
    pub type_id: i64,
    #[serde(default)]
    pub confraria_id: Option<i64>,
    #[serde(default)]
    pub links: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Which row an edit landed on
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "target", content = "row", rename_all = "lowercase")]
pub enum EditOutcome {
    Submission(Submission),
    Discovery(Discovery),
}

#[derive(Debug, Clone)]
pub struct SubmissionWorkflow {
    db: SqlitePool,
    guard: AuthorizationGuard,
}

async fn fetch_submission<'e, E>(executor: E, id: i64) -> Result<Submission>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Submission>("SELECT * FROM submissions WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::NotFound(format!("submissão {}", id)))
}

/// First free slug derived from `title`, suffixed `-2`, `-3`... on collision
pub(crate) async fn unique_slug(conn: &mut SqliteConnection, title: &str) -> Result<String> {
    let mut base = derive_slug(title);
    if base.is_empty() {
        base = FALLBACK_SLUG.to_string();
    }

    let mut attempt = 1;
    loop {
        let candidate = slug_candidate(&base, attempt);
        let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discoveries WHERE slug = ?")
            .bind(&candidate)
            .fetch_one(&mut *conn)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
        attempt += 1;
    }
}

impl SubmissionWorkflow {
    pub fn new(db: SqlitePool, guard: AuthorizationGuard) -> Self {
        Self { db, guard }
    }

    async fn validate(&self, payload: &SubmissionPayload) -> Result<()> {
        let type_ok = discovery_type_exists(&self.db, payload.type_id).await?;
        let confraria_ok = match payload.confraria_id {
            Some(id) => confraria_exists(&self.db, id).await?,
            None => true,
        };

        Validator::new()
            .min_len("discovery_title", &payload.discovery_title, 3)
            .min_len("editorial", &payload.editorial, 10)
            .check(type_ok, "type_id", "Escolhe um tipo de descoberta válido.")
            .check(confraria_ok, "confraria_id", "Escolhe uma confraria válida.")
            .optional_url("links", payload.links.as_deref())
            .optional_url("website", payload.website.as_deref())
            .optional_url("image_url", payload.image_url.as_deref())
            .finish()
    }

    pub async fn create(&self, actor: Option<&Actor>, payload: SubmissionPayload) -> Result<Submission> {
        self.guard.require(actor, Action::CreateSubmission, Target::None)?;
        let actor = self.guard.require_actor(actor)?;
        self.validate(&payload).await?;

        let id = sqlx::query(
            r#"
            INSERT INTO submissions (
                user_id, discovery_title, editorial, region, type_id,
                confraria_id, links, website, image_url, date, status
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&actor.id)
        .bind(payload.discovery_title.trim())
        .bind(payload.editorial.trim())
        .bind(payload.region.as_str())
        .bind(payload.type_id)
        .bind(payload.confraria_id)
        .bind(normalize_optional(payload.links))
        .bind(normalize_optional(payload.website))
        .bind(normalize_optional(payload.image_url))
        .bind(Utc::now())
        .bind(SubmissionStatus::Pendente.as_str())
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        info!(submission_id = id, user_id = %actor.id, "Submission created");
        fetch_submission(&self.db, id).await
    }

    /// Owner or admin view of one submission
    pub async fn get(&self, actor: Option<&Actor>, id: i64) -> Result<Submission> {
        self.guard.require_actor(actor)?;
        let submission = fetch_submission(&self.db, id).await?;
        self.guard.require(
            actor,
            Action::EditSubmission,
            Target::OwnedBy { user_id: &submission.user_id },
        )?;
        Ok(submission)
    }

    pub async fn list_mine(&self, actor: Option<&Actor>) -> Result<Vec<Submission>> {
        let actor = self.guard.require_actor(actor)?;
        let rows = sqlx::query_as::<_, Submission>(
            "SELECT * FROM submissions WHERE user_id = ? ORDER BY date DESC, id DESC",
        )
        .bind(&actor.id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Admin moderation queue, optionally filtered by status
    pub async fn list(&self, actor: Option<&Actor>, status: Option<SubmissionStatus>) -> Result<Vec<Submission>> {
        self.guard.require(actor, Action::ModerateSubmission, Target::None)?;
        let rows = sqlx::query_as::<_, Submission>(
            "SELECT * FROM submissions WHERE (?1 IS NULL OR status = ?1) ORDER BY date DESC, id DESC",
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Publish a pending submission as a discovery
    ///
    /// Slug, discovery row, image row and status change commit together or
    /// not at all.
    pub async fn approve(&self, actor: Option<&Actor>, id: i64) -> Result<Discovery> {
        self.guard.require(actor, Action::ModerateSubmission, Target::None)?;

        let mut tx = self.db.begin().await?;
        let submission = fetch_submission(&mut *tx, id).await?;
        if submission.status.is_terminal() {
            return Err(Error::InvalidTransition(format!(
                "a submissão já está {}",
                submission.status
            )));
        }

        let slug = unique_slug(&mut tx, &submission.discovery_title).await?;
        let now = Utc::now();

        let discovery_id = sqlx::query(
            r#"
            INSERT INTO discoveries (
                slug, title, description, editorial, region, type_id,
                confraria_id, website, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&slug)
        .bind(&submission.discovery_title)
        .bind(summarize_editorial(&submission.editorial))
        .bind(&submission.editorial)
        .bind(submission.region.as_str())
        .bind(submission.type_id)
        .bind(submission.confraria_id)
        .bind(&submission.website)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let image_url = submission
            .image_url
            .clone()
            .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string());
        sqlx::query("INSERT INTO discovery_images (discovery_id, image_url, image_hint) VALUES (?, ?, ?)")
            .bind(discovery_id)
            .bind(&image_url)
            .bind(&submission.discovery_title)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE submissions SET status = ?, resolved_discovery_id = ? WHERE id = ?")
            .bind(SubmissionStatus::Aprovado.as_str())
            .bind(discovery_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let discovery = sqlx::query_as::<_, Discovery>("SELECT * FROM discoveries WHERE id = ?")
            .bind(discovery_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(submission_id = id, discovery_id, slug = %slug, "Submission approved");
        Ok(discovery)
    }

    pub async fn reject(&self, actor: Option<&Actor>, id: i64) -> Result<Submission> {
        self.guard.require(actor, Action::ModerateSubmission, Target::None)?;

        let updated = sqlx::query("UPDATE submissions SET status = ? WHERE id = ? AND status = ?")
            .bind(SubmissionStatus::Rejeitado.as_str())
            .bind(id)
            .bind(SubmissionStatus::Pendente.as_str())
            .execute(&self.db)
            .await?
            .rows_affected();

        let submission = fetch_submission(&self.db, id).await?;
        if updated == 0 {
            return Err(Error::InvalidTransition(format!(
                "a submissão já está {}",
                submission.status
            )));
        }

        info!(submission_id = id, "Submission rejected");
        Ok(submission)
    }

    /// Owner edit
    ///
    /// A pending submission is edited in place. Once approved the edit goes
    /// to the published discovery, keeping its slug; `links` and `image_url`
    /// have no counterpart there and must be resent unchanged. Rejected
    /// submissions are closed.
    pub async fn edit(&self, actor: Option<&Actor>, id: i64, payload: SubmissionPayload) -> Result<EditOutcome> {
        self.guard.require_actor(actor)?;
        let submission = fetch_submission(&self.db, id).await?;
        self.guard.require(
            actor,
            Action::EditSubmission,
            Target::OwnedBy { user_id: &submission.user_id },
        )?;
        self.validate(&payload).await?;

        match (submission.status, submission.resolved_discovery_id) {
            (SubmissionStatus::Pendente, _) => {
                sqlx::query(
                    r#"
                    UPDATE submissions
                    SET discovery_title = ?, editorial = ?, region = ?, type_id = ?,
                        confraria_id = ?, links = ?, website = ?, image_url = ?
                    WHERE id = ?
                    "#,
                )
                .bind(payload.discovery_title.trim())
                .bind(payload.editorial.trim())
                .bind(payload.region.as_str())
                .bind(payload.type_id)
                .bind(payload.confraria_id)
                .bind(normalize_optional(payload.links))
                .bind(normalize_optional(payload.website))
                .bind(normalize_optional(payload.image_url))
                .bind(id)
                .execute(&self.db)
                .await?;

                info!(submission_id = id, "Pending submission edited");
                Ok(EditOutcome::Submission(fetch_submission(&self.db, id).await?))
            }
            (SubmissionStatus::Aprovado, Some(discovery_id)) => {
                const LOCKED: &str = "Não pode ser alterado depois da aprovação.";
                Validator::new()
                    .check(normalize_optional(payload.links.clone()) == submission.links, "links", LOCKED)
                    .check(
                        normalize_optional(payload.image_url.clone()) == submission.image_url,
                        "image_url",
                        LOCKED,
                    )
                    .finish()?;

                let editorial = payload.editorial.trim();
                let updated = sqlx::query(
                    r#"
                    UPDATE discoveries
                    SET title = ?, editorial = ?, description = ?, region = ?,
                        type_id = ?, confraria_id = ?, website = ?
                    WHERE id = ?
                    "#,
                )
                .bind(payload.discovery_title.trim())
                .bind(editorial)
                .bind(summarize_editorial(editorial))
                .bind(payload.region.as_str())
                .bind(payload.type_id)
                .bind(payload.confraria_id)
                .bind(normalize_optional(payload.website))
                .bind(discovery_id)
                .execute(&self.db)
                .await?
                .rows_affected();

                if updated == 0 {
                    return Err(Error::NotFound(format!("descoberta {}", discovery_id)));
                }

                let discovery = sqlx::query_as::<_, Discovery>("SELECT * FROM discoveries WHERE id = ?")
                    .bind(discovery_id)
                    .fetch_one(&self.db)
                    .await?;
                info!(submission_id = id, discovery_id, "Published discovery edited by author");
                Ok(EditOutcome::Discovery(discovery))
            }
            (SubmissionStatus::Aprovado, None) => Err(Error::NotFound(
                "a descoberta publicada desta submissão já não existe".to_string(),
            )),
            (SubmissionStatus::Rejeitado, _) => Err(Error::InvalidTransition(
                "uma submissão rejeitada não pode ser editada".to_string(),
            )),
        }
    }
}
