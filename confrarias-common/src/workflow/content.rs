//! Content ownership workflow
//!
//! Confraria-scoped mutations: profile fields, articles, recipes, events,
//! gallery and image uploads. Every operation starts with `check_ownership`,
//! which allows the admin or the confraria's responsible user.

use super::fetch_confraria;
use crate::blob::{image_path, BlobStore};
use crate::error::{Error, Result};
use crate::guard::{Action, AuthorizationGuard, Target};
use crate::models::{Actor, Article, Confraria, Event, GalleryImage, ImagePurpose, PublicationStatus, Recipe};
use crate::validation::{normalize_optional, validate_image, Validator};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

const MOTTO_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub motto: Option<String>,
    pub history: Option<String>,
    pub founders: Option<String>,
    pub seal_hint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArticlePayload {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub status: PublicationStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipePayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub ingredients: String,
    pub instructions: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub status: PublicationStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventPayload {
    pub name: String,
    pub description: String,
    pub event_date: NaiveDate,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Result of an image upload
#[derive(Debug, Clone, Serialize)]
pub struct ImageUpload {
    pub url: String,
    pub purpose: ImagePurpose,
    /// Set when the purpose was `gallery`
    pub gallery_image: Option<GalleryImage>,
}

/// Everything a manager can edit, drafts included
#[derive(Debug, Clone, Serialize)]
pub struct ManagedContent {
    pub confraria: Confraria,
    pub articles: Vec<Article>,
    pub recipes: Vec<Recipe>,
    pub events: Vec<Event>,
    pub gallery: Vec<GalleryImage>,
}

#[derive(Clone)]
pub struct ContentWorkflow {
    db: SqlitePool,
    guard: AuthorizationGuard,
    blobs: Arc<dyn BlobStore>,
}

/// Content tables addressed by id within a confraria
#[derive(Debug, Clone, Copy)]
enum ContentTable {
    Articles,
    Recipes,
    Events,
    Gallery,
}

impl ContentTable {
    fn name(&self) -> &'static str {
        match self {
            ContentTable::Articles => "articles",
            ContentTable::Recipes => "recipes",
            ContentTable::Events => "events",
            ContentTable::Gallery => "confraria_gallery_images",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ContentTable::Articles => "artigo",
            ContentTable::Recipes => "receita",
            ContentTable::Events => "evento",
            ContentTable::Gallery => "imagem",
        }
    }
}

impl ContentWorkflow {
    pub fn new(db: SqlitePool, guard: AuthorizationGuard, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, guard, blobs }
    }

    /// Load the confraria and allow the admin or its responsible user
    pub async fn check_ownership(&self, actor: Option<&Actor>, confraria_id: i64) -> Result<Confraria> {
        self.guard.require_actor(actor)?;
        let confraria = fetch_confraria(&self.db, confraria_id).await?;
        self.guard.require(
            actor,
            Action::ManageConfrariaContent,
            Target::Confraria {
                responsible_user_id: confraria.responsible_user_id.as_deref(),
            },
        )?;
        Ok(confraria)
    }

    pub async fn managed_content(&self, actor: Option<&Actor>, confraria_id: i64) -> Result<ManagedContent> {
        let confraria = self.check_ownership(actor, confraria_id).await?;

        let articles = sqlx::query_as::<_, Article>(
            "SELECT * FROM articles WHERE confraria_id = ? ORDER BY updated_at DESC, id DESC",
        )
        .bind(confraria_id)
        .fetch_all(&self.db)
        .await?;
        let recipes = sqlx::query_as::<_, Recipe>(
            "SELECT * FROM recipes WHERE confraria_id = ? ORDER BY updated_at DESC, id DESC",
        )
        .bind(confraria_id)
        .fetch_all(&self.db)
        .await?;
        let events = sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE confraria_id = ? ORDER BY event_date DESC, id DESC",
        )
        .bind(confraria_id)
        .fetch_all(&self.db)
        .await?;
        let gallery = sqlx::query_as::<_, GalleryImage>(
            "SELECT * FROM confraria_gallery_images WHERE confraria_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(confraria_id)
        .fetch_all(&self.db)
        .await?;

        Ok(ManagedContent { confraria, articles, recipes, events, gallery })
    }

    // ========================================================================
    // Profile
    // ========================================================================

    /// Replace the editable profile fields; empty strings clear them
    pub async fn update_profile(&self, actor: Option<&Actor>, confraria_id: i64, update: ProfileUpdate) -> Result<Confraria> {
        self.guard.require_actor(actor)?;
        let confraria = fetch_confraria(&self.db, confraria_id).await?;
        self.guard.require(
            actor,
            Action::EditConfrariaProfile,
            Target::Confraria {
                responsible_user_id: confraria.responsible_user_id.as_deref(),
            },
        )?;

        let motto = normalize_optional(update.motto);
        Validator::new()
            .max_len("motto", motto.as_deref(), MOTTO_MAX_CHARS)
            .finish()?;

        sqlx::query("UPDATE confrarias SET motto = ?, history = ?, founders = ?, seal_hint = ? WHERE id = ?")
            .bind(&motto)
            .bind(normalize_optional(update.history))
            .bind(normalize_optional(update.founders))
            .bind(normalize_optional(update.seal_hint))
            .bind(confraria_id)
            .execute(&self.db)
            .await?;

        info!(confraria_id, "Confraria profile updated");
        fetch_confraria(&self.db, confraria_id).await
    }

    // ========================================================================
    // Articles
    // ========================================================================

    fn validate_article(payload: &ArticlePayload) -> Result<()> {
        Validator::new()
            .min_len("title", &payload.title, 3)
            .min_len("content", &payload.content, 10)
            .optional_url("image_url", payload.image_url.as_deref())
            .finish()
    }

    pub async fn create_article(&self, actor: Option<&Actor>, confraria_id: i64, payload: ArticlePayload) -> Result<Article> {
        self.check_ownership(actor, confraria_id).await?;
        let actor = self.guard.require_actor(actor)?;
        Self::validate_article(&payload)?;

        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO articles (confraria_id, author_id, title, content, image_url, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(confraria_id)
        .bind(&actor.id)
        .bind(payload.title.trim())
        .bind(payload.content.trim())
        .bind(normalize_optional(payload.image_url))
        .bind(payload.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        info!(confraria_id, article_id = id, "Article created");
        self.fetch_article(confraria_id, id).await
    }

    pub async fn update_article(
        &self,
        actor: Option<&Actor>,
        confraria_id: i64,
        article_id: i64,
        payload: ArticlePayload,
    ) -> Result<Article> {
        self.check_ownership(actor, confraria_id).await?;
        Self::validate_article(&payload)?;

        let updated = sqlx::query(
            r#"
            UPDATE articles SET title = ?, content = ?, image_url = ?, status = ?, updated_at = ?
            WHERE id = ? AND confraria_id = ?
            "#,
        )
        .bind(payload.title.trim())
        .bind(payload.content.trim())
        .bind(normalize_optional(payload.image_url))
        .bind(payload.status.as_str())
        .bind(Utc::now())
        .bind(article_id)
        .bind(confraria_id)
        .execute(&self.db)
        .await?
        .rows_affected();

        ensure_found(updated, ContentTable::Articles, article_id)?;
        self.fetch_article(confraria_id, article_id).await
    }

    pub async fn set_article_status(
        &self,
        actor: Option<&Actor>,
        confraria_id: i64,
        article_id: i64,
        status: PublicationStatus,
    ) -> Result<Article> {
        self.check_ownership(actor, confraria_id).await?;
        self.set_status(ContentTable::Articles, confraria_id, article_id, status).await?;
        self.fetch_article(confraria_id, article_id).await
    }

    pub async fn delete_article(&self, actor: Option<&Actor>, confraria_id: i64, article_id: i64) -> Result<()> {
        self.check_ownership(actor, confraria_id).await?;
        self.delete_row(ContentTable::Articles, confraria_id, article_id).await
    }

    async fn fetch_article(&self, confraria_id: i64, id: i64) -> Result<Article> {
        sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = ? AND confraria_id = ?")
            .bind(id)
            .bind(confraria_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| Error::NotFound(format!("artigo {}", id)))
    }

    // ========================================================================
    // Recipes
    // ========================================================================

    fn validate_recipe(payload: &RecipePayload) -> Result<()> {
        Validator::new()
            .min_len("title", &payload.title, 3)
            .min_len("ingredients", &payload.ingredients, 10)
            .min_len("instructions", &payload.instructions, 10)
            .optional_url("image_url", payload.image_url.as_deref())
            .finish()
    }

    pub async fn create_recipe(&self, actor: Option<&Actor>, confraria_id: i64, payload: RecipePayload) -> Result<Recipe> {
        self.check_ownership(actor, confraria_id).await?;
        let actor = self.guard.require_actor(actor)?;
        Self::validate_recipe(&payload)?;

        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO recipes (
                confraria_id, author_id, title, description, ingredients, instructions,
                image_url, status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(confraria_id)
        .bind(&actor.id)
        .bind(payload.title.trim())
        .bind(normalize_optional(payload.description))
        .bind(payload.ingredients.trim())
        .bind(payload.instructions.trim())
        .bind(normalize_optional(payload.image_url))
        .bind(payload.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        info!(confraria_id, recipe_id = id, "Recipe created");
        self.fetch_recipe(confraria_id, id).await
    }

    pub async fn update_recipe(
        &self,
        actor: Option<&Actor>,
        confraria_id: i64,
        recipe_id: i64,
        payload: RecipePayload,
    ) -> Result<Recipe> {
        self.check_ownership(actor, confraria_id).await?;
        Self::validate_recipe(&payload)?;

        let updated = sqlx::query(
            r#"
            UPDATE recipes
            SET title = ?, description = ?, ingredients = ?, instructions = ?,
                image_url = ?, status = ?, updated_at = ?
            WHERE id = ? AND confraria_id = ?
            "#,
        )
        .bind(payload.title.trim())
        .bind(normalize_optional(payload.description))
        .bind(payload.ingredients.trim())
        .bind(payload.instructions.trim())
        .bind(normalize_optional(payload.image_url))
        .bind(payload.status.as_str())
        .bind(Utc::now())
        .bind(recipe_id)
        .bind(confraria_id)
        .execute(&self.db)
        .await?
        .rows_affected();

        ensure_found(updated, ContentTable::Recipes, recipe_id)?;
        self.fetch_recipe(confraria_id, recipe_id).await
    }

    pub async fn set_recipe_status(
        &self,
        actor: Option<&Actor>,
        confraria_id: i64,
        recipe_id: i64,
        status: PublicationStatus,
    ) -> Result<Recipe> {
        self.check_ownership(actor, confraria_id).await?;
        self.set_status(ContentTable::Recipes, confraria_id, recipe_id, status).await?;
        self.fetch_recipe(confraria_id, recipe_id).await
    }

    pub async fn delete_recipe(&self, actor: Option<&Actor>, confraria_id: i64, recipe_id: i64) -> Result<()> {
        self.check_ownership(actor, confraria_id).await?;
        self.delete_row(ContentTable::Recipes, confraria_id, recipe_id).await
    }

    async fn fetch_recipe(&self, confraria_id: i64, id: i64) -> Result<Recipe> {
        sqlx::query_as::<_, Recipe>("SELECT * FROM recipes WHERE id = ? AND confraria_id = ?")
            .bind(id)
            .bind(confraria_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| Error::NotFound(format!("receita {}", id)))
    }

    // ========================================================================
    // Events
    // ========================================================================

    fn validate_event(payload: &EventPayload) -> Result<()> {
        Validator::new()
            .min_len("name", &payload.name, 3)
            .min_len("description", &payload.description, 10)
            .optional_url("image_url", payload.image_url.as_deref())
            .finish()
    }

    pub async fn create_event(&self, actor: Option<&Actor>, confraria_id: i64, payload: EventPayload) -> Result<Event> {
        self.check_ownership(actor, confraria_id).await?;
        let actor = self.guard.require_actor(actor)?;
        Self::validate_event(&payload)?;

        let id = sqlx::query(
            r#"
            INSERT INTO events (confraria_id, author_id, name, description, event_date, location, image_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(confraria_id)
        .bind(&actor.id)
        .bind(payload.name.trim())
        .bind(payload.description.trim())
        .bind(payload.event_date)
        .bind(normalize_optional(payload.location))
        .bind(normalize_optional(payload.image_url))
        .bind(Utc::now())
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        info!(confraria_id, event_id = id, "Event created");
        self.fetch_event(confraria_id, id).await
    }

    pub async fn update_event(
        &self,
        actor: Option<&Actor>,
        confraria_id: i64,
        event_id: i64,
        payload: EventPayload,
    ) -> Result<Event> {
        self.check_ownership(actor, confraria_id).await?;
        Self::validate_event(&payload)?;

        let updated = sqlx::query(
            r#"
            UPDATE events SET name = ?, description = ?, event_date = ?, location = ?, image_url = ?
            WHERE id = ? AND confraria_id = ?
            "#,
        )
        .bind(payload.name.trim())
        .bind(payload.description.trim())
        .bind(payload.event_date)
        .bind(normalize_optional(payload.location))
        .bind(normalize_optional(payload.image_url))
        .bind(event_id)
        .bind(confraria_id)
        .execute(&self.db)
        .await?
        .rows_affected();

        ensure_found(updated, ContentTable::Events, event_id)?;
        self.fetch_event(confraria_id, event_id).await
    }

    pub async fn delete_event(&self, actor: Option<&Actor>, confraria_id: i64, event_id: i64) -> Result<()> {
        self.check_ownership(actor, confraria_id).await?;
        self.delete_row(ContentTable::Events, confraria_id, event_id).await
    }

    async fn fetch_event(&self, confraria_id: i64, id: i64) -> Result<Event> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ? AND confraria_id = ?")
            .bind(id)
            .bind(confraria_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| Error::NotFound(format!("evento {}", id)))
    }

    // ========================================================================
    // Images
    // ========================================================================

    /// Store an uploaded image and apply it according to `purpose`
    ///
    /// `seal` and `cover` overwrite the stored URL; the previous blob is left
    /// in place.
    pub async fn upload_image(
        &self,
        actor: Option<&Actor>,
        confraria_id: i64,
        purpose: ImagePurpose,
        content_type: &str,
        bytes: &[u8],
        description: Option<String>,
    ) -> Result<ImageUpload> {
        self.check_ownership(actor, confraria_id).await?;
        validate_image(content_type, bytes)?;

        let path = image_path(confraria_id, purpose, content_type);
        self.blobs.upload(&path, bytes, content_type).await?;
        let url = self.blobs.public_url(&path);

        let gallery_image = match purpose {
            ImagePurpose::Seal => {
                sqlx::query("UPDATE confrarias SET seal_url = ? WHERE id = ?")
                    .bind(&url)
                    .bind(confraria_id)
                    .execute(&self.db)
                    .await?;
                None
            }
            ImagePurpose::Cover => {
                sqlx::query("UPDATE confrarias SET cover_url = ? WHERE id = ?")
                    .bind(&url)
                    .bind(confraria_id)
                    .execute(&self.db)
                    .await?;
                None
            }
            ImagePurpose::Gallery => Some(self.insert_gallery_row(confraria_id, &url, description).await?),
            ImagePurpose::Content => None,
        };

        info!(confraria_id, purpose = %purpose, path = %path, "Image uploaded");
        Ok(ImageUpload { url, purpose, gallery_image })
    }

    /// Register an already hosted image in the gallery
    pub async fn add_gallery_image(
        &self,
        actor: Option<&Actor>,
        confraria_id: i64,
        image_url: &str,
        description: Option<String>,
    ) -> Result<GalleryImage> {
        self.check_ownership(actor, confraria_id).await?;
        Validator::new()
            .min_len("image_url", image_url, 1)
            .optional_url("image_url", Some(image_url))
            .finish()?;
        self.insert_gallery_row(confraria_id, image_url.trim(), description).await
    }

    pub async fn delete_gallery_image(&self, actor: Option<&Actor>, confraria_id: i64, image_id: i64) -> Result<()> {
        self.check_ownership(actor, confraria_id).await?;
        self.delete_row(ContentTable::Gallery, confraria_id, image_id).await
    }

    async fn insert_gallery_row(&self, confraria_id: i64, url: &str, description: Option<String>) -> Result<GalleryImage> {
        let id = sqlx::query(
            "INSERT INTO confraria_gallery_images (confraria_id, image_url, description, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(confraria_id)
        .bind(url)
        .bind(normalize_optional(description))
        .bind(Utc::now())
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        let image = sqlx::query_as::<_, GalleryImage>("SELECT * FROM confraria_gallery_images WHERE id = ?")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        Ok(image)
    }

    // ========================================================================
    // Shared row helpers
    // ========================================================================

    async fn set_status(&self, table: ContentTable, confraria_id: i64, id: i64, status: PublicationStatus) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET status = ?, updated_at = ? WHERE id = ? AND confraria_id = ?",
            table.name()
        );
        let updated = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .bind(confraria_id)
            .execute(&self.db)
            .await?
            .rows_affected();

        ensure_found(updated, table, id)?;
        info!(table = table.name(), id, status = %status, "Publication status changed");
        Ok(())
    }

    async fn delete_row(&self, table: ContentTable, confraria_id: i64, id: i64) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = ? AND confraria_id = ?", table.name());
        let deleted = sqlx::query(&sql)
            .bind(id)
            .bind(confraria_id)
            .execute(&self.db)
            .await?
            .rows_affected();

        ensure_found(deleted, table, id)?;
        info!(table = table.name(), id, confraria_id, "Content deleted");
        Ok(())
    }
}

fn ensure_found(rows_affected: u64, table: ContentTable, id: i64) -> Result<()> {
    if rows_affected == 0 {
        Err(Error::NotFound(format!("{} {}", table.label(), id)))
    } else {
        Ok(())
    }
}
