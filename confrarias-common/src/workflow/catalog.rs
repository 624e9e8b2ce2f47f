//! Catalog: discovery types, discoveries and confrarias
//!
//! Mutations are admin-only. Reads are public and feed the browsing pages.

use super::community::{seal_count, testimonials_with_authors, TestimonialView};
use super::memberships::approved_member_count;
use super::submissions::unique_slug;
use super::{confraria_exists, discovery_type_exists, fetch_confraria, summarize_editorial};
use crate::error::{conflict_on_unique, Error, Result};
use crate::guard::{Action, AuthorizationGuard, Target};
use crate::identity::IdentityProvider;
use crate::models::{
    Actor, Article, Confraria, Discovery, DiscoveryImage, DiscoveryType, Event, GalleryImage,
    PublicationStatus, Recipe, Region,
};
use crate::pagination::{calculate_pagination, Page, PAGE_SIZE};
use crate::validation::{is_valid_url, normalize_optional, Validator};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub image_url: String,
    #[serde(default)]
    pub image_hint: Option<String>,
}

/// Admin create/update payload
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryPayload {
    pub title: String,
    pub editorial: String,
    /// Derived from the editorial when absent
    #[serde(default)]
    pub description: Option<String>,
    pub region: Region,
    pub type_id: i64,
    #[serde(default)]
    pub confraria_id: Option<i64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// `None` on update keeps the current images
    #[serde(default)]
    pub images: Option<Vec<ImageRef>>,
}

/// Public listing filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveryFilter {
    pub region: Option<Region>,
    pub type_id: Option<i64>,
    pub confraria_id: Option<i64>,
    /// Case-insensitive title search
    pub q: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DiscoverySummary {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub region: Region,
    pub type_id: i64,
    pub type_name: String,
    pub confraria_id: Option<i64>,
    pub confraria_name: Option<String>,
    pub image_url: Option<String>,
    pub seal_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryDetail {
    pub discovery: Discovery,
    pub type_name: String,
    pub confraria: Option<Confraria>,
    pub images: Vec<DiscoveryImage>,
    pub seal_count: i64,
    pub testimonials: Vec<TestimonialView>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfrariaPayload {
    pub name: String,
    pub region: Region,
    #[serde(default)]
    pub motto: Option<String>,
}

/// Public confraria page: profile plus published content
#[derive(Debug, Clone, Serialize)]
pub struct ConfrariaDetail {
    pub confraria: Confraria,
    pub discoveries: Vec<DiscoverySummary>,
    pub articles: Vec<Article>,
    pub recipes: Vec<Recipe>,
    pub events: Vec<Event>,
    pub gallery: Vec<GalleryImage>,
    pub member_count: i64,
}

const SUMMARY_SELECT: &str = r#"
    SELECT d.id, d.slug, d.title, d.description, d.region, d.type_id,
           t.name AS type_name, d.confraria_id, c.name AS confraria_name,
           (SELECT i.image_url FROM discovery_images i
            WHERE i.discovery_id = d.id ORDER BY i.id LIMIT 1) AS image_url,
           (SELECT COUNT(*) FROM seals s WHERE s.discovery_id = d.id) AS seal_count
    FROM discoveries d
    JOIN discovery_types t ON t.id = d.type_id
    LEFT JOIN confrarias c ON c.id = d.confraria_id
"#;

const FILTER_WHERE: &str = r#"
    WHERE (?1 IS NULL OR d.region = ?1)
      AND (?2 IS NULL OR d.type_id = ?2)
      AND (?3 IS NULL OR d.confraria_id = ?3)
      AND (?4 IS NULL OR d.title LIKE '%' || ?4 || '%')
"#;

#[derive(Clone)]
pub struct CatalogWorkflow {
    db: SqlitePool,
    guard: AuthorizationGuard,
    identity: Arc<dyn IdentityProvider>,
}

async fn replace_images(conn: &mut SqliteConnection, discovery_id: i64, images: &[ImageRef]) -> Result<()> {
    sqlx::query("DELETE FROM discovery_images WHERE discovery_id = ?")
        .bind(discovery_id)
        .execute(&mut *conn)
        .await?;

    for image in images {
        sqlx::query("INSERT INTO discovery_images (discovery_id, image_url, image_hint) VALUES (?, ?, ?)")
            .bind(discovery_id)
            .bind(image.image_url.trim())
            .bind(normalize_optional(image.image_hint.clone()))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

impl CatalogWorkflow {
    pub fn new(db: SqlitePool, guard: AuthorizationGuard, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { db, guard, identity }
    }

    fn require_admin(&self, actor: Option<&Actor>) -> Result<()> {
        self.guard.require(actor, Action::ManageCatalog, Target::None)
    }

    // ========================================================================
    // Discovery types
    // ========================================================================

    pub async fn list_types(&self) -> Result<Vec<DiscoveryType>> {
        let types = sqlx::query_as::<_, DiscoveryType>("SELECT id, name FROM discovery_types ORDER BY name")
            .fetch_all(&self.db)
            .await?;
        Ok(types)
    }

    pub async fn create_type(&self, actor: Option<&Actor>, name: &str) -> Result<DiscoveryType> {
        self.require_admin(actor)?;
        Validator::new().min_len("name", name, 2).finish()?;

        let name = name.trim();
        let id = sqlx::query("INSERT INTO discovery_types (name) VALUES (?)")
            .bind(name)
            .execute(&self.db)
            .await
            .map_err(|e| conflict_on_unique(e, "Já existe um tipo com este nome."))?
            .last_insert_rowid();

        info!(type_id = id, type_name = name, "Discovery type created");
        Ok(DiscoveryType { id, name: name.to_string() })
    }

    pub async fn rename_type(&self, actor: Option<&Actor>, id: i64, name: &str) -> Result<DiscoveryType> {
        self.require_admin(actor)?;
        Validator::new().min_len("name", name, 2).finish()?;

        let name = name.trim();
        let updated = sqlx::query("UPDATE discovery_types SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(|e| conflict_on_unique(e, "Já existe um tipo com este nome."))?
            .rows_affected();

        if updated == 0 {
            return Err(Error::NotFound(format!("tipo {}", id)));
        }
        Ok(DiscoveryType { id, name: name.to_string() })
    }

    /// Delete a type nothing refers to
    ///
    /// Referenced types fail with `InUse` and are left intact.
    pub async fn delete_type(&self, actor: Option<&Actor>, id: i64) -> Result<()> {
        self.require_admin(actor)?;

        let mut tx = self.db.begin().await?;
        let discoveries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discoveries WHERE type_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if discoveries > 0 {
            warn!(type_id = id, discoveries, "Discovery type still in use");
            return Err(Error::InUse {
                what: "Este tipo".to_string(),
                count: discoveries,
            });
        }

        let submissions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE type_id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if submissions > 0 {
            warn!(type_id = id, submissions, "Discovery type referenced by submissions");
            return Err(Error::InUse {
                what: "Este tipo".to_string(),
                count: submissions,
            });
        }

        let deleted = sqlx::query("DELETE FROM discovery_types WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if deleted == 0 {
            return Err(Error::NotFound(format!("tipo {}", id)));
        }

        tx.commit().await?;
        info!(type_id = id, "Discovery type deleted");
        Ok(())
    }

    // ========================================================================
    // Discoveries
    // ========================================================================

    async fn validate_discovery(&self, payload: &DiscoveryPayload) -> Result<()> {
        let type_ok = discovery_type_exists(&self.db, payload.type_id).await?;
        let confraria_ok = match payload.confraria_id {
            Some(id) => confraria_exists(&self.db, id).await?,
            None => true,
        };
        let images_ok = payload
            .images
            .iter()
            .flatten()
            .all(|image| is_valid_url(image.image_url.trim()));

        Validator::new()
            .min_len("title", &payload.title, 3)
            .min_len("editorial", &payload.editorial, 10)
            .check(type_ok, "type_id", "Escolhe um tipo de descoberta válido.")
            .check(confraria_ok, "confraria_id", "Escolhe uma confraria válida.")
            .optional_url("website", payload.website.as_deref())
            .check(images_ok, "images", "Todas as imagens precisam de um URL válido.")
            .check(
                payload.latitude.map_or(true, |lat| (-90.0..=90.0).contains(&lat)),
                "latitude",
                "Latitude fora do intervalo.",
            )
            .check(
                payload.longitude.map_or(true, |lon| (-180.0..=180.0).contains(&lon)),
                "longitude",
                "Longitude fora do intervalo.",
            )
            .finish()
    }

    fn description_for(payload: &DiscoveryPayload) -> String {
        normalize_optional(payload.description.clone())
            .unwrap_or_else(|| summarize_editorial(&payload.editorial))
    }

    pub async fn create_discovery(&self, actor: Option<&Actor>, payload: DiscoveryPayload) -> Result<Discovery> {
        self.require_admin(actor)?;
        self.validate_discovery(&payload).await?;

        let mut tx = self.db.begin().await?;
        let slug = unique_slug(&mut tx, &payload.title).await?;

        let id = sqlx::query(
            r#"
            INSERT INTO discoveries (
                slug, title, description, editorial, region, type_id, confraria_id,
                address, website, phone, latitude, longitude, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&slug)
        .bind(payload.title.trim())
        .bind(Self::description_for(&payload))
        .bind(payload.editorial.trim())
        .bind(payload.region.as_str())
        .bind(payload.type_id)
        .bind(payload.confraria_id)
        .bind(normalize_optional(payload.address.clone()))
        .bind(normalize_optional(payload.website.clone()))
        .bind(normalize_optional(payload.phone.clone()))
        .bind(payload.latitude)
        .bind(payload.longitude)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        if let Some(images) = &payload.images {
            replace_images(&mut tx, id, images).await?;
        }
        tx.commit().await?;

        info!(discovery_id = id, slug = %slug, "Discovery created");
        self.fetch_discovery(id).await
    }

    /// Update every field except the slug
    pub async fn update_discovery(&self, actor: Option<&Actor>, id: i64, payload: DiscoveryPayload) -> Result<Discovery> {
        self.require_admin(actor)?;
        self.validate_discovery(&payload).await?;

        let mut tx = self.db.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE discoveries
            SET title = ?, description = ?, editorial = ?, region = ?, type_id = ?,
                confraria_id = ?, address = ?, website = ?, phone = ?,
                latitude = ?, longitude = ?
            WHERE id = ?
            "#,
        )
        .bind(payload.title.trim())
        .bind(Self::description_for(&payload))
        .bind(payload.editorial.trim())
        .bind(payload.region.as_str())
        .bind(payload.type_id)
        .bind(payload.confraria_id)
        .bind(normalize_optional(payload.address.clone()))
        .bind(normalize_optional(payload.website.clone()))
        .bind(normalize_optional(payload.phone.clone()))
        .bind(payload.latitude)
        .bind(payload.longitude)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(Error::NotFound(format!("descoberta {}", id)));
        }
        if let Some(images) = &payload.images {
            replace_images(&mut tx, id, images).await?;
        }
        tx.commit().await?;

        info!(discovery_id = id, "Discovery updated");
        self.fetch_discovery(id).await
    }

    pub async fn delete_discovery(&self, actor: Option<&Actor>, id: i64) -> Result<()> {
        self.require_admin(actor)?;
        let deleted = sqlx::query("DELETE FROM discoveries WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(Error::NotFound(format!("descoberta {}", id)));
        }
        info!(discovery_id = id, "Discovery deleted");
        Ok(())
    }

    async fn fetch_discovery(&self, id: i64) -> Result<Discovery> {
        sqlx::query_as::<_, Discovery>("SELECT * FROM discoveries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| Error::NotFound(format!("descoberta {}", id)))
    }

    pub async fn list_discoveries(&self, filter: &DiscoveryFilter) -> Result<Page<DiscoverySummary>> {
        let region = filter.region.map(|r| r.as_str());
        let search = filter
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM discoveries d {}", FILTER_WHERE))
            .bind(region)
            .bind(filter.type_id)
            .bind(filter.confraria_id)
            .bind(search)
            .fetch_one(&self.db)
            .await?;

        let pagination = calculate_pagination(total, filter.page.unwrap_or(1));

        let items = sqlx::query_as::<_, DiscoverySummary>(&format!(
            "{} {} ORDER BY d.created_at DESC, d.id DESC LIMIT ?5 OFFSET ?6",
            SUMMARY_SELECT, FILTER_WHERE
        ))
        .bind(region)
        .bind(filter.type_id)
        .bind(filter.confraria_id)
        .bind(search)
        .bind(PAGE_SIZE)
        .bind(pagination.offset)
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(items, pagination, total))
    }

    pub async fn get_discovery_by_slug(&self, slug: &str) -> Result<DiscoveryDetail> {
        let discovery = sqlx::query_as::<_, Discovery>("SELECT * FROM discoveries WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| Error::NotFound(format!("descoberta {}", slug)))?;

        let type_name: String = sqlx::query_scalar("SELECT name FROM discovery_types WHERE id = ?")
            .bind(discovery.type_id)
            .fetch_one(&self.db)
            .await?;

        let confraria = match discovery.confraria_id {
            Some(id) => Some(fetch_confraria(&self.db, id).await?),
            None => None,
        };

        let images = sqlx::query_as::<_, DiscoveryImage>(
            "SELECT * FROM discovery_images WHERE discovery_id = ? ORDER BY id",
        )
        .bind(discovery.id)
        .fetch_all(&self.db)
        .await?;

        let seal_count = seal_count(&self.db, discovery.id).await?;
        let testimonials = testimonials_with_authors(&self.db, self.identity.as_ref(), discovery.id).await?;

        Ok(DiscoveryDetail {
            discovery,
            type_name,
            confraria,
            images,
            seal_count,
            testimonials,
        })
    }

    // ========================================================================
    // Confrarias
    // ========================================================================

    pub async fn list_confrarias(&self) -> Result<Vec<Confraria>> {
        let confrarias = sqlx::query_as::<_, Confraria>("SELECT * FROM confrarias ORDER BY name")
            .fetch_all(&self.db)
            .await?;
        Ok(confrarias)
    }

    pub async fn get_confraria(&self, id: i64) -> Result<ConfrariaDetail> {
        let confraria = fetch_confraria(&self.db, id).await?;
        let published = PublicationStatus::Published.as_str();

        let discoveries = sqlx::query_as::<_, DiscoverySummary>(&format!(
            "{} WHERE d.confraria_id = ? ORDER BY d.title",
            SUMMARY_SELECT
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let articles = sqlx::query_as::<_, Article>(
            "SELECT * FROM articles WHERE confraria_id = ? AND status = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(id)
        .bind(published)
        .fetch_all(&self.db)
        .await?;

        let recipes = sqlx::query_as::<_, Recipe>(
            "SELECT * FROM recipes WHERE confraria_id = ? AND status = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(id)
        .bind(published)
        .fetch_all(&self.db)
        .await?;

        let events = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE confraria_id = ? ORDER BY event_date, id")
            .bind(id)
            .fetch_all(&self.db)
            .await?;

        let gallery = sqlx::query_as::<_, GalleryImage>(
            "SELECT * FROM confraria_gallery_images WHERE confraria_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let member_count = approved_member_count(&self.db, id).await?;

        Ok(ConfrariaDetail {
            confraria,
            discoveries,
            articles,
            recipes,
            events,
            gallery,
            member_count,
        })
    }

    pub async fn create_confraria(&self, actor: Option<&Actor>, payload: ConfrariaPayload) -> Result<Confraria> {
        self.require_admin(actor)?;
        let motto = normalize_optional(payload.motto);
        Validator::new()
            .min_len("name", &payload.name, 3)
            .max_len("motto", motto.as_deref(), 200)
            .finish()?;

        let id = sqlx::query("INSERT INTO confrarias (name, region, motto, created_at) VALUES (?, ?, ?, ?)")
            .bind(payload.name.trim())
            .bind(payload.region.as_str())
            .bind(&motto)
            .bind(Utc::now())
            .execute(&self.db)
            .await?
            .last_insert_rowid();

        info!(confraria_id = id, "Confraria created");
        fetch_confraria(&self.db, id).await
    }

    /// Delete a confraria; its discoveries stay in the catalog without one
    pub async fn delete_confraria(&self, actor: Option<&Actor>, id: i64) -> Result<()> {
        self.require_admin(actor)?;
        let deleted = sqlx::query("DELETE FROM confrarias WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(Error::NotFound(format!("confraria {}", id)));
        }
        info!(confraria_id = id, "Confraria deleted");
        Ok(())
    }

    /// Set or clear the responsible user, looked up by email
    pub async fn assign_responsible(&self, actor: Option<&Actor>, confraria_id: i64, email: Option<&str>) -> Result<Confraria> {
        self.require_admin(actor)?;
        fetch_confraria(&self.db, confraria_id).await?;

        let responsible = match email.map(str::trim).filter(|e| !e.is_empty()) {
            Some(email) => {
                let user = self
                    .identity
                    .get_user_by_email(email)
                    .await?
                    .ok_or_else(|| Error::validation("email", "Não existe nenhum utilizador com este email."))?;
                Some(user.id)
            }
            None => None,
        };

        sqlx::query("UPDATE confrarias SET responsible_user_id = ? WHERE id = ?")
            .bind(&responsible)
            .bind(confraria_id)
            .execute(&self.db)
            .await?;

        info!(confraria_id, responsible = ?responsible, "Confraria responsible assigned");
        fetch_confraria(&self.db, confraria_id).await
    }
}
