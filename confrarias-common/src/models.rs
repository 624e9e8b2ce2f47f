//! Domain models
//!
//! Enumerations are stored as TEXT; row structs read them through
//! `#[sqlx(try_from = "String")]` so an unknown value in the database
//! surfaces as a decode error instead of a silent default.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a stored or submitted enumeration value is not recognised
#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseEnumError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

/// Portuguese region (closed set of seven)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    Norte,
    Centro,
    #[serde(rename = "Lisboa e Vale do Tejo")]
    Lisboa,
    Alentejo,
    Algarve,
    #[serde(rename = "Açores")]
    Acores,
    Madeira,
}

text_enum!(Region, "region", {
    Norte => "Norte",
    Centro => "Centro",
    Lisboa => "Lisboa e Vale do Tejo",
    Alentejo => "Alentejo",
    Algarve => "Algarve",
    Acores => "Açores",
    Madeira => "Madeira",
});

/// Moderation state of a community submission
///
/// `Aprovado` and `Rejeitado` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Pendente,
    Aprovado,
    Rejeitado,
}

text_enum!(SubmissionStatus, "submission status", {
    Pendente => "Pendente",
    Aprovado => "Aprovado",
    Rejeitado => "Rejeitado",
});

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubmissionStatus::Pendente)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Pending,
    Approved,
}

text_enum!(MembershipStatus, "membership status", {
    Pending => "pending",
    Approved => "approved",
});

/// Draft/publish flag for articles and recipes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    #[default]
    Draft,
    Published,
}

text_enum!(PublicationStatus, "publication status", {
    Draft => "draft",
    Published => "published",
});

/// Where an uploaded confraria image ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagePurpose {
    /// Replaces `seal_url`
    Seal,
    /// Replaces `cover_url`
    Cover,
    /// Adds a gallery row
    Gallery,
    /// Upload only; the URL is used in article, recipe or event payloads
    Content,
}

text_enum!(ImagePurpose, "image purpose", {
    Seal => "seal",
    Cover => "cover",
    Gallery => "gallery",
    Content => "content",
});

/// The authenticated caller of a workflow operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: String,
    pub email: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Confraria {
    pub id: i64,
    pub name: String,
    pub motto: Option<String>,
    #[sqlx(try_from = "String")]
    pub region: Region,
    pub seal_url: Option<String>,
    pub seal_hint: Option<String>,
    pub cover_url: Option<String>,
    pub history: Option<String>,
    pub founders: Option<String>,
    pub responsible_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DiscoveryType {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Discovery {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub editorial: String,
    #[sqlx(try_from = "String")]
    pub region: Region,
    pub type_id: i64,
    pub confraria_id: Option<i64>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DiscoveryImage {
    pub id: i64,
    pub discovery_id: i64,
    pub image_url: String,
    pub image_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Submission {
    pub id: i64,
    pub user_id: String,
    pub discovery_title: String,
    pub editorial: String,
    #[sqlx(try_from = "String")]
    pub region: Region,
    pub type_id: i64,
    pub confraria_id: Option<i64>,
    pub links: Option<String>,
    pub website: Option<String>,
    pub image_url: Option<String>,
    pub date: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: SubmissionStatus,
    /// Discovery created when this submission was approved
    pub resolved_discovery_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ConfrariaMember {
    pub id: i64,
    pub user_id: String,
    pub confraria_id: i64,
    #[sqlx(try_from = "String")]
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Testimonial {
    pub id: i64,
    pub user_id: String,
    pub discovery_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub confraria_id: i64,
    pub author_id: Option<String>,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: PublicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Recipe {
    pub id: i64,
    pub confraria_id: i64,
    pub author_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub ingredients: String,
    pub instructions: String,
    pub image_url: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: PublicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub confraria_id: i64,
    pub author_id: Option<String>,
    pub name: String,
    pub description: String,
    pub event_date: NaiveDate,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GalleryImage {
    pub id: i64,
    pub confraria_id: i64,
    pub image_url: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}
