//! Blob store for uploaded images
//!
//! Workflows only see the `BlobStore` trait. `LocalBlobStore` keeps files
//! under `{root_folder}/storage/`, which the web service exposes at
//! `/storage/*`.

use crate::error::{Error, Result};
use crate::models::ImagePurpose;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path`, replacing any previous object
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    /// Public URL under which `path` is served
    fn public_url(&self, path: &str) -> String;
}

/// Storage path for a confraria image: `confrarias/{id}/{purpose}/{random}.{ext}`
pub fn image_path(confraria_id: i64, purpose: ImagePurpose, content_type: &str) -> String {
    format!(
        "confrarias/{}/{}/{}.{}",
        confraria_id,
        purpose,
        Uuid::new_v4(),
        extension_for(content_type)
    )
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        _ => "webp",
    }
}

/// Reject empty, absolute and parent-escaping paths
fn checked_relative(path: &str) -> Result<&Path> {
    let candidate = Path::new(path);
    let safe = !path.is_empty()
        && candidate
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

    if safe {
        Ok(candidate)
    } else {
        Err(Error::validation("image", format!("Caminho de armazenamento inválido: {}", path)))
    }
}

/// Filesystem-backed blob store
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    /// `base_url` is the public origin of the web service
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let full_path = self.root.join(checked_relative(path)?);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full_path, bytes).await?;

        debug!(path, content_type, size = bytes.len(), "Stored blob");
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/storage/{}", self.base_url, path)
    }
}
