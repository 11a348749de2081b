//! Local-disk media store for development
//!
//! Copies staged files under `<root>/<kind>/` with a fresh UUID name and
//! serves them from `<public_url>/<kind>/<name>`.

use async_trait::async_trait;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use super::{DeleteOutcome, MediaAsset, MediaKind, MediaStore};
use crate::types::{AppError, Result};

pub struct LocalMediaStore {
    root: PathBuf,
    public_url: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// On-disk location of a stored object
    fn object_path(&self, public_id: &str) -> Result<PathBuf> {
        // public ids are "<kind>/<file name>"
        let (kind, name) = public_id
            .split_once('/')
            .ok_or_else(|| AppError::MediaStore(format!("Malformed media id '{}'", public_id)))?;
        let known_kind = kind == MediaKind::Image.as_str() || kind == MediaKind::Video.as_str();
        if !known_kind || name.is_empty() || name.contains('/') || name.contains("..") {
            return Err(AppError::MediaStore(format!(
                "Malformed media id '{}'",
                public_id
            )));
        }
        Ok(self.root.join(kind).join(name))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn upload(&self, local_path: &Path, kind: MediaKind) -> Result<MediaAsset> {
        let ext = local_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let name = format!("{}{}", Uuid::new_v4(), ext);

        let dir = self.root.join(kind.as_str());
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::copy(local_path, dir.join(&name))
            .await
            .map_err(|e| {
                AppError::InvalidArgument(format!(
                    "Cannot read staged file {}: {}",
                    local_path.display(),
                    e
                ))
            })?;

        info!("Stored {} locally as {}", kind, name);

        Ok(MediaAsset {
            url: format!("{}/{}/{}", self.public_url, kind, name),
            public_id: format!("{}/{}", kind, name),
            duration: None,
        })
    }

    async fn delete(&self, asset: &MediaAsset, kind: MediaKind) -> Result<DeleteOutcome> {
        let public_id = match asset.delete_id() {
            Some(id) if id.contains('/') => id,
            _ => format!("{}/{}", kind, asset.url.rsplit('/').next().unwrap_or("")),
        };
        let path = self.object_path(&public_id)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                warn!("{} {} was already absent", kind, public_id);
                Ok(DeleteOutcome::AlreadyAbsent)
            }
            Err(e) => Err(AppError::MediaStore(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
