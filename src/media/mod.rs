//! Media store adapter
//!
//! Videos and thumbnails live in an external store. The service only ever
//! hands it a staged local file and gets back a descriptor, or asks it to
//! delete a previously stored object.
//!
//! Deletion distinguishes "object already gone" from a failed request so
//! that a retried video deletion does not trip over media removed by an
//! earlier, partially failed attempt.

pub mod cloudinary;
pub mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::warn;

use crate::types::Result;

pub use cloudinary::CloudinaryStore;
pub use local::LocalMediaStore;

/// Kind of stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of a stored object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    /// Delivery URL (https when the store offers it)
    pub url: String,

    /// Store-side identifier used for deletion
    #[serde(default)]
    pub public_id: String,

    /// Length in seconds, videos only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl MediaAsset {
    /// Identifier to delete by
    ///
    /// Older documents stored only the URL. For a delivery URL of the form
    /// `.../upload/[<transformations>/]v<version>/<folder>/<name>.<ext>` the
    /// identifier is `<folder>/<name>`. Anything else is a guess and is
    /// logged, since a wrong guess makes the store answer "not found".
    pub fn delete_id(&self) -> Option<String> {
        if !self.public_id.is_empty() {
            return Some(self.public_id.clone());
        }

        let path = self.url.split(['?', '#']).next().unwrap_or("");
        if let Some(id) = public_id_from_delivery_path(path) {
            return Some(id);
        }

        let guess = strip_extension(path.rsplit('/').next().unwrap_or(""));
        if guess.is_empty() {
            return None;
        }
        warn!(url = %self.url, "Guessed media id '{}' from an unversioned URL", guess);
        Some(guess.to_string())
    }
}

fn public_id_from_delivery_path(path: &str) -> Option<String> {
    let (_, after_upload) = path.split_once("/upload/")?;
    let segments: Vec<&str> = after_upload.split('/').collect();
    let version = segments.iter().position(|s| is_version_segment(s))?;

    let id = segments[version + 1..].join("/");
    let id = strip_extension(&id);
    (!id.is_empty()).then(|| id.to_string())
}

fn is_version_segment(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.contains('/') => stem,
        _ => name,
    }
}

/// Result of a delete request the store accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing was stored under the identifier
    AlreadyAbsent,
}

/// External media store
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Short backend name for logs and health output
    fn name(&self) -> &'static str;

    /// Upload a staged local file
    async fn upload(&self, local_path: &Path, kind: MediaKind) -> Result<MediaAsset>;

    /// Delete a stored object
    async fn delete(&self, asset: &MediaAsset, kind: MediaKind) -> Result<DeleteOutcome>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted media store for workflow tests

    use super::*;
    use crate::types::AppError;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Records every call; individual operations can be made to fail
    #[derive(Default)]
    pub struct FakeMediaStore {
        pub uploads: Mutex<Vec<(PathBuf, MediaKind)>>,
        pub deletes: Mutex<Vec<(String, MediaKind)>>,
        pub fail_delete: Mutex<Option<MediaKind>>,
        pub fail_upload: Mutex<Option<MediaKind>>,
        pub absent: Mutex<bool>,
    }

    impl FakeMediaStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_delete(kind: MediaKind) -> Self {
            let store = Self::default();
            *store.fail_delete.lock().unwrap() = Some(kind);
            store
        }

        pub fn failing_upload(kind: MediaKind) -> Self {
            let store = Self::default();
            *store.fail_upload.lock().unwrap() = Some(kind);
            store
        }

        pub fn deleted(&self) -> Vec<(String, MediaKind)> {
            self.deletes.lock().unwrap().clone()
        }

        pub fn uploaded(&self) -> Vec<(PathBuf, MediaKind)> {
            self.uploads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaStore for FakeMediaStore {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn upload(&self, local_path: &Path, kind: MediaKind) -> Result<MediaAsset> {
            if *self.fail_upload.lock().unwrap() == Some(kind) {
                return Err(AppError::MediaStore(format!("{} upload rejected", kind)));
            }
            self.uploads
                .lock()
                .unwrap()
                .push((local_path.to_path_buf(), kind));

            let name = local_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("file")
                .to_string();
            Ok(MediaAsset {
                url: format!("https://media.test/{}/{}", kind, name),
                public_id: format!("{}-{}", kind, name),
                duration: match kind {
                    MediaKind::Video => Some(42.5),
                    MediaKind::Image => None,
                },
            })
        }

        async fn delete(&self, asset: &MediaAsset, kind: MediaKind) -> Result<DeleteOutcome> {
            if *self.fail_delete.lock().unwrap() == Some(kind) {
                return Err(AppError::MediaStore(format!("{} store unreachable", kind)));
            }
            self.deletes
                .lock()
                .unwrap()
                .push((asset.delete_id().unwrap_or_default(), kind));
            if *self.absent.lock().unwrap() {
                Ok(DeleteOutcome::AlreadyAbsent)
            } else {
                Ok(DeleteOutcome::Deleted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_id_prefers_public_id() {
        let asset = MediaAsset {
            url: "https://res.cloudinary.com/demo/video/upload/v1/abc.mp4".into(),
            public_id: "videos/abc".into(),
            duration: None,
        };
        assert_eq!(asset.delete_id().as_deref(), Some("videos/abc"));
    }

    #[test]
    fn test_delete_id_derived_from_url() {
        let asset = MediaAsset {
            url: "https://res.cloudinary.com/demo/image/upload/v1712/thumb_x1.png?x=1".into(),
            public_id: String::new(),
            duration: None,
        };
        assert_eq!(asset.delete_id().as_deref(), Some("thumb_x1"));

        let empty = MediaAsset::default();
        assert_eq!(empty.delete_id(), None);
    }

    #[test]
    fn test_delete_id_keeps_folder_prefix() {
        let asset = MediaAsset {
            url: "https://res.cloudinary.com/demo/video/upload/v1712/videotube/abc.mp4".into(),
            ..Default::default()
        };
        assert_eq!(asset.delete_id().as_deref(), Some("videotube/abc"));

        let transformed = MediaAsset {
            url: "https://res.cloudinary.com/demo/image/upload/c_fill,w_300/v42/users/u1/avatar.jpg"
                .into(),
            ..Default::default()
        };
        assert_eq!(transformed.delete_id().as_deref(), Some("users/u1/avatar"));
    }

    #[test]
    fn test_delete_id_guess_for_unversioned_url() {
        let asset = MediaAsset {
            url: "http://localhost:8000/media/clip.mp4".into(),
            ..Default::default()
        };
        assert_eq!(asset.delete_id().as_deref(), Some("clip"));
    }
}
