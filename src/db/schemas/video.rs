//! Video document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::media::MediaAsset;

/// Collection name for videos
pub const VIDEO_COLLECTION: &str = "videos";

/// Video document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Uploading user
    pub owner: ObjectId,

    /// Hosted video object
    pub video_file: MediaAsset,

    /// Hosted thumbnail image
    pub thumbnail: MediaAsset,

    pub title: String,

    pub description: String,

    /// Length in seconds as reported by the media store
    #[serde(default)]
    pub duration: f64,

    #[serde(default)]
    pub views: i64,

    #[serde(default = "default_true")]
    pub is_published: bool,
}

fn default_true() -> bool {
    true
}

impl VideoDoc {
    pub fn new(
        owner: ObjectId,
        title: String,
        description: String,
        video_file: MediaAsset,
        thumbnail: MediaAsset,
    ) -> Self {
        let duration = video_file.duration.unwrap_or_default();
        Self {
            _id: None,
            metadata: Metadata::new(),
            owner,
            video_file,
            thumbnail,
            title,
            description,
            duration,
            views: 0,
            is_published: true,
        }
    }
}

impl IntoIndexes for VideoDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "owner": 1 },
                Some(
                    IndexOptions::builder()
                        .name("owner_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "isPublished": 1, "metadata.createdAt": -1 },
                Some(
                    IndexOptions::builder()
                        .name("published_recent_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for VideoDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
