//! Playlist document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for playlists
pub const PLAYLIST_COLLECTION: &str = "playlists";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    #[serde(default)]
    pub description: String,

    pub owner: ObjectId,

    /// Ordered, duplicate-free
    #[serde(default)]
    pub videos: Vec<ObjectId>,
}

impl PlaylistDoc {
    pub fn new(owner: ObjectId, name: String, description: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            name,
            description,
            owner,
            videos: Vec::new(),
        }
    }
}

impl IntoIndexes for PlaylistDoc {
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
                doc! { "videos": 1 },
                Some(
                    IndexOptions::builder()
                        .name("videos_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for PlaylistDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
