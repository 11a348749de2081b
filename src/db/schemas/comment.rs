//! Comment document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for comments
pub const COMMENT_COLLECTION: &str = "comments";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommentDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Video the comment was posted on
    pub video: ObjectId,

    pub owner: ObjectId,

    pub content: String,
}

impl CommentDoc {
    pub fn new(video: ObjectId, owner: ObjectId, content: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            video,
            owner,
            content,
        }
    }
}

impl IntoIndexes for CommentDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "video": 1 },
            Some(
                IndexOptions::builder()
                    .name("video_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for CommentDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
