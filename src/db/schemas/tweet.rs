//! Tweet document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for tweets
pub const TWEET_COLLECTION: &str = "tweets";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TweetDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub content: String,

    pub owner: ObjectId,
}

impl TweetDoc {
    pub fn new(owner: ObjectId, content: String) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            content,
            owner,
        }
    }
}

impl IntoIndexes for TweetDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "owner": 1, "metadata.createdAt": -1 },
            Some(
                IndexOptions::builder()
                    .name("owner_recent_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for TweetDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
