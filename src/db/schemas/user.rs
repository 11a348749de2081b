//! User document schema
//!
//! Credentials live with the token issuer; this service only reads profile
//! fields and maintains the watch history.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Lowercased unique handle
    pub user_name: String,

    pub email: String,

    pub full_name: String,

    /// Avatar image URL
    #[serde(default)]
    pub avatar: String,

    #[serde(default)]
    pub cover_image: String,

    /// Videos this user has opened, without duplicates
    #[serde(default)]
    pub watch_history: Vec<ObjectId>,
}

impl UserDoc {
    pub fn new(user_name: &str, email: &str, full_name: &str) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user_name: user_name.to_lowercase(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            avatar: String::new(),
            cover_image: String::new(),
            watch_history: Vec::new(),
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "userName": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_name_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            // Serves the watch-history $pull during video deletion
            (
                doc! { "watchHistory": 1 },
                Some(
                    IndexOptions::builder()
                        .name("watch_history_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
