//! Like document schema
//!
//! A like points at exactly one video or one comment. The target is stored
//! as a single tagged sub-document (`{"target": {"video": <id>}}` or
//! `{"target": {"comment": <id>}}`) so a like can never carry both.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for likes
pub const LIKE_COLLECTION: &str = "likes";

/// What a like refers to
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum LikeTarget {
    Video(ObjectId),
    Comment(ObjectId),
}

impl LikeTarget {
    /// Filter matching likes on this target
    pub fn filter(&self) -> Document {
        match self {
            Self::Video(id) => doc! { "target.video": id },
            Self::Comment(id) => doc! { "target.comment": id },
        }
    }

    pub fn video(&self) -> Option<ObjectId> {
        match self {
            Self::Video(id) => Some(*id),
            Self::Comment(_) => None,
        }
    }

    pub fn comment(&self) -> Option<ObjectId> {
        match self {
            Self::Comment(id) => Some(*id),
            Self::Video(_) => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LikeDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub target: LikeTarget,

    pub liked_by: ObjectId,
}

impl LikeDoc {
    pub fn new(target: LikeTarget, liked_by: ObjectId) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            target,
            liked_by,
        }
    }
}

impl IntoIndexes for LikeDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "target.video": 1 },
                Some(
                    IndexOptions::builder()
                        .name("target_video_index".to_string())
                        .sparse(true)
                        .build(),
                ),
            ),
            (
                doc! { "target.comment": 1 },
                Some(
                    IndexOptions::builder()
                        .name("target_comment_index".to_string())
                        .sparse(true)
                        .build(),
                ),
            ),
            // One like per user and target
            (
                doc! { "target": 1, "likedBy": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("target_liked_by_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for LikeDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_is_single_tagged_field() {
        let video = ObjectId::new();
        let like = LikeDoc::new(LikeTarget::Video(video), ObjectId::new());

        let stored = bson::to_document(&like).unwrap();
        let target = stored.get_document("target").unwrap();
        assert_eq!(target.len(), 1);
        assert_eq!(target.get_object_id("video").unwrap(), video);

        let back: LikeDoc = bson::from_document(stored).unwrap();
        assert_eq!(back.target, LikeTarget::Video(video));
    }

    #[test]
    fn test_target_filter_paths() {
        let id = ObjectId::new();
        assert_eq!(LikeTarget::Video(id).filter(), doc! { "target.video": id });
        assert_eq!(
            LikeTarget::Comment(id).filter(),
            doc! { "target.comment": id }
        );
        assert_eq!(LikeTarget::Comment(id).video(), None);
        assert_eq!(LikeTarget::Comment(id).comment(), Some(id));
    }
}
