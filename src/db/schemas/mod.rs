//! Database schemas for VideoTube
//!
//! Defines MongoDB document structures for every collection the service
//! touches.

mod comment;
mod like;
mod metadata;
mod playlist;
mod subscription;
mod tweet;
mod user;
mod video;

pub use comment::{CommentDoc, COMMENT_COLLECTION};
pub use like::{LikeDoc, LikeTarget, LIKE_COLLECTION};
pub use metadata::Metadata;
pub use playlist::{PlaylistDoc, PLAYLIST_COLLECTION};
pub use subscription::{SubscriptionDoc, SUBSCRIPTION_COLLECTION};
pub use tweet::{TweetDoc, TWEET_COLLECTION};
pub use user::{UserDoc, USER_COLLECTION};
pub use video::{VideoDoc, VIDEO_COLLECTION};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaAsset;
    use bson::{doc, oid::ObjectId, DateTime};

    fn asset(id: &str) -> bson::Document {
        doc! { "url": format!("https://cdn.test/{}.bin", id), "publicId": id }
    }

    #[test]
    fn test_user_reads_stored_shape() {
        let id = ObjectId::new();
        let watched = ObjectId::new();
        let user: UserDoc = bson::from_document(doc! {
            "_id": id,
            "metadata": { "createdAt": DateTime::now() },
            "userName": "ada",
            "email": "ada@example.com",
            "fullName": "Ada L",
            "coverImage": "https://cdn.test/cover.png",
            "watchHistory": [watched],
        })
        .unwrap();

        assert_eq!(user._id, Some(id));
        assert_eq!(user.cover_image, "https://cdn.test/cover.png");
        assert_eq!(user.watch_history, vec![watched]);

        let stored = bson::to_document(&user).unwrap();
        assert_eq!(stored.get_object_id("_id").unwrap(), id);
        assert!(stored.get("id").is_none());
        assert!(stored.contains_key("watchHistory"));
    }

    #[test]
    fn test_unsaved_document_omits_id() {
        let stored = bson::to_document(&UserDoc::new("ada", "a@b.c", "Ada")).unwrap();
        assert!(!stored.contains_key("_id"));
        assert!(!stored.contains_key("id"));
    }

    #[test]
    fn test_video_reads_stored_shape() {
        let id = ObjectId::new();
        let owner = ObjectId::new();
        let video: VideoDoc = bson::from_document(doc! {
            "_id": id,
            "owner": owner,
            "videoFile": asset("v"),
            "thumbnail": asset("t"),
            "title": "Intro",
            "description": "First",
            "duration": 12.5,
            "views": 3_i64,
            "isPublished": false,
        })
        .unwrap();

        assert_eq!(video._id, Some(id));
        assert_eq!(video.owner, owner);
        assert_eq!(video.thumbnail.public_id, "t");
        assert!(!video.is_published);

        let stored = bson::to_document(&video).unwrap();
        assert_eq!(stored.get_object_id("_id").unwrap(), id);
        assert_eq!(
            stored.get_document("videoFile").unwrap().get_str("publicId").unwrap(),
            "v"
        );

        let fresh = VideoDoc::new(
            owner,
            "t".into(),
            "d".into(),
            MediaAsset::default(),
            MediaAsset::default(),
        );
        assert!(!bson::to_document(&fresh).unwrap().contains_key("_id"));
    }

    #[test]
    fn test_comment_reads_stored_shape() {
        let id = ObjectId::new();
        let video = ObjectId::new();
        let comment: CommentDoc = bson::from_document(doc! {
            "_id": id,
            "video": video,
            "owner": ObjectId::new(),
            "content": "hi",
        })
        .unwrap();

        assert_eq!(comment._id, Some(id));
        assert_eq!(comment.video, video);
        assert_eq!(
            bson::to_document(&comment).unwrap().get_object_id("_id").unwrap(),
            id
        );
    }

    #[test]
    fn test_like_reads_stored_shape() {
        let id = ObjectId::new();
        let comment = ObjectId::new();
        let like: LikeDoc = bson::from_document(doc! {
            "_id": id,
            "target": { "comment": comment },
            "likedBy": ObjectId::new(),
        })
        .unwrap();

        assert_eq!(like._id, Some(id));
        assert_eq!(like.target, LikeTarget::Comment(comment));
        assert_eq!(
            bson::to_document(&like).unwrap().get_object_id("_id").unwrap(),
            id
        );
    }

    #[test]
    fn test_playlist_reads_stored_shape() {
        let id = ObjectId::new();
        let video = ObjectId::new();
        let playlist: PlaylistDoc = bson::from_document(doc! {
            "_id": id,
            "name": "Favourites",
            "owner": ObjectId::new(),
            "videos": [video],
        })
        .unwrap();

        assert_eq!(playlist._id, Some(id));
        assert_eq!(playlist.videos, vec![video]);
        assert_eq!(playlist.description, "");
        assert_eq!(
            bson::to_document(&playlist).unwrap().get_object_id("_id").unwrap(),
            id
        );
    }

    #[test]
    fn test_subscription_reads_stored_shape() {
        let id = ObjectId::new();
        let channel = ObjectId::new();
        let sub: SubscriptionDoc = bson::from_document(doc! {
            "_id": id,
            "subscriber": ObjectId::new(),
            "channel": channel,
        })
        .unwrap();

        assert_eq!(sub._id, Some(id));
        assert_eq!(sub.channel, channel);
        assert_eq!(
            bson::to_document(&sub).unwrap().get_object_id("_id").unwrap(),
            id
        );
    }

    #[test]
    fn test_tweet_reads_stored_shape() {
        let id = ObjectId::new();
        let tweet: TweetDoc = bson::from_document(doc! {
            "_id": id,
            "owner": ObjectId::new(),
            "content": "hello",
        })
        .unwrap();

        assert_eq!(tweet._id, Some(id));
        assert_eq!(
            bson::to_document(&tweet).unwrap().get_object_id("_id").unwrap(),
            id
        );
    }
}
