//! Repository contract
//!
//! Workflows and handlers receive the repository as an explicit
//! `Arc<dyn Repository>` dependency. [`CascadeRepository`] holds the
//! operations the video deletion saga needs; every one of its mutations is a
//! filter-based delete or `$pull`, so running them twice is harmless.

use async_trait::async_trait;
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::db::schemas::{
    CommentDoc, LikeTarget, PlaylistDoc, TweetDoc, UserDoc, VideoDoc,
};
use crate::media::MediaAsset;
use crate::types::Result;

/// Operations used by the video deletion cascade
#[async_trait]
pub trait CascadeRepository: Send + Sync {
    async fn find_video(&self, id: ObjectId) -> Result<Option<VideoDoc>>;

    /// Delete likes whose target is the video
    async fn delete_video_likes(&self, video: ObjectId) -> Result<u64>;

    /// Ids of every comment posted on the video
    async fn video_comment_ids(&self, video: ObjectId) -> Result<Vec<ObjectId>>;

    /// Delete likes whose target is any of the comments
    async fn delete_comment_likes(&self, comments: &[ObjectId]) -> Result<u64>;

    async fn delete_video_comments(&self, video: ObjectId) -> Result<u64>;

    /// Remove the video from every playlist, returning playlists modified
    async fn pull_video_from_playlists(&self, video: ObjectId) -> Result<u64>;

    /// Remove the video from every watch history, returning users modified
    async fn pull_video_from_watch_histories(&self, video: ObjectId) -> Result<u64>;

    /// Delete the video record, returning whether it existed
    async fn delete_video(&self, id: ObjectId) -> Result<bool>;
}

/// Sortable video fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSort {
    CreatedAt,
    Views,
    Duration,
    Title,
}

impl VideoSort {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "createdAt" => Some(Self::CreatedAt),
            "views" => Some(Self::Views),
            "duration" => Some(Self::Duration),
            "title" => Some(Self::Title),
            _ => None,
        }
    }

    /// Document path of the sort key
    pub fn field(&self) -> &'static str {
        match self {
            Self::CreatedAt => "metadata.createdAt",
            Self::Views => "views",
            Self::Duration => "duration",
            Self::Title => "title",
        }
    }
}

/// Video listing parameters
#[derive(Debug, Clone)]
pub struct VideoQuery {
    /// 1-based
    pub page: u64,
    pub limit: u64,
    /// Case-insensitive substring on title or description
    pub search: Option<String>,
    pub owner: Option<ObjectId>,
    pub include_unpublished: bool,
    pub sort: VideoSort,
    pub descending: bool,
}

impl Default for VideoQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            search: None,
            owner: None,
            include_unpublished: false,
            sort: VideoSort::CreatedAt,
            descending: true,
        }
    }
}

impl VideoQuery {
    pub fn skip(&self) -> u64 {
        (self.page.max(1) - 1) * self.limit
    }
}

/// One page of videos
#[derive(Debug, Clone)]
pub struct VideoPage {
    pub videos: Vec<VideoDoc>,
    pub total: u64,
}

/// Fields changed by a video update; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct VideoChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<MediaAsset>,
}

/// Profile fields a user may change; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

/// Image slots on a user profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserImage {
    Avatar,
    CoverImage,
}

impl UserImage {
    /// Stored field name, which is also the form field name
    pub fn field(&self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::CoverImage => "coverImage",
        }
    }

    /// Current URL of this slot on `user`
    pub fn url_of<'a>(&self, user: &'a UserDoc) -> &'a str {
        match self {
            Self::Avatar => &user.avatar,
            Self::CoverImage => &user.cover_image,
        }
    }
}

/// Public part of a user profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_name: String,
    pub full_name: String,
    #[serde(default)]
    pub avatar: String,
}

impl From<&UserDoc> for UserSummary {
    fn from(user: &UserDoc) -> Self {
        Self {
            id: user._id.unwrap_or_default(),
            user_name: user.user_name.clone(),
            full_name: user.full_name.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

/// Channel page data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProfile {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_name: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub cover_image: String,
    pub subscribers_count: i64,
    pub subscribed_to_channels_count: i64,
    /// Whether the viewer subscribes to this channel
    pub is_subscribed: bool,
}

/// A video paired with its owner's public profile
#[derive(Debug, Clone)]
pub struct VideoWithOwner {
    pub video: VideoDoc,
    pub owner: Option<UserSummary>,
}

/// Full repository used by request handlers
#[async_trait]
pub trait Repository: CascadeRepository {
    /// Backend name for health output
    fn backend(&self) -> &'static str;

    /// Check the backend can serve requests
    async fn ping(&self) -> Result<()>;

    // Users

    async fn find_user(&self, id: ObjectId) -> Result<Option<UserDoc>>;

    /// Public profiles of the given users, in the order asked for; unknown
    /// ids are skipped
    async fn user_summaries(&self, ids: &[ObjectId]) -> Result<Vec<UserSummary>>;

    /// Whether a user other than `except` already uses the email
    async fn email_taken(&self, email: &str, except: ObjectId) -> Result<bool>;

    async fn update_user_profile(
        &self,
        id: ObjectId,
        changes: ProfileChanges,
    ) -> Result<Option<UserDoc>>;

    /// `$set` an image URL on the profile
    async fn set_user_image(
        &self,
        id: ObjectId,
        image: UserImage,
        url: String,
    ) -> Result<Option<UserDoc>>;

    /// Add a video to a watch history, keeping it duplicate-free
    async fn add_to_watch_history(&self, user: ObjectId, video: ObjectId) -> Result<()>;

    async fn watch_history(&self, user: ObjectId) -> Result<Vec<VideoWithOwner>>;

    /// Channel profile by (case-insensitive) user name as seen by `viewer`
    async fn channel_profile(
        &self,
        user_name: &str,
        viewer: ObjectId,
    ) -> Result<Option<ChannelProfile>>;

    // Videos

    async fn insert_video(&self, video: VideoDoc) -> Result<VideoDoc>;

    async fn list_videos(&self, query: &VideoQuery) -> Result<VideoPage>;

    async fn update_video(&self, id: ObjectId, changes: VideoChanges) -> Result<Option<VideoDoc>>;

    async fn set_video_published(&self, id: ObjectId, published: bool)
        -> Result<Option<VideoDoc>>;

    async fn increment_video_views(&self, id: ObjectId) -> Result<()>;

    async fn count_likes(&self, target: LikeTarget) -> Result<u64>;

    async fn count_video_comments(&self, video: ObjectId) -> Result<u64>;

    // Comments

    async fn find_comment(&self, id: ObjectId) -> Result<Option<CommentDoc>>;

    async fn insert_comment(&self, comment: CommentDoc) -> Result<CommentDoc>;

    // Likes

    /// Add the like if absent, remove it if present; returns the new state
    async fn toggle_like(&self, target: LikeTarget, user: ObjectId) -> Result<bool>;

    // Playlists

    async fn find_playlist(&self, id: ObjectId) -> Result<Option<PlaylistDoc>>;

    async fn insert_playlist(&self, playlist: PlaylistDoc) -> Result<PlaylistDoc>;

    /// `$addToSet` the video onto the playlist
    async fn add_video_to_playlist(
        &self,
        playlist: ObjectId,
        video: ObjectId,
    ) -> Result<Option<PlaylistDoc>>;

    // Subscriptions

    /// Subscribe if not subscribed, unsubscribe otherwise; returns the new state
    async fn toggle_subscription(&self, subscriber: ObjectId, channel: ObjectId) -> Result<bool>;

    async fn channel_subscribers(&self, channel: ObjectId) -> Result<Vec<UserSummary>>;

    async fn subscribed_channels(&self, subscriber: ObjectId) -> Result<Vec<UserSummary>>;

    // Tweets

    async fn find_tweet(&self, id: ObjectId) -> Result<Option<TweetDoc>>;

    async fn insert_tweet(&self, tweet: TweetDoc) -> Result<TweetDoc>;

    /// Newest first
    async fn user_tweets(&self, owner: ObjectId) -> Result<Vec<TweetDoc>>;

    async fn delete_tweet(&self, id: ObjectId) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_sort_parse() {
        assert_eq!(VideoSort::parse("views"), Some(VideoSort::Views));
        assert_eq!(VideoSort::parse("createdAt").unwrap().field(), "metadata.createdAt");
        assert_eq!(VideoSort::parse("password"), None);
    }

    #[test]
    fn test_user_image_slots() {
        let mut user = UserDoc::new("ada", "a@b.c", "Ada");
        user.cover_image = "https://cdn.test/cover.png".into();
        assert_eq!(UserImage::Avatar.field(), "avatar");
        assert_eq!(UserImage::CoverImage.field(), "coverImage");
        assert_eq!(UserImage::Avatar.url_of(&user), "");
        assert_eq!(UserImage::CoverImage.url_of(&user), "https://cdn.test/cover.png");
    }

    #[test]
    fn test_query_skip() {
        let mut q = VideoQuery::default();
        assert_eq!(q.skip(), 0);
        q.page = 3;
        q.limit = 20;
        assert_eq!(q.skip(), 40);
        q.page = 0;
        assert_eq!(q.skip(), 0);
    }
}
