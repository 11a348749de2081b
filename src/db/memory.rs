//! In-memory repository
//!
//! Implements the full repository contract over plain vectors behind a
//! single lock. Used by tests and by dev mode when MongoDB is unreachable.
//! Collections keep insertion order, which stands in for `createdAt` order.

use async_trait::async_trait;
use bson::{oid::ObjectId, DateTime};
use std::cmp::Ordering;
use tokio::sync::RwLock;

use crate::db::repository::{
    CascadeRepository, ChannelProfile, ProfileChanges, Repository, UserImage, UserSummary,
    VideoChanges, VideoPage, VideoQuery, VideoSort, VideoWithOwner,
};
use crate::db::schemas::{
    CommentDoc, LikeDoc, LikeTarget, Metadata, PlaylistDoc, SubscriptionDoc, TweetDoc, UserDoc,
    VideoDoc,
};
use crate::types::Result;

#[derive(Default, Clone)]
struct Collections {
    users: Vec<UserDoc>,
    videos: Vec<VideoDoc>,
    comments: Vec<CommentDoc>,
    likes: Vec<LikeDoc>,
    playlists: Vec<PlaylistDoc>,
    subscriptions: Vec<SubscriptionDoc>,
    tweets: Vec<TweetDoc>,
}

/// Point-in-time copy of every collection, for assertions
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub users: Vec<UserDoc>,
    pub videos: Vec<VideoDoc>,
    pub comments: Vec<CommentDoc>,
    pub likes: Vec<LikeDoc>,
    pub playlists: Vec<PlaylistDoc>,
}

#[derive(Default)]
pub struct MemoryRepository {
    data: RwLock<Collections>,
    #[cfg(test)]
    offline: std::sync::atomic::AtomicBool,
}

fn assign_id(id: &mut Option<ObjectId>) -> ObjectId {
    *id.get_or_insert_with(ObjectId::new)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn compare_videos(a: &VideoDoc, b: &VideoDoc, sort: VideoSort) -> Ordering {
    match sort {
        // Insertion order already is creation order
        VideoSort::CreatedAt => Ordering::Equal,
        VideoSort::Views => a.views.cmp(&b.views),
        VideoSort::Duration => a.duration.total_cmp(&b.duration),
        VideoSort::Title => a.title.cmp(&b.title),
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a user; users are otherwise created by the token issuer
    pub async fn insert_user(&self, mut user: UserDoc) -> UserDoc {
        assign_id(&mut user._id);
        self.data.write().await.users.push(user.clone());
        user
    }

    /// Make `ping` fail, as an unreachable database would
    #[cfg(test)]
    pub fn set_offline(&self, offline: bool) {
        self.offline
            .store(offline, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> Snapshot {
        let data = self.data.read().await;
        Snapshot {
            users: data.users.clone(),
            videos: data.videos.clone(),
            comments: data.comments.clone(),
            likes: data.likes.clone(),
            playlists: data.playlists.clone(),
        }
    }

    fn summaries(data: &Collections, ids: &[ObjectId]) -> Vec<UserSummary> {
        ids.iter()
            .filter_map(|id| data.users.iter().find(|u| u._id == Some(*id)))
            .map(UserSummary::from)
            .collect()
    }
}

#[async_trait]
impl CascadeRepository for MemoryRepository {
    async fn find_video(&self, id: ObjectId) -> Result<Option<VideoDoc>> {
        let data = self.data.read().await;
        Ok(data.videos.iter().find(|v| v._id == Some(id)).cloned())
    }

    async fn delete_video_likes(&self, video: ObjectId) -> Result<u64> {
        let mut data = self.data.write().await;
        let before = data.likes.len();
        data.likes.retain(|l| l.target != LikeTarget::Video(video));
        Ok((before - data.likes.len()) as u64)
    }

    async fn video_comment_ids(&self, video: ObjectId) -> Result<Vec<ObjectId>> {
        let data = self.data.read().await;
        Ok(data
            .comments
            .iter()
            .filter(|c| c.video == video)
            .filter_map(|c| c._id)
            .collect())
    }

    async fn delete_comment_likes(&self, comments: &[ObjectId]) -> Result<u64> {
        let mut data = self.data.write().await;
        let before = data.likes.len();
        data.likes.retain(|l| match l.target.comment() {
            Some(comment) => !comments.contains(&comment),
            None => true,
        });
        Ok((before - data.likes.len()) as u64)
    }

    async fn delete_video_comments(&self, video: ObjectId) -> Result<u64> {
        let mut data = self.data.write().await;
        let before = data.comments.len();
        data.comments.retain(|c| c.video != video);
        Ok((before - data.comments.len()) as u64)
    }

    async fn pull_video_from_playlists(&self, video: ObjectId) -> Result<u64> {
        let mut data = self.data.write().await;
        let mut modified = 0;
        for playlist in data.playlists.iter_mut() {
            if playlist.videos.contains(&video) {
                playlist.videos.retain(|v| *v != video);
                playlist.metadata.touch();
                modified += 1;
            }
        }
        Ok(modified)
    }

    async fn pull_video_from_watch_histories(&self, video: ObjectId) -> Result<u64> {
        let mut data = self.data.write().await;
        let mut modified = 0;
        for user in data.users.iter_mut() {
            if user.watch_history.contains(&video) {
                user.watch_history.retain(|v| *v != video);
                modified += 1;
            }
        }
        Ok(modified)
    }

    async fn delete_video(&self, id: ObjectId) -> Result<bool> {
        let mut data = self.data.write().await;
        let before = data.videos.len();
        data.videos.retain(|v| v._id != Some(id));
        Ok(data.videos.len() < before)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        #[cfg(test)]
        if self.offline.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(crate::types::AppError::Database("repository offline".into()));
        }
        Ok(())
    }

    async fn find_user(&self, id: ObjectId) -> Result<Option<UserDoc>> {
        let data = self.data.read().await;
        Ok(data.users.iter().find(|u| u._id == Some(id)).cloned())
    }

    async fn user_summaries(&self, ids: &[ObjectId]) -> Result<Vec<UserSummary>> {
        let data = self.data.read().await;
        Ok(Self::summaries(&data, ids))
    }

    async fn email_taken(&self, email: &str, except: ObjectId) -> Result<bool> {
        let data = self.data.read().await;
        Ok(data
            .users
            .iter()
            .any(|u| u.email == email && u._id != Some(except)))
    }

    async fn update_user_profile(
        &self,
        id: ObjectId,
        changes: ProfileChanges,
    ) -> Result<Option<UserDoc>> {
        let mut data = self.data.write().await;
        let user = match data.users.iter_mut().find(|u| u._id == Some(id)) {
            Some(u) => u,
            None => return Ok(None),
        };
        if let Some(full_name) = changes.full_name {
            user.full_name = full_name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        user.metadata.touch();
        Ok(Some(user.clone()))
    }

    async fn set_user_image(
        &self,
        id: ObjectId,
        image: UserImage,
        url: String,
    ) -> Result<Option<UserDoc>> {
        let mut data = self.data.write().await;
        let user = match data.users.iter_mut().find(|u| u._id == Some(id)) {
            Some(u) => u,
            None => return Ok(None),
        };
        match image {
            UserImage::Avatar => user.avatar = url,
            UserImage::CoverImage => user.cover_image = url,
        }
        user.metadata.touch();
        Ok(Some(user.clone()))
    }

    async fn add_to_watch_history(&self, user: ObjectId, video: ObjectId) -> Result<()> {
        let mut data = self.data.write().await;
        if let Some(u) = data.users.iter_mut().find(|u| u._id == Some(user)) {
            if !u.watch_history.contains(&video) {
                u.watch_history.push(video);
            }
        }
        Ok(())
    }

    async fn watch_history(&self, user: ObjectId) -> Result<Vec<VideoWithOwner>> {
        let data = self.data.read().await;
        let history = match data.users.iter().find(|u| u._id == Some(user)) {
            Some(u) => u.watch_history.clone(),
            None => return Ok(Vec::new()),
        };

        Ok(history
            .iter()
            .filter_map(|id| data.videos.iter().find(|v| v._id == Some(*id)))
            .map(|video| VideoWithOwner {
                video: video.clone(),
                owner: data
                    .users
                    .iter()
                    .find(|u| u._id == Some(video.owner))
                    .map(UserSummary::from),
            })
            .collect())
    }

    async fn channel_profile(
        &self,
        user_name: &str,
        viewer: ObjectId,
    ) -> Result<Option<ChannelProfile>> {
        let data = self.data.read().await;
        let wanted = user_name.to_lowercase();
        let user = match data.users.iter().find(|u| u.user_name == wanted) {
            Some(u) => u,
            None => return Ok(None),
        };
        let id = user._id.unwrap_or_default();

        let subscribers: Vec<&SubscriptionDoc> = data
            .subscriptions
            .iter()
            .filter(|s| s.channel == id)
            .collect();
        let subscribed_to = data
            .subscriptions
            .iter()
            .filter(|s| s.subscriber == id)
            .count();

        Ok(Some(ChannelProfile {
            id,
            user_name: user.user_name.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            cover_image: user.cover_image.clone(),
            subscribers_count: subscribers.len() as i64,
            subscribed_to_channels_count: subscribed_to as i64,
            is_subscribed: subscribers.iter().any(|s| s.subscriber == viewer),
        }))
    }

    async fn insert_video(&self, mut video: VideoDoc) -> Result<VideoDoc> {
        assign_id(&mut video._id);
        video.metadata = Metadata::new();
        self.data.write().await.videos.push(video.clone());
        Ok(video)
    }

    async fn list_videos(&self, query: &VideoQuery) -> Result<VideoPage> {
        let data = self.data.read().await;
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let mut matching: Vec<VideoDoc> = data
            .videos
            .iter()
            .filter(|v| query.include_unpublished || v.is_published)
            .filter(|v| query.owner.map_or(true, |o| v.owner == o))
            .filter(|v| {
                search.map_or(true, |s| {
                    contains_ci(&v.title, s) || contains_ci(&v.description, s)
                })
            })
            .cloned()
            .collect();

        // Stable sort keeps insertion order among equal keys
        matching.sort_by(|a, b| compare_videos(a, b, query.sort));
        if query.descending {
            matching.reverse();
        }

        let total = matching.len() as u64;
        let videos = matching
            .into_iter()
            .skip(query.skip() as usize)
            .take(query.limit as usize)
            .collect();

        Ok(VideoPage { videos, total })
    }

    async fn update_video(&self, id: ObjectId, changes: VideoChanges) -> Result<Option<VideoDoc>> {
        let mut data = self.data.write().await;
        let video = match data.videos.iter_mut().find(|v| v._id == Some(id)) {
            Some(v) => v,
            None => return Ok(None),
        };
        if let Some(title) = changes.title {
            video.title = title;
        }
        if let Some(description) = changes.description {
            video.description = description;
        }
        if let Some(thumbnail) = changes.thumbnail {
            video.thumbnail = thumbnail;
        }
        video.metadata.updated_at = Some(DateTime::now());
        Ok(Some(video.clone()))
    }

    async fn set_video_published(
        &self,
        id: ObjectId,
        published: bool,
    ) -> Result<Option<VideoDoc>> {
        let mut data = self.data.write().await;
        Ok(data
            .videos
            .iter_mut()
            .find(|v| v._id == Some(id))
            .map(|v| {
                v.is_published = published;
                v.metadata.touch();
                v.clone()
            }))
    }

    async fn increment_video_views(&self, id: ObjectId) -> Result<()> {
        let mut data = self.data.write().await;
        if let Some(v) = data.videos.iter_mut().find(|v| v._id == Some(id)) {
            v.views += 1;
        }
        Ok(())
    }

    async fn count_likes(&self, target: LikeTarget) -> Result<u64> {
        let data = self.data.read().await;
        Ok(data.likes.iter().filter(|l| l.target == target).count() as u64)
    }

    async fn count_video_comments(&self, video: ObjectId) -> Result<u64> {
        let data = self.data.read().await;
        Ok(data.comments.iter().filter(|c| c.video == video).count() as u64)
    }

    async fn find_comment(&self, id: ObjectId) -> Result<Option<CommentDoc>> {
        let data = self.data.read().await;
        Ok(data.comments.iter().find(|c| c._id == Some(id)).cloned())
    }

    async fn insert_comment(&self, mut comment: CommentDoc) -> Result<CommentDoc> {
        assign_id(&mut comment._id);
        self.data.write().await.comments.push(comment.clone());
        Ok(comment)
    }

    async fn toggle_like(&self, target: LikeTarget, user: ObjectId) -> Result<bool> {
        let mut data = self.data.write().await;
        let before = data.likes.len();
        data.likes
            .retain(|l| !(l.target == target && l.liked_by == user));
        if data.likes.len() < before {
            return Ok(false);
        }
        let mut like = LikeDoc::new(target, user);
        assign_id(&mut like._id);
        data.likes.push(like);
        Ok(true)
    }

    async fn find_playlist(&self, id: ObjectId) -> Result<Option<PlaylistDoc>> {
        let data = self.data.read().await;
        Ok(data.playlists.iter().find(|p| p._id == Some(id)).cloned())
    }

    async fn insert_playlist(&self, mut playlist: PlaylistDoc) -> Result<PlaylistDoc> {
        assign_id(&mut playlist._id);
        self.data.write().await.playlists.push(playlist.clone());
        Ok(playlist)
    }

    async fn add_video_to_playlist(
        &self,
        playlist: ObjectId,
        video: ObjectId,
    ) -> Result<Option<PlaylistDoc>> {
        let mut data = self.data.write().await;
        Ok(data
            .playlists
            .iter_mut()
            .find(|p| p._id == Some(playlist))
            .map(|p| {
                if !p.videos.contains(&video) {
                    p.videos.push(video);
                }
                p.metadata.touch();
                p.clone()
            }))
    }

    async fn toggle_subscription(&self, subscriber: ObjectId, channel: ObjectId) -> Result<bool> {
        let mut data = self.data.write().await;
        let before = data.subscriptions.len();
        data.subscriptions
            .retain(|s| !(s.subscriber == subscriber && s.channel == channel));
        if data.subscriptions.len() < before {
            return Ok(false);
        }
        let mut sub = SubscriptionDoc::new(subscriber, channel);
        assign_id(&mut sub._id);
        data.subscriptions.push(sub);
        Ok(true)
    }

    async fn channel_subscribers(&self, channel: ObjectId) -> Result<Vec<UserSummary>> {
        let data = self.data.read().await;
        let ids: Vec<ObjectId> = data
            .subscriptions
            .iter()
            .filter(|s| s.channel == channel)
            .map(|s| s.subscriber)
            .collect();
        Ok(Self::summaries(&data, &ids))
    }

    async fn subscribed_channels(&self, subscriber: ObjectId) -> Result<Vec<UserSummary>> {
        let data = self.data.read().await;
        let ids: Vec<ObjectId> = data
            .subscriptions
            .iter()
            .filter(|s| s.subscriber == subscriber)
            .map(|s| s.channel)
            .collect();
        Ok(Self::summaries(&data, &ids))
    }

    async fn find_tweet(&self, id: ObjectId) -> Result<Option<TweetDoc>> {
        let data = self.data.read().await;
        Ok(data.tweets.iter().find(|t| t._id == Some(id)).cloned())
    }

    async fn insert_tweet(&self, mut tweet: TweetDoc) -> Result<TweetDoc> {
        assign_id(&mut tweet._id);
        self.data.write().await.tweets.push(tweet.clone());
        Ok(tweet)
    }

    async fn user_tweets(&self, owner: ObjectId) -> Result<Vec<TweetDoc>> {
        let data = self.data.read().await;
        Ok(data
            .tweets
            .iter()
            .rev()
            .filter(|t| t.owner == owner)
            .cloned()
            .collect())
    }

    async fn delete_tweet(&self, id: ObjectId) -> Result<bool> {
        let mut data = self.data.write().await;
        let before = data.tweets.len();
        data.tweets.retain(|t| t._id != Some(id));
        Ok(data.tweets.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaAsset;

    fn video(owner: ObjectId, title: &str, views: i64) -> VideoDoc {
        let mut v = VideoDoc::new(
            owner,
            title.to_string(),
            format!("about {}", title),
            MediaAsset::default(),
            MediaAsset::default(),
        );
        v.views = views;
        v
    }

    #[tokio::test]
    async fn test_list_videos_filters_and_pages() {
        let repo = MemoryRepository::new();
        let owner = ObjectId::new();
        for (i, title) in ["Rust intro", "Cooking", "Rust async", "Travel"].iter().enumerate() {
            repo.insert_video(video(owner, title, i as i64)).await.unwrap();
        }
        let hidden = repo.insert_video(video(owner, "Rust draft", 99)).await.unwrap();
        repo.set_video_published(hidden._id.unwrap(), false)
            .await
            .unwrap();

        let page = repo
            .list_videos(&VideoQuery {
                search: Some("rust".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        // Newest first
        assert_eq!(page.videos[0].title, "Rust async");

        let page = repo
            .list_videos(&VideoQuery {
                search: Some("rust".into()),
                include_unpublished: true,
                sort: VideoSort::Views,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.videos[0].title, "Rust draft");

        let page = repo
            .list_videos(&VideoQuery {
                page: 2,
                limit: 3,
                sort: VideoSort::Title,
                descending: false,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.videos.len(), 1);
        assert_eq!(page.videos[0].title, "Travel");
    }

    #[tokio::test]
    async fn test_toggles_flip_state() {
        let repo = MemoryRepository::new();
        let user = ObjectId::new();
        let target = LikeTarget::Video(ObjectId::new());

        assert!(repo.toggle_like(target, user).await.unwrap());
        assert_eq!(repo.count_likes(target).await.unwrap(), 1);
        assert!(!repo.toggle_like(target, user).await.unwrap());
        assert_eq!(repo.count_likes(target).await.unwrap(), 0);

        let channel = ObjectId::new();
        assert!(repo.toggle_subscription(user, channel).await.unwrap());
        assert!(!repo.toggle_subscription(user, channel).await.unwrap());
    }

    #[tokio::test]
    async fn test_channel_profile_counts() {
        let repo = MemoryRepository::new();
        let alice = repo.insert_user(UserDoc::new("Alice", "a@x.io", "Alice A")).await;
        let bob = repo.insert_user(UserDoc::new("bob", "b@x.io", "Bob B")).await;
        let carol = repo.insert_user(UserDoc::new("carol", "c@x.io", "Carol C")).await;
        let (a, b, c) = (alice._id.unwrap(), bob._id.unwrap(), carol._id.unwrap());

        repo.toggle_subscription(b, a).await.unwrap();
        repo.toggle_subscription(c, a).await.unwrap();
        repo.toggle_subscription(a, b).await.unwrap();

        let profile = repo.channel_profile("ALICE", b).await.unwrap().unwrap();
        assert_eq!(profile.subscribers_count, 2);
        assert_eq!(profile.subscribed_to_channels_count, 1);
        assert!(profile.is_subscribed);

        let profile = repo.channel_profile("alice", a).await.unwrap().unwrap();
        assert!(!profile.is_subscribed);

        assert!(repo.channel_profile("nobody", a).await.unwrap().is_none());

        let subs = repo.channel_subscribers(a).await.unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].user_name, "bob");
    }

    #[tokio::test]
    async fn test_watch_history_keeps_order_and_owner() {
        let repo = MemoryRepository::new();
        let owner = repo.insert_user(UserDoc::new("maker", "m@x.io", "Maker")).await;
        let viewer = repo.insert_user(UserDoc::new("viewer", "v@x.io", "Viewer")).await;
        let (o, v) = (owner._id.unwrap(), viewer._id.unwrap());

        let first = repo.insert_video(video(o, "first", 0)).await.unwrap()._id.unwrap();
        let second = repo.insert_video(video(o, "second", 0)).await.unwrap()._id.unwrap();

        repo.add_to_watch_history(v, second).await.unwrap();
        repo.add_to_watch_history(v, first).await.unwrap();
        repo.add_to_watch_history(v, second).await.unwrap();

        let history = repo.watch_history(v).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].video.title, "second");
        assert_eq!(history[1].owner.as_ref().unwrap().user_name, "maker");
    }
}
