//! MongoDB implementation of the repository contract

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::FindOptions;
use std::collections::HashMap;
use tracing::debug;

use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::repository::{
    CascadeRepository, ChannelProfile, ProfileChanges, Repository, UserImage, UserSummary,
    VideoChanges, VideoPage, VideoQuery, VideoWithOwner,
};
use crate::db::schemas::{
    CommentDoc, LikeDoc, LikeTarget, PlaylistDoc, SubscriptionDoc, TweetDoc, UserDoc, VideoDoc,
    COMMENT_COLLECTION, LIKE_COLLECTION, PLAYLIST_COLLECTION, SUBSCRIPTION_COLLECTION,
    TWEET_COLLECTION, USER_COLLECTION, VIDEO_COLLECTION,
};
use crate::types::{AppError, Result};

/// Repository over the service's MongoDB collections
#[derive(Clone)]
pub struct MongoRepository {
    client: MongoClient,
    users: MongoCollection<UserDoc>,
    videos: MongoCollection<VideoDoc>,
    comments: MongoCollection<CommentDoc>,
    likes: MongoCollection<LikeDoc>,
    playlists: MongoCollection<PlaylistDoc>,
    subscriptions: MongoCollection<SubscriptionDoc>,
    tweets: MongoCollection<TweetDoc>,
}

impl MongoRepository {
    /// Open every collection, applying schema indexes
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            client: mongo.clone(),
            users: mongo.collection(USER_COLLECTION).await?,
            videos: mongo.collection(VIDEO_COLLECTION).await?,
            comments: mongo.collection(COMMENT_COLLECTION).await?,
            likes: mongo.collection(LIKE_COLLECTION).await?,
            playlists: mongo.collection(PLAYLIST_COLLECTION).await?,
            subscriptions: mongo.collection(SUBSCRIPTION_COLLECTION).await?,
            tweets: mongo.collection(TWEET_COLLECTION).await?,
        })
    }
}

/// Escape user input for use inside a `$regex`
pub fn escape_regex(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if "\\^$.|?*+()[]{}/".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Filter for a video listing
pub fn video_filter(query: &VideoQuery) -> Document {
    let mut filter = Document::new();

    if !query.include_unpublished {
        filter.insert("isPublished", true);
    }

    if let Some(owner) = query.owner {
        filter.insert("owner", owner);
    }

    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = escape_regex(search.trim());
        filter.insert(
            "$or",
            vec![
                doc! { "title": { "$regex": pattern.clone(), "$options": "i" } },
                doc! { "description": { "$regex": pattern, "$options": "i" } },
            ],
        );
    }

    filter
}

/// Ids of stored comments
///
/// A stored comment without an id means the schema and the collection
/// disagree; skipping it would leave its likes behind.
pub fn comment_ids(comments: Vec<CommentDoc>) -> Result<Vec<ObjectId>> {
    comments
        .into_iter()
        .map(|c| {
            c._id
                .ok_or_else(|| AppError::Database("Stored comment decoded without an _id".into()))
        })
        .collect()
}

#[async_trait]
impl CascadeRepository for MongoRepository {
    async fn find_video(&self, id: ObjectId) -> Result<Option<VideoDoc>> {
        self.videos.find_by_id(id).await
    }

    async fn delete_video_likes(&self, video: ObjectId) -> Result<u64> {
        self.likes.delete_many(LikeTarget::Video(video).filter()).await
    }

    async fn video_comment_ids(&self, video: ObjectId) -> Result<Vec<ObjectId>> {
        let comments = self.comments.find_many(doc! { "video": video }).await?;
        comment_ids(comments)
    }

    async fn delete_comment_likes(&self, comments: &[ObjectId]) -> Result<u64> {
        if comments.is_empty() {
            return Ok(0);
        }
        self.likes
            .delete_many(doc! { "target.comment": { "$in": comments } })
            .await
    }

    async fn delete_video_comments(&self, video: ObjectId) -> Result<u64> {
        self.comments.delete_many(doc! { "video": video }).await
    }

    async fn pull_video_from_playlists(&self, video: ObjectId) -> Result<u64> {
        let result = self
            .playlists
            .update_many(
                doc! { "videos": video },
                doc! {
                    "$pull": { "videos": video },
                    "$set": { "metadata.updatedAt": DateTime::now() }
                },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn pull_video_from_watch_histories(&self, video: ObjectId) -> Result<u64> {
        let result = self
            .users
            .update_many(
                doc! { "watchHistory": video },
                doc! { "$pull": { "watchHistory": video } },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn delete_video(&self, id: ObjectId) -> Result<bool> {
        self.videos.delete_one(doc! { "_id": id }).await
    }
}

#[async_trait]
impl Repository for MongoRepository {
    fn backend(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> Result<()> {
        self.client.ping().await
    }

    async fn find_user(&self, id: ObjectId) -> Result<Option<UserDoc>> {
        self.users.find_by_id(id).await
    }

    async fn user_summaries(&self, ids: &[ObjectId]) -> Result<Vec<UserSummary>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let users = self.users.find_many(doc! { "_id": { "$in": ids } }).await?;
        let by_id: HashMap<ObjectId, UserSummary> = users
            .iter()
            .filter_map(|u| u._id.map(|id| (id, UserSummary::from(u))))
            .collect();

        Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
    }

    async fn email_taken(&self, email: &str, except: ObjectId) -> Result<bool> {
        let count = self
            .users
            .count(doc! { "email": email, "_id": { "$ne": except } })
            .await?;
        Ok(count > 0)
    }

    async fn update_user_profile(
        &self,
        id: ObjectId,
        changes: ProfileChanges,
    ) -> Result<Option<UserDoc>> {
        let mut set = doc! { "metadata.updatedAt": DateTime::now() };
        if let Some(full_name) = changes.full_name {
            set.insert("fullName", full_name);
        }
        if let Some(email) = changes.email {
            set.insert("email", email);
        }
        self.users
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
            .await
    }

    async fn set_user_image(
        &self,
        id: ObjectId,
        image: UserImage,
        url: String,
    ) -> Result<Option<UserDoc>> {
        let mut set = doc! { "metadata.updatedAt": DateTime::now() };
        set.insert(image.field(), url);
        self.users
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
            .await
    }

    async fn add_to_watch_history(&self, user: ObjectId, video: ObjectId) -> Result<()> {
        self.users
            .update_one(
                doc! { "_id": user },
                doc! { "$addToSet": { "watchHistory": video } },
            )
            .await?;
        Ok(())
    }

    async fn watch_history(&self, user: ObjectId) -> Result<Vec<VideoWithOwner>> {
        let pipeline = vec![
            doc! { "$match": { "_id": user } },
            doc! {
                "$lookup": {
                    "from": VIDEO_COLLECTION,
                    "localField": "watchHistory",
                    "foreignField": "_id",
                    "as": "watched",
                    "pipeline": [
                        {
                            "$lookup": {
                                "from": USER_COLLECTION,
                                "localField": "owner",
                                "foreignField": "_id",
                                "as": "ownerProfile",
                                "pipeline": [
                                    { "$project": { "fullName": 1, "userName": 1, "avatar": 1 } }
                                ]
                            }
                        },
                        { "$addFields": { "ownerProfile": { "$first": "$ownerProfile" } } }
                    ]
                }
            },
            doc! { "$project": { "watchHistory": 1, "watched": 1 } },
        ];

        let rows = self.users.aggregate(pipeline).await?;
        let row = match rows.into_iter().next() {
            Some(row) => row,
            None => return Ok(Vec::new()),
        };

        let order: Vec<ObjectId> = row
            .get_array("watchHistory")
            .map(|ids| ids.iter().filter_map(|b| b.as_object_id()).collect())
            .unwrap_or_default();

        let mut by_id = HashMap::new();
        for entry in row.get_array("watched").cloned().unwrap_or_default() {
            let mut entry = match entry {
                bson::Bson::Document(d) => d,
                _ => continue,
            };
            let owner = match entry.remove("ownerProfile") {
                Some(bson::Bson::Document(profile)) => {
                    Some(bson::from_document::<UserSummary>(profile)?)
                }
                _ => None,
            };
            let video: VideoDoc = bson::from_document(entry)?;
            if let Some(id) = video._id {
                by_id.insert(id, VideoWithOwner { video, owner });
            }
        }

        Ok(order.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn channel_profile(
        &self,
        user_name: &str,
        viewer: ObjectId,
    ) -> Result<Option<ChannelProfile>> {
        let pipeline = vec![
            doc! { "$match": { "userName": user_name.to_lowercase() } },
            doc! {
                "$lookup": {
                    "from": SUBSCRIPTION_COLLECTION,
                    "localField": "_id",
                    "foreignField": "channel",
                    "as": "subscribers"
                }
            },
            doc! {
                "$lookup": {
                    "from": SUBSCRIPTION_COLLECTION,
                    "localField": "_id",
                    "foreignField": "subscriber",
                    "as": "subscribedTo"
                }
            },
            doc! {
                "$addFields": {
                    "subscribersCount": { "$size": "$subscribers" },
                    "subscribedToChannelsCount": { "$size": "$subscribedTo" },
                    "isSubscribed": {
                        "$cond": {
                            "if": { "$in": [viewer, "$subscribers.subscriber"] },
                            "then": true,
                            "else": false
                        }
                    }
                }
            },
            doc! {
                "$project": {
                    "fullName": 1,
                    "userName": 1,
                    "subscribersCount": 1,
                    "subscribedToChannelsCount": 1,
                    "isSubscribed": 1,
                    "avatar": 1,
                    "coverImage": 1,
                    "email": 1
                }
            },
        ];

        match self.users.aggregate(pipeline).await?.into_iter().next() {
            Some(row) => Ok(Some(bson::from_document(row)?)),
            None => Ok(None),
        }
    }

    async fn insert_video(&self, video: VideoDoc) -> Result<VideoDoc> {
        let (id, mut stored) = self.videos.insert_one(video).await?;
        stored._id = Some(id);
        Ok(stored)
    }

    async fn list_videos(&self, query: &VideoQuery) -> Result<VideoPage> {
        let filter = video_filter(query);
        let total = self.videos.count(filter.clone()).await?;

        let direction = if query.descending { -1 } else { 1 };
        let options = FindOptions::builder()
            .sort(doc! { query.sort.field(): direction })
            .skip(query.skip())
            .limit(query.limit as i64)
            .build();

        debug!("Listing videos with filter {}", filter);
        let videos = self.videos.find_with_options(filter, Some(options)).await?;

        Ok(VideoPage { videos, total })
    }

    async fn update_video(&self, id: ObjectId, changes: VideoChanges) -> Result<Option<VideoDoc>> {
        let mut set = doc! { "metadata.updatedAt": DateTime::now() };
        if let Some(title) = changes.title {
            set.insert("title", title);
        }
        if let Some(description) = changes.description {
            set.insert("description", description);
        }
        if let Some(thumbnail) = changes.thumbnail {
            let value = bson::to_bson(&thumbnail)
                .map_err(|e| AppError::Internal(format!("Cannot encode thumbnail: {}", e)))?;
            set.insert("thumbnail", value);
        }

        self.videos
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
            .await
    }

    async fn set_video_published(
        &self,
        id: ObjectId,
        published: bool,
    ) -> Result<Option<VideoDoc>> {
        self.videos
            .find_one_and_update(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "isPublished": published,
                        "metadata.updatedAt": DateTime::now()
                    }
                },
            )
            .await
    }

    async fn increment_video_views(&self, id: ObjectId) -> Result<()> {
        self.videos
            .update_one(doc! { "_id": id }, doc! { "$inc": { "views": 1_i64 } })
            .await?;
        Ok(())
    }

    async fn count_likes(&self, target: LikeTarget) -> Result<u64> {
        self.likes.count(target.filter()).await
    }

    async fn count_video_comments(&self, video: ObjectId) -> Result<u64> {
        self.comments.count(doc! { "video": video }).await
    }

    async fn find_comment(&self, id: ObjectId) -> Result<Option<CommentDoc>> {
        self.comments.find_by_id(id).await
    }

    async fn insert_comment(&self, comment: CommentDoc) -> Result<CommentDoc> {
        let (id, mut stored) = self.comments.insert_one(comment).await?;
        stored._id = Some(id);
        Ok(stored)
    }

    async fn toggle_like(&self, target: LikeTarget, user: ObjectId) -> Result<bool> {
        let mut filter = target.filter();
        filter.insert("likedBy", user);

        if self.likes.delete_one(filter).await? {
            return Ok(false);
        }
        self.likes.insert_one(LikeDoc::new(target, user)).await?;
        Ok(true)
    }

    async fn find_playlist(&self, id: ObjectId) -> Result<Option<PlaylistDoc>> {
        self.playlists.find_by_id(id).await
    }

    async fn insert_playlist(&self, playlist: PlaylistDoc) -> Result<PlaylistDoc> {
        let (id, mut stored) = self.playlists.insert_one(playlist).await?;
        stored._id = Some(id);
        Ok(stored)
    }

    async fn add_video_to_playlist(
        &self,
        playlist: ObjectId,
        video: ObjectId,
    ) -> Result<Option<PlaylistDoc>> {
        self.playlists
            .find_one_and_update(
                doc! { "_id": playlist },
                doc! {
                    "$addToSet": { "videos": video },
                    "$set": { "metadata.updatedAt": DateTime::now() }
                },
            )
            .await
    }

    async fn toggle_subscription(&self, subscriber: ObjectId, channel: ObjectId) -> Result<bool> {
        let filter = doc! { "subscriber": subscriber, "channel": channel };
        if self.subscriptions.delete_one(filter).await? {
            return Ok(false);
        }
        self.subscriptions
            .insert_one(SubscriptionDoc::new(subscriber, channel))
            .await?;
        Ok(true)
    }

    async fn channel_subscribers(&self, channel: ObjectId) -> Result<Vec<UserSummary>> {
        let subs = self
            .subscriptions
            .find_many(doc! { "channel": channel })
            .await?;
        let ids: Vec<ObjectId> = subs.iter().map(|s| s.subscriber).collect();
        self.user_summaries(&ids).await
    }

    async fn subscribed_channels(&self, subscriber: ObjectId) -> Result<Vec<UserSummary>> {
        let subs = self
            .subscriptions
            .find_many(doc! { "subscriber": subscriber })
            .await?;
        let ids: Vec<ObjectId> = subs.iter().map(|s| s.channel).collect();
        self.user_summaries(&ids).await
    }

    async fn find_tweet(&self, id: ObjectId) -> Result<Option<TweetDoc>> {
        self.tweets.find_by_id(id).await
    }

    async fn insert_tweet(&self, tweet: TweetDoc) -> Result<TweetDoc> {
        let (id, mut stored) = self.tweets.insert_one(tweet).await?;
        stored._id = Some(id);
        Ok(stored)
    }

    async fn user_tweets(&self, owner: ObjectId) -> Result<Vec<TweetDoc>> {
        let options = FindOptions::builder()
            .sort(doc! { "metadata.createdAt": -1 })
            .build();
        self.tweets
            .find_with_options(doc! { "owner": owner }, Some(options))
            .await
    }

    async fn delete_tweet(&self, id: ObjectId) -> Result<bool> {
        self.tweets.delete_one(doc! { "_id": id }).await
    }
}
