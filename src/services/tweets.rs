//! Short text posts

use bson::oid::ObjectId;
use serde::Deserialize;
use tracing::info;

use super::{ensure_owner, Services};
use crate::db::schemas::TweetDoc;
use crate::db::Repository;
use crate::types::{parse_object_id, AppError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct NewTweet {
    #[serde(default)]
    pub content: String,
}

impl Services {
    pub async fn create_tweet(&self, owner: ObjectId, request: NewTweet) -> Result<TweetDoc> {
        let content = request.content.trim();
        if content.is_empty() {
            return Err(AppError::InvalidArgument("Tweet content is required".into()));
        }
        self.call(
            "insert tweet",
            self.repo.insert_tweet(TweetDoc::new(owner, content.to_string())),
        )
        .await
    }

    /// A user's tweets, newest first
    pub async fn user_tweets(&self, raw_user_id: &str) -> Result<Vec<TweetDoc>> {
        let owner = parse_object_id(raw_user_id, "user")?;
        self.call("list tweets", self.repo.user_tweets(owner)).await
    }

    pub async fn delete_tweet(&self, raw_tweet_id: &str, requester: ObjectId) -> Result<()> {
        let id = parse_object_id(raw_tweet_id, "tweet")?;
        let tweet = self
            .call("find tweet", self.repo.find_tweet(id))
            .await?
            .ok_or_else(|| AppError::NotFound("Tweet not found".into()))?;
        ensure_owner(&tweet, requester)?;

        if !self.call("delete tweet", self.repo.delete_tweet(id)).await? {
            return Err(AppError::NotFound("Tweet not found".into()));
        }
        info!(tweet_id = %id, "Tweet deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRepository;
    use crate::media::testing::FakeMediaStore;
    use crate::services::testing::services;
    use std::sync::Arc;

    fn tweet(content: &str) -> NewTweet {
        NewTweet {
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn test_tweet_lifecycle() {
        let svc = services(
            Arc::new(MemoryRepository::new()),
            Arc::new(FakeMediaStore::new()),
        );
        let author = ObjectId::new();

        svc.create_tweet(author, tweet("first")).await.unwrap();
        let second = svc.create_tweet(author, tweet("second")).await.unwrap();

        let listed = svc.user_tweets(&author.to_hex()).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].content, "second");

        let id = second._id.unwrap().to_hex();
        assert!(matches!(
            svc.delete_tweet(&id, ObjectId::new()).await,
            Err(AppError::Forbidden(_))
        ));
        svc.delete_tweet(&id, author).await.unwrap();
        assert!(matches!(
            svc.delete_tweet(&id, author).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.create_tweet(author, tweet("")).await,
            Err(AppError::InvalidArgument(_))
        ));
    }
}
