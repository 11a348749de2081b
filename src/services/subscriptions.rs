//! Channel subscriptions

use bson::oid::ObjectId;
use tracing::info;

use super::Services;
use crate::db::{Repository, UserSummary};
use crate::types::{parse_object_id, AppError, Result};

impl Services {
    /// Subscribe to or unsubscribe from a channel; returns the new state
    pub async fn toggle_subscription(&self, raw_channel_id: &str, subscriber: ObjectId) -> Result<bool> {
        let channel = parse_object_id(raw_channel_id, "channel")?;
        if channel == subscriber {
            return Err(AppError::InvalidArgument(
                "You cannot subscribe to your own channel".into(),
            ));
        }
        if self
            .call("find channel", self.repo.find_user(channel))
            .await?
            .is_none()
        {
            return Err(AppError::NotFound("Channel does not exist".into()));
        }

        let subscribed = self
            .call(
                "toggle subscription",
                self.repo.toggle_subscription(subscriber, channel),
            )
            .await?;
        info!(subscriber = %subscriber, channel = %channel, subscribed, "Subscription toggled");
        Ok(subscribed)
    }

    pub async fn channel_subscribers(&self, raw_channel_id: &str) -> Result<Vec<UserSummary>> {
        let channel = parse_object_id(raw_channel_id, "channel")?;
        self.call("list subscribers", self.repo.channel_subscribers(channel))
            .await
    }

    pub async fn subscribed_channels(&self, raw_subscriber_id: &str) -> Result<Vec<UserSummary>> {
        let subscriber = parse_object_id(raw_subscriber_id, "subscriber")?;
        self.call(
            "list subscriptions",
            self.repo.subscribed_channels(subscriber),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::UserDoc;
    use crate::db::MemoryRepository;
    use crate::media::testing::FakeMediaStore;
    use crate::services::testing::services;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_toggle_subscription_rules() {
        let repo = Arc::new(MemoryRepository::new());
        let svc = services(repo.clone(), Arc::new(FakeMediaStore::new()));
        let chef = repo
            .insert_user(UserDoc::new("chef", "chef@test.io", "Chef"))
            .await
            ._id
            .unwrap();
        let fan = repo
            .insert_user(UserDoc::new("fan", "fan@test.io", "Fan"))
            .await
            ._id
            .unwrap();

        assert!(svc.toggle_subscription(&chef.to_hex(), fan).await.unwrap());
        let subs = svc.channel_subscribers(&chef.to_hex()).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].user_name, "fan");
        let channels = svc.subscribed_channels(&fan.to_hex()).await.unwrap();
        assert_eq!(channels[0].id, chef);

        assert!(!svc.toggle_subscription(&chef.to_hex(), fan).await.unwrap());
        assert!(svc
            .channel_subscribers(&chef.to_hex())
            .await
            .unwrap()
            .is_empty());

        assert!(matches!(
            svc.toggle_subscription(&fan.to_hex(), fan).await,
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            svc.toggle_subscription(&ObjectId::new().to_hex(), fan).await,
            Err(AppError::NotFound(_))
        ));
    }
}
