//! Profiles, channel pages and watch history

use bson::oid::ObjectId;
use serde::Deserialize;
use tracing::info;

use super::videos::required;
use super::Services;
use crate::db::schemas::UserDoc;
use crate::db::{ChannelProfile, ProfileChanges, Repository, UserImage, VideoWithOwner};
use crate::media::{MediaAsset, MediaKind, MediaStore};
use crate::types::{AppError, Result};

/// Profile edit; at least one field must be present
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

impl Services {
    /// The authenticated user's own profile
    pub async fn current_user(&self, id: ObjectId) -> Result<UserDoc> {
        self.call("find user", self.repo.find_user(id))
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    /// Channel page of `user_name` as seen by `viewer`
    pub async fn channel_profile(&self, user_name: &str, viewer: ObjectId) -> Result<ChannelProfile> {
        let user_name = user_name.trim();
        if user_name.is_empty() {
            return Err(AppError::InvalidArgument("userName is missing".into()));
        }

        self.call(
            "load channel",
            self.repo.channel_profile(user_name, viewer),
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Channel does not exist".into()))
    }

    /// Change full name and/or email
    pub async fn update_profile(&self, id: ObjectId, update: ProfileUpdate) -> Result<UserDoc> {
        let full_name = update
            .full_name
            .as_deref()
            .map(|n| required(n, "fullName"))
            .transpose()?;
        let email = update
            .email
            .as_deref()
            .map(|e| required(e, "email"))
            .transpose()?;
        if full_name.is_none() && email.is_none() {
            return Err(AppError::InvalidArgument(
                "fullName or email is required".into(),
            ));
        }

        if let Some(email) = &email {
            if !valid_email(email) {
                return Err(AppError::InvalidArgument("email is not valid".into()));
            }
            if self.call("check email", self.repo.email_taken(email, id)).await? {
                return Err(AppError::InvalidArgument("email is already in use".into()));
            }
        }

        let updated = self
            .call(
                "update profile",
                self.repo
                    .update_user_profile(id, ProfileChanges { full_name, email }),
            )
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        info!(user_id = %id, "Profile updated");
        Ok(updated)
    }

    /// Replace the avatar or cover image with a staged file
    ///
    /// The new image is uploaded and stored before the previous one is
    /// deleted from the media store.
    pub async fn update_user_image(
        &self,
        id: ObjectId,
        image: UserImage,
        staged: &str,
    ) -> Result<UserDoc> {
        let path = self.staged_path(staged, image.field())?;
        let user = match self.current_user(id).await {
            Ok(user) => user,
            Err(e) => {
                self.discard_staged(&[&path]).await;
                return Err(e);
            }
        };

        let uploaded = self
            .call("upload image", self.media.upload(&path, MediaKind::Image))
            .await;
        self.discard_staged(&[&path]).await;
        let uploaded = uploaded?;

        let stored = self
            .call(
                "update profile image",
                self.repo.set_user_image(id, image, uploaded.url.clone()),
            )
            .await
            .and_then(|u| u.ok_or_else(|| AppError::NotFound("User not found".into())));
        let updated = match stored {
            Ok(updated) => updated,
            Err(e) => {
                self.discard_asset(&uploaded, MediaKind::Image).await;
                return Err(e);
            }
        };

        let previous = image.url_of(&user);
        if !previous.is_empty() {
            let old = MediaAsset {
                url: previous.to_string(),
                ..Default::default()
            };
            self.discard_asset(&old, MediaKind::Image).await;
        }

        info!(user_id = %id, image = image.field(), "Profile image replaced");
        Ok(updated)
    }

    pub async fn watch_history(&self, user: ObjectId) -> Result<Vec<VideoWithOwner>> {
        self.call("load watch history", self.repo.watch_history(user))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRepository;
    use crate::media::testing::FakeMediaStore;
    use crate::services::testing::services;
    use std::sync::Arc;

    async fn stage(svc: &Services, name: &str) {
        tokio::fs::create_dir_all(svc.upload_dir()).await.unwrap();
        tokio::fs::write(svc.upload_dir().join(name), b"img").await.unwrap();
    }

    #[tokio::test]
    async fn test_update_profile() {
        let repo = Arc::new(MemoryRepository::new());
        let svc = services(repo.clone(), Arc::new(FakeMediaStore::new()));
        let ada = repo
            .insert_user(UserDoc::new("ada", "ada@test.io", "Ada"))
            .await
            ._id
            .unwrap();
        repo.insert_user(UserDoc::new("bob", "bob@test.io", "Bob"))
            .await;

        let updated = svc
            .update_profile(
                ada,
                ProfileUpdate {
                    full_name: Some(" Ada Lovelace ".into()),
                    email: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Ada Lovelace");
        assert_eq!(updated.email, "ada@test.io");

        let taken = ProfileUpdate {
            email: Some("bob@test.io".into()),
            ..Default::default()
        };
        assert!(matches!(
            svc.update_profile(ada, taken).await,
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            svc.update_profile(ada, ProfileUpdate::default()).await,
            Err(AppError::InvalidArgument(_))
        ));
        let malformed = ProfileUpdate {
            email: Some("not-an-email".into()),
            ..Default::default()
        };
        assert!(matches!(
            svc.update_profile(ada, malformed).await,
            Err(AppError::InvalidArgument(_))
        ));

        // Own email is not a conflict
        let same = ProfileUpdate {
            email: Some("ada@test.io".into()),
            ..Default::default()
        };
        assert!(svc.update_profile(ada, same).await.is_ok());
    }

    #[tokio::test]
    async fn test_replace_avatar_uploads_before_discarding_old() {
        let repo = Arc::new(MemoryRepository::new());
        let media = Arc::new(FakeMediaStore::new());
        let svc = services(repo.clone(), media.clone());
        let mut user = UserDoc::new("ada", "ada@test.io", "Ada");
        user.avatar = "https://media.test/image/old-face".into();
        let ada = repo.insert_user(user).await._id.unwrap();

        stage(&svc, "face-ada-1.png").await;
        let updated = svc
            .update_user_image(ada, UserImage::Avatar, "face-ada-1.png")
            .await
            .unwrap();

        assert_eq!(updated.avatar, "https://media.test/image/face-ada-1");
        assert_eq!(media.uploaded().len(), 1);
        assert_eq!(media.deleted(), vec![("old-face".to_string(), MediaKind::Image)]);
        assert!(!svc.upload_dir().join("face-ada-1.png").exists());
    }

    #[tokio::test]
    async fn test_failed_image_upload_keeps_profile() {
        let repo = Arc::new(MemoryRepository::new());
        let media = Arc::new(FakeMediaStore::failing_upload(MediaKind::Image));
        let svc = services(repo.clone(), media.clone());
        let mut user = UserDoc::new("ada", "ada@test.io", "Ada");
        user.cover_image = "https://media.test/image/old-cover".into();
        let ada = repo.insert_user(user).await._id.unwrap();

        stage(&svc, "cover-ada-2.png").await;
        assert!(svc
            .update_user_image(ada, UserImage::CoverImage, "cover-ada-2.png")
            .await
            .is_err());

        let stored = repo.find_user(ada).await.unwrap().unwrap();
        assert_eq!(stored.cover_image, "https://media.test/image/old-cover");
        assert!(media.deleted().is_empty());

        assert!(matches!(
            svc.update_user_image(ada, UserImage::CoverImage, "../x.png").await,
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_channel_profile_lookup() {
        let repo = Arc::new(MemoryRepository::new());
        let svc = services(repo.clone(), Arc::new(FakeMediaStore::new()));
        let chef = repo
            .insert_user(UserDoc::new("chef", "chef@test.io", "The Chef"))
            .await
            ._id
            .unwrap();
        let fan = ObjectId::new();
        repo.toggle_subscription(fan, chef).await.unwrap();

        let profile = svc.channel_profile(" Chef ", fan).await.unwrap();
        assert_eq!(profile.subscribers_count, 1);
        assert!(profile.is_subscribed);

        assert!(matches!(
            svc.channel_profile("ghost", fan).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.channel_profile("  ", fan).await,
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            svc.current_user(ObjectId::new()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
