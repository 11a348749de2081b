//! Comments, likes and playlists

use bson::oid::ObjectId;
use serde::Deserialize;
use tracing::info;

use super::{ensure_owner, Services};
use crate::db::schemas::{CommentDoc, LikeTarget, PlaylistDoc};
use crate::db::{CascadeRepository, Repository};
use crate::types::{parse_object_id, AppError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlaylist {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Services {
    async fn ensure_video_exists(&self, id: ObjectId) -> Result<()> {
        match self.call("find video", self.repo.find_video(id)).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("Video not found".into())),
        }
    }

    pub async fn add_comment(
        &self,
        raw_video_id: &str,
        owner: ObjectId,
        request: NewComment,
    ) -> Result<CommentDoc> {
        let video = parse_object_id(raw_video_id, "video")?;
        let content = request.content.trim();
        if content.is_empty() {
            return Err(AppError::InvalidArgument("Comment content is required".into()));
        }
        self.ensure_video_exists(video).await?;

        self.call(
            "insert comment",
            self.repo
                .insert_comment(CommentDoc::new(video, owner, content.to_string())),
        )
        .await
    }

    /// Like or unlike a video; returns whether it is now liked
    pub async fn toggle_video_like(&self, raw_video_id: &str, user: ObjectId) -> Result<bool> {
        let video = parse_object_id(raw_video_id, "video")?;
        self.ensure_video_exists(video).await?;
        self.call(
            "toggle like",
            self.repo.toggle_like(LikeTarget::Video(video), user),
        )
        .await
    }

    /// Like or unlike a comment; returns whether it is now liked
    pub async fn toggle_comment_like(&self, raw_comment_id: &str, user: ObjectId) -> Result<bool> {
        let comment = parse_object_id(raw_comment_id, "comment")?;
        if self
            .call("find comment", self.repo.find_comment(comment))
            .await?
            .is_none()
        {
            return Err(AppError::NotFound("Comment not found".into()));
        }
        self.call(
            "toggle like",
            self.repo.toggle_like(LikeTarget::Comment(comment), user),
        )
        .await
    }

    pub async fn create_playlist(&self, owner: ObjectId, request: NewPlaylist) -> Result<PlaylistDoc> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidArgument("Playlist name is required".into()));
        }

        let playlist = self
            .call(
                "insert playlist",
                self.repo.insert_playlist(PlaylistDoc::new(
                    owner,
                    name.to_string(),
                    request.description.trim().to_string(),
                )),
            )
            .await?;
        info!(owner = %owner, playlist_id = ?playlist._id, "Playlist created");
        Ok(playlist)
    }

    /// Add a video to an owned playlist; adding it twice keeps one entry
    pub async fn add_video_to_playlist(
        &self,
        raw_playlist_id: &str,
        raw_video_id: &str,
        requester: ObjectId,
    ) -> Result<PlaylistDoc> {
        let playlist_id = parse_object_id(raw_playlist_id, "playlist")?;
        let video_id = parse_object_id(raw_video_id, "video")?;

        let playlist = self
            .call("find playlist", self.repo.find_playlist(playlist_id))
            .await?
            .ok_or_else(|| AppError::NotFound("Playlist not found".into()))?;
        ensure_owner(&playlist, requester)?;
        self.ensure_video_exists(video_id).await?;

        self.call(
            "add to playlist",
            self.repo.add_video_to_playlist(playlist_id, video_id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Playlist not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::VideoDoc;
    use crate::db::MemoryRepository;
    use crate::media::testing::FakeMediaStore;
    use crate::media::MediaAsset;
    use crate::services::testing::services;
    use std::sync::Arc;

    async fn with_video() -> (Services, Arc<MemoryRepository>, ObjectId, ObjectId) {
        let repo = Arc::new(MemoryRepository::new());
        let owner = ObjectId::new();
        let video = repo
            .insert_video(VideoDoc::new(
                owner,
                "clip".into(),
                "desc".into(),
                MediaAsset::default(),
                MediaAsset::default(),
            ))
            .await
            .unwrap()
            ._id
            .unwrap();
        let svc = services(repo.clone(), Arc::new(FakeMediaStore::new()));
        (svc, repo, owner, video)
    }

    #[tokio::test]
    async fn test_comment_and_like_toggles() {
        let (svc, repo, _owner, video) = with_video().await;
        let fan = ObjectId::new();

        let comment = svc
            .add_comment(&video.to_hex(), fan, NewComment { content: " nice ".into() })
            .await
            .unwrap();
        assert_eq!(comment.content, "nice");

        assert!(svc.toggle_video_like(&video.to_hex(), fan).await.unwrap());
        assert!(!svc.toggle_video_like(&video.to_hex(), fan).await.unwrap());

        let comment_id = comment._id.unwrap().to_hex();
        assert!(svc.toggle_comment_like(&comment_id, fan).await.unwrap());
        assert_eq!(
            repo.count_likes(LikeTarget::Comment(comment._id.unwrap()))
                .await
                .unwrap(),
            1
        );

        assert!(matches!(
            svc.toggle_comment_like(&ObjectId::new().to_hex(), fan).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.add_comment(&ObjectId::new().to_hex(), fan, NewComment { content: "hi".into() })
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.add_comment(&video.to_hex(), fan, NewComment { content: "   ".into() })
                .await,
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_playlist_ownership_and_set_semantics() {
        let (svc, _repo, owner, video) = with_video().await;
        let playlist = svc
            .create_playlist(
                owner,
                NewPlaylist {
                    name: "Favourites".into(),
                    description: String::new(),
                },
            )
            .await
            .unwrap();
        let pid = playlist._id.unwrap().to_hex();

        svc.add_video_to_playlist(&pid, &video.to_hex(), owner)
            .await
            .unwrap();
        let updated = svc
            .add_video_to_playlist(&pid, &video.to_hex(), owner)
            .await
            .unwrap();
        assert_eq!(updated.videos, vec![video]);

        assert!(matches!(
            svc.add_video_to_playlist(&pid, &video.to_hex(), ObjectId::new())
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            svc.add_video_to_playlist(&pid, &ObjectId::new().to_hex(), owner)
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            svc.create_playlist(
                owner,
                NewPlaylist {
                    name: " ".into(),
                    description: String::new()
                }
            )
            .await,
            Err(AppError::InvalidArgument(_))
        ));
    }
}
