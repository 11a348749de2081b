//! Video publishing, playback and editing

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use super::{ensure_owner, DeletionReport, Services, VideoDeletion};
use crate::db::schemas::{LikeTarget, VideoDoc};
use crate::db::{CascadeRepository, Repository, VideoChanges, VideoQuery, VideoWithOwner};
use crate::media::{MediaAsset, MediaKind, MediaStore};
use crate::services::ownership::is_owner;
use crate::types::{parse_object_id, AppError, Result};

/// Largest page size a caller may request
pub const MAX_PAGE_SIZE: u64 = 100;

/// Request to publish a new video from staged files
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishVideo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// File name inside the upload staging directory
    #[serde(default)]
    pub video_file: String,
    #[serde(default)]
    pub thumbnail: String,
}

/// Partial update of a video; the thumbnail names a staged file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

/// A video with its engagement counts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    #[serde(flatten)]
    pub video: VideoDoc,
    pub number_of_likes: u64,
    pub number_of_comments: u64,
}

/// One listing page; each video carries its owner's public profile
#[derive(Debug, Clone)]
pub struct VideoListing {
    pub videos: Vec<VideoWithOwner>,
    pub total: u64,
}

pub(super) fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AppError::InvalidArgument(format!("{} is required", field)))
    } else {
        Ok(trimmed.to_string())
    }
}

impl Services {
    /// Resolve a staged file name inside the upload directory
    pub(super) fn staged_path(&self, name: &str, field: &str) -> Result<PathBuf> {
        let name = required(name, field)?;
        let plain = Path::new(&name)
            .file_name()
            .map(|f| f.to_string_lossy() == name.as_str())
            .unwrap_or(false);
        if !plain {
            return Err(AppError::InvalidArgument(format!(
                "{} must be a plain file name",
                field
            )));
        }
        Ok(self.upload_dir.join(name))
    }

    /// Remove staged files once the store has them
    pub(super) async fn discard_staged(&self, paths: &[&Path]) {
        for path in paths {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == IoErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove staged file {}: {}", path.display(), e),
            }
        }
    }

    /// Delete an asset that is no longer referenced, logging failures
    pub(super) async fn discard_asset(&self, asset: &MediaAsset, kind: MediaKind) {
        if let Err(e) = self.call("delete media", self.media.delete(asset, kind)).await {
            warn!("Failed to delete unreferenced {} '{}': {}", kind, asset.url, e);
        }
    }

    async fn find_video_or_404(&self, id: ObjectId) -> Result<VideoDoc> {
        self.call("find video", self.repo.find_video(id))
            .await?
            .ok_or_else(|| AppError::NotFound("Video not found".into()))
    }

    /// Upload the staged video and thumbnail and store the record
    pub async fn publish_video(&self, owner: ObjectId, request: PublishVideo) -> Result<VideoDoc> {
        let title = required(&request.title, "title")?;
        let description = required(&request.description, "description")?;
        let video_path = self.staged_path(&request.video_file, "videoFile")?;
        let thumbnail_path = self.staged_path(&request.thumbnail, "thumbnail")?;

        let uploaded = self.upload_pair(&video_path, &thumbnail_path).await;
        self.discard_staged(&[&video_path, &thumbnail_path]).await;
        let (video_file, thumbnail) = uploaded?;

        let video = VideoDoc::new(owner, title, description, video_file, thumbnail);
        match self.call("insert video", self.repo.insert_video(video.clone())).await {
            Ok(stored) => {
                info!(owner = %owner, video_id = ?stored._id, "Video published");
                Ok(stored)
            }
            Err(e) => {
                error!("Failed to store video record, removing uploaded media: {}", e);
                self.discard_asset(&video.video_file, MediaKind::Video).await;
                self.discard_asset(&video.thumbnail, MediaKind::Image).await;
                Err(e)
            }
        }
    }

    async fn upload_pair(
        &self,
        video_path: &Path,
        thumbnail_path: &Path,
    ) -> Result<(MediaAsset, MediaAsset)> {
        let video_file = self
            .call(
                "upload video",
                self.media.upload(video_path, MediaKind::Video),
            )
            .await?;

        match self
            .call(
                "upload thumbnail",
                self.media.upload(thumbnail_path, MediaKind::Image),
            )
            .await
        {
            Ok(thumbnail) => Ok((video_file, thumbnail)),
            Err(e) => {
                self.discard_asset(&video_file, MediaKind::Video).await;
                Err(e)
            }
        }
    }

    /// Fetch a video for playback
    ///
    /// Counts as a view: the video joins the viewer's watch history and its
    /// view counter goes up.
    pub async fn watch_video(&self, raw_id: &str, viewer: ObjectId) -> Result<VideoDetails> {
        let id = parse_object_id(raw_id, "video")?;
        let mut video = self.find_video_or_404(id).await?;
        if !video.is_published && !is_owner(&video, viewer) {
            return Err(AppError::NotFound("Video not found".into()));
        }

        let number_of_likes = self
            .call("count likes", self.repo.count_likes(LikeTarget::Video(id)))
            .await?;
        let number_of_comments = self
            .call("count comments", self.repo.count_video_comments(id))
            .await?;

        self.call(
            "update watch history",
            self.repo.add_to_watch_history(viewer, id),
        )
        .await?;
        self.call("count view", self.repo.increment_video_views(id))
            .await?;
        video.views += 1;

        Ok(VideoDetails {
            video,
            number_of_likes,
            number_of_comments,
        })
    }

    /// List videos
    ///
    /// Unpublished videos are included only when the viewer lists their own
    /// channel.
    pub async fn list_videos(
        &self,
        mut query: VideoQuery,
        viewer: Option<ObjectId>,
    ) -> Result<VideoListing> {
        query.page = query.page.max(1);
        query.limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        query.include_unpublished = query.owner.is_some() && query.owner == viewer;
        let page = self.call("list videos", self.repo.list_videos(&query)).await?;

        let mut owner_ids: Vec<ObjectId> = page.videos.iter().map(|v| v.owner).collect();
        owner_ids.sort();
        owner_ids.dedup();
        let owners = self
            .call("list video owners", self.repo.user_summaries(&owner_ids))
            .await?;

        let videos = page
            .videos
            .into_iter()
            .map(|video| {
                let owner = owners.iter().find(|o| o.id == video.owner).cloned();
                VideoWithOwner { video, owner }
            })
            .collect();
        Ok(VideoListing {
            videos,
            total: page.total,
        })
    }

    /// Change title, description or thumbnail of an owned video
    pub async fn update_video(
        &self,
        raw_id: &str,
        requester: ObjectId,
        update: VideoUpdate,
    ) -> Result<VideoDoc> {
        let id = parse_object_id(raw_id, "video")?;

        let title = update.title.as_deref().map(|t| required(t, "title")).transpose()?;
        let description = update
            .description
            .as_deref()
            .map(|d| required(d, "description"))
            .transpose()?;
        let thumbnail_path = update
            .thumbnail
            .as_deref()
            .map(|t| self.staged_path(t, "thumbnail"))
            .transpose()?;
        if title.is_none() && description.is_none() && thumbnail_path.is_none() {
            return Err(AppError::InvalidArgument("Nothing to update".into()));
        }

        let video = self.find_video_or_404(id).await?;
        ensure_owner(&video, requester)?;

        let thumbnail = match &thumbnail_path {
            Some(path) => {
                let uploaded = self
                    .call(
                        "upload thumbnail",
                        self.media.upload(path, MediaKind::Image),
                    )
                    .await;
                self.discard_staged(&[path]).await;
                Some(uploaded?)
            }
            None => None,
        };

        let changes = VideoChanges {
            title,
            description,
            thumbnail: thumbnail.clone(),
        };
        let updated = match self.call("update video", self.repo.update_video(id, changes)).await {
            Ok(Some(updated)) => Ok(updated),
            Ok(None) => Err(AppError::NotFound("Video not found".into())),
            Err(e) => Err(e),
        };
        let updated = match updated {
            Ok(updated) => updated,
            Err(e) => {
                if let Some(new_thumbnail) = &thumbnail {
                    self.discard_asset(new_thumbnail, MediaKind::Image).await;
                }
                return Err(e);
            }
        };

        if thumbnail.is_some() {
            self.discard_asset(&video.thumbnail, MediaKind::Image).await;
        }

        info!(video_id = %id, "Video updated");
        Ok(updated)
    }

    /// Flip the published flag of an owned video
    pub async fn toggle_publish(&self, raw_id: &str, requester: ObjectId) -> Result<VideoDoc> {
        let id = parse_object_id(raw_id, "video")?;
        let video = self.find_video_or_404(id).await?;
        ensure_owner(&video, requester)?;

        let updated = self
            .call(
                "toggle publish",
                self.repo.set_video_published(id, !video.is_published),
            )
            .await?
            .ok_or_else(|| AppError::NotFound("Video not found".into()))?;

        info!(video_id = %id, published = updated.is_published, "Publish status changed");
        Ok(updated)
    }

    /// Delete an owned video with everything that references it
    pub async fn delete_video(&self, raw_id: &str, requester: ObjectId) -> Result<DeletionReport> {
        VideoDeletion::new(self.repo(), self.media(), self.timeout)
            .delete(raw_id, requester)
            .await
    }
}
