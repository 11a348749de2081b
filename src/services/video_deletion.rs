//! Video deletion workflow
//!
//! Deleting a video touches five collections and the media store, none of
//! which share a transaction. The workflow runs as an ordered saga:
//!
//! 1. delete likes on the video
//! 2. collect the ids of the video's comments
//! 3. delete likes on those comments
//! 4. delete the comments
//! 5. pull the video from every playlist
//! 6. pull the video from every watch history
//! 7. delete the video file, then the thumbnail, from the media store
//! 8. delete the video record
//!
//! Steps 1-6 are filter-based deletes and `$pull`s, so re-running them after
//! a partial failure is a no-op for the parts already done. The video record
//! goes last: while it exists a failed deletion can be retried. If media is
//! gone but the record cannot be removed, the error says so explicitly.

use bson::oid::ObjectId;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{bounded, ensure_owner};
use crate::db::schemas::VideoDoc;
use crate::db::CascadeRepository;
use crate::media::{DeleteOutcome, MediaAsset, MediaKind, MediaStore};
use crate::types::{parse_object_id, AppError, Result};

/// Mutating steps of the workflow, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeStep {
    DeleteVideoLikes,
    CollectComments,
    DeleteCommentLikes,
    DeleteComments,
    PullFromPlaylists,
    PullFromWatchHistories,
    DeleteMedia,
    DeleteRecord,
}

impl CascadeStep {
    pub fn number(&self) -> u8 {
        match self {
            Self::DeleteVideoLikes => 1,
            Self::CollectComments => 2,
            Self::DeleteCommentLikes => 3,
            Self::DeleteComments => 4,
            Self::PullFromPlaylists => 5,
            Self::PullFromWatchHistories => 6,
            Self::DeleteMedia => 7,
            Self::DeleteRecord => 8,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::DeleteVideoLikes => "delete video likes",
            Self::CollectComments => "collect comments",
            Self::DeleteCommentLikes => "delete comment likes",
            Self::DeleteComments => "delete comments",
            Self::PullFromPlaylists => "remove from playlists",
            Self::PullFromWatchHistories => "remove from watch histories",
            Self::DeleteMedia => "delete media",
            Self::DeleteRecord => "delete video record",
        }
    }
}

impl fmt::Display for CascadeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} ({})", self.number(), self.description())
    }
}

/// Affected counts of steps 1-6
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub video_likes: u64,
    pub comments: u64,
    pub comment_likes: u64,
    pub playlists: u64,
    pub watch_histories: u64,
}

impl CascadeReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Outcome of a completed deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    pub video_id: ObjectId,
    pub cascade: CascadeReport,
    pub video_file: DeleteOutcome,
    pub thumbnail: DeleteOutcome,
    /// False when a concurrent deletion removed the record first
    pub record_removed: bool,
}

/// The deletion workflow over explicit dependencies
pub struct VideoDeletion<'a, R: CascadeRepository + ?Sized> {
    repo: &'a R,
    media: &'a dyn MediaStore,
    call_timeout: Duration,
}

impl<'a, R: CascadeRepository + ?Sized> VideoDeletion<'a, R> {
    pub fn new(repo: &'a R, media: &'a dyn MediaStore, call_timeout: Duration) -> Self {
        Self {
            repo,
            media,
            call_timeout,
        }
    }

    /// Validate the request, then run every step
    ///
    /// Nothing is written unless the id parses, the video exists and the
    /// requester owns it.
    pub async fn delete(&self, raw_video_id: &str, requester: ObjectId) -> Result<DeletionReport> {
        let video_id = parse_object_id(raw_video_id, "video")?;

        let video = bounded(
            "find video",
            self.call_timeout,
            self.repo.find_video(video_id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".into()))?;

        ensure_owner(&video, requester)?;

        info!(video_id = %video_id, requester = %requester, "Deleting video");

        let cascade = self.run_cascade(video_id).await?;
        let (video_file, thumbnail) = self.delete_media(&video).await?;
        let record_removed = self.delete_record(video_id).await?;

        info!(
            video_id = %video_id,
            likes = cascade.video_likes + cascade.comment_likes,
            comments = cascade.comments,
            playlists = cascade.playlists,
            watch_histories = cascade.watch_histories,
            "Video deleted"
        );

        Ok(DeletionReport {
            video_id,
            cascade,
            video_file,
            thumbnail,
            record_removed,
        })
    }

    /// Steps 1-6: remove every reference to the video
    ///
    /// Safe to call repeatedly; a second run reports zero affected records.
    pub async fn run_cascade(&self, video_id: ObjectId) -> Result<CascadeReport> {
        let mut report = CascadeReport::default();

        report.video_likes = self
            .step(
                CascadeStep::DeleteVideoLikes,
                self.repo.delete_video_likes(video_id),
            )
            .await?;

        let comment_ids = self
            .step(
                CascadeStep::CollectComments,
                self.repo.video_comment_ids(video_id),
            )
            .await?;

        if !comment_ids.is_empty() {
            report.comment_likes = self
                .step(
                    CascadeStep::DeleteCommentLikes,
                    self.repo.delete_comment_likes(&comment_ids),
                )
                .await?;
        }

        report.comments = self
            .step(
                CascadeStep::DeleteComments,
                self.repo.delete_video_comments(video_id),
            )
            .await?;

        report.playlists = self
            .step(
                CascadeStep::PullFromPlaylists,
                self.repo.pull_video_from_playlists(video_id),
            )
            .await?;

        report.watch_histories = self
            .step(
                CascadeStep::PullFromWatchHistories,
                self.repo.pull_video_from_watch_histories(video_id),
            )
            .await?;

        Ok(report)
    }

    /// Step 7: video file first, then thumbnail
    async fn delete_media(&self, video: &VideoDoc) -> Result<(DeleteOutcome, DeleteOutcome)> {
        let video_file = self
            .delete_asset(&video.video_file, MediaKind::Video)
            .await?;
        let thumbnail = self
            .delete_asset(&video.thumbnail, MediaKind::Image)
            .await?;
        Ok((video_file, thumbnail))
    }

    async fn delete_asset(&self, asset: &MediaAsset, kind: MediaKind) -> Result<DeleteOutcome> {
        let outcome = self
            .step(CascadeStep::DeleteMedia, self.media.delete(asset, kind))
            .await?;
        if outcome == DeleteOutcome::AlreadyAbsent {
            warn!("{} '{}' was already absent from {}", kind, asset.url, self.media.name());
        }
        Ok(outcome)
    }

    /// Step 8
    async fn delete_record(&self, video_id: ObjectId) -> Result<bool> {
        let call = bounded(
            "delete video record",
            self.call_timeout,
            self.repo.delete_video(video_id),
        );

        match call.await {
            Ok(true) => Ok(true),
            Ok(false) => {
                warn!(video_id = %video_id, "Video record already removed by a concurrent deletion");
                Ok(false)
            }
            Err(e) => {
                error!(
                    video_id = %video_id,
                    error = %e,
                    "Media deleted but video record remains; manual cleanup required"
                );
                Err(AppError::OrphanedRecord {
                    video_id: video_id.to_hex(),
                    source: Box::new(e),
                })
            }
        }
    }

    async fn step<T, F>(&self, step: CascadeStep, call: F) -> Result<T>
    where
        T: fmt::Debug,
        F: Future<Output = Result<T>>,
    {
        match bounded(step.description(), self.call_timeout, call).await {
            Ok(value) => {
                debug!(%step, result = ?value, "Cascade step done");
                Ok(value)
            }
            Err(e) => {
                error!(%step, error = %e, "Video deletion aborted");
                Err(AppError::Cascade {
                    step: step.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }
}
