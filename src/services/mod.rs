//! Domain operations behind the HTTP handlers
//!
//! Every repository and media store call made here goes through
//! [`bounded`], so no request waits on a backend longer than the configured
//! per-call timeout.

pub mod ownership;
pub mod social;
pub mod subscriptions;
pub mod tweets;
pub mod users;
pub mod video_deletion;
pub mod videos;

pub use ownership::{ensure_owner, Owned};
pub use video_deletion::{CascadeReport, CascadeStep, DeletionReport, VideoDeletion};
pub use social::{NewComment, NewPlaylist};
pub use tweets::NewTweet;
pub use users::ProfileUpdate;
pub use videos::{PublishVideo, VideoDetails, VideoListing, VideoUpdate};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::db::Repository;
use crate::media::MediaStore;
use crate::types::{AppError, Result};

/// Run one backend call under a deadline
///
/// An elapsed deadline becomes [`AppError::Timeout`], which callers may retry.
pub async fn bounded<T, F>(operation: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout {
            operation: operation.to_string(),
            after_ms: limit.as_millis() as u64,
        }),
    }
}

/// Shared dependencies of every domain operation
#[derive(Clone)]
pub struct Services {
    repo: Arc<dyn Repository>,
    media: Arc<dyn MediaStore>,
    timeout: Duration,
    upload_dir: PathBuf,
}

impl Services {
    pub fn new(
        repo: Arc<dyn Repository>,
        media: Arc<dyn MediaStore>,
        timeout: Duration,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            repo,
            media,
            timeout,
            upload_dir,
        }
    }

    pub fn repo(&self) -> &dyn Repository {
        self.repo.as_ref()
    }

    pub fn media(&self) -> &dyn MediaStore {
        self.media.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Staging directory for incoming files
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    async fn call<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        bounded(operation, self.timeout, call).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::db::MemoryRepository;
    use crate::media::testing::FakeMediaStore;

    pub fn services(repo: Arc<MemoryRepository>, media: Arc<FakeMediaStore>) -> Services {
        Services::new(
            repo,
            media,
            Duration::from_secs(5),
            std::env::temp_dir().join("videotube-staging"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_times_out() {
        let err = bounded("slow call", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Timeout { after_ms: 10, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let value = bounded("fast call", Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
