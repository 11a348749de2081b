//! Error types for VideoTube
//!
//! Every failure collapses onto one of a handful of caller-facing kinds
//! (see [`ErrorKind`]); the variants keep enough detail for operators.

use hyper::StatusCode;
use std::fmt;

/// Caller-facing error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Unauthorized,
    Forbidden,
    NotFound,
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code used in error envelopes
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Main error type for VideoTube operations
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Media store error: {0}")]
    MediaStore(String),

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    /// A cascade step failed; earlier steps stay committed.
    #[error("Video deletion aborted at step '{step}': {source}")]
    Cascade {
        step: String,
        #[source]
        source: Box<AppError>,
    },

    /// Media is gone but the video record could not be removed.
    #[error("Video {video_id} orphaned: media deleted but record removal failed: {source}")]
    OrphanedRecord {
        video_id: String,
        #[source]
        source: Box<AppError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Database(_)
            | Self::MediaStore(_)
            | Self::Timeout { .. }
            | Self::Cascade { .. }
            | Self::OrphanedRecord { .. }
            | Self::Internal(_)
            | Self::Config(_) => ErrorKind::Internal,
        }
    }

    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    /// Whether re-issuing the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Cascade { source, .. } | Self::OrphanedRecord { source, .. } => {
                source.is_retryable()
            }
            _ => false,
        }
    }

    /// Message safe to show to API callers
    ///
    /// Internal failures are summarised; the full chain goes to the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Cascade { step, .. } => {
                format!("Error while deleting video (failed at {})", step)
            }
            Self::OrphanedRecord { video_id, .. } => format!(
                "Video {} media was deleted but its record could not be removed",
                video_id
            ),
            Self::Timeout { operation, .. } => format!("{} timed out", operation),
            Self::Database(_) => "Database error".to_string(),
            Self::MediaStore(_) => "Media store error".to_string(),
            Self::Internal(_) | Self::Config(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidArgument(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for AppError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::de::Error> for AppError {
    fn from(err: bson::de::Error) -> Self {
        Self::Database(format!("Malformed document: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::MediaStore(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("JWT error: {}", err))
    }
}

/// Result type alias for VideoTube operations
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_variants_share_kind() {
        let errors = vec![
            AppError::Database("down".into()),
            AppError::MediaStore("502".into()),
            AppError::Timeout {
                operation: "delete likes".into(),
                after_ms: 10,
            },
            AppError::OrphanedRecord {
                video_id: "abc".into(),
                source: Box::new(AppError::Database("down".into())),
            },
        ];

        for err in errors {
            assert_eq!(err.kind(), ErrorKind::Internal);
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn test_retryable_follows_cascade_source() {
        let timed_out = AppError::Cascade {
            step: "delete comments".into(),
            source: Box::new(AppError::Timeout {
                operation: "delete comments".into(),
                after_ms: 5,
            }),
        };
        assert!(timed_out.is_retryable());

        let db = AppError::Cascade {
            step: "delete comments".into(),
            source: Box::new(AppError::Database("write conflict".into())),
        };
        assert!(!db.is_retryable());
    }

    #[test]
    fn test_orphaned_record_retryable_after_timeout() {
        let timed_out = AppError::OrphanedRecord {
            video_id: "abc".into(),
            source: Box::new(AppError::Timeout {
                operation: "delete video record".into(),
                after_ms: 50,
            }),
        };
        assert!(timed_out.is_retryable());

        let rejected = AppError::OrphanedRecord {
            video_id: "abc".into(),
            source: Box::new(AppError::Database("not authorized".into())),
        };
        assert!(!rejected.is_retryable());
    }

    #[test]
    fn test_public_message_hides_internals() {
        let err = AppError::Database("connection string mongodb://user:pw@host".into());
        assert!(!err.public_message().contains("pw"));

        let err = AppError::Forbidden("You are not the owner of this video".into());
        assert!(err.public_message().contains("owner"));
    }
}
