//! Configuration for VideoTube
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Minimum length accepted for the access token secret
pub const MIN_SECRET_LEN: usize = 32;

/// VideoTube - video sharing backend
#[derive(Parser, Debug, Clone)]
#[command(name = "videotube")]
#[command(about = "Video sharing API over MongoDB and a hosted media store")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory fallbacks, local media store)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "videotube")]
    pub mongodb_db: String,

    /// Secret used to verify access tokens (required in production)
    #[arg(long, env = "ACCESS_TOKEN_SECRET")]
    pub access_token_secret: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format (text or json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Timeout for a single repository or media store call, in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout_ms: u64,

    /// Maximum accepted request body size in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "1048576")]
    pub max_body_bytes: usize,

    /// Maximum size of a multipart upload request in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "268435456")]
    pub max_upload_bytes: u64,

    /// Allowed CORS origin
    #[arg(long, env = "CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,

    /// Media store configuration
    #[command(flatten)]
    pub media: MediaArgs,
}

/// Media store configuration
#[derive(Parser, Debug, Clone)]
pub struct MediaArgs {
    /// Cloudinary cloud name
    #[arg(long, env = "CLOUDINARY_CLOUD_NAME")]
    pub cloudinary_cloud_name: Option<String>,

    /// Cloudinary API key
    #[arg(long, env = "CLOUDINARY_API_KEY")]
    pub cloudinary_api_key: Option<String>,

    /// Cloudinary API secret
    #[arg(long, env = "CLOUDINARY_API_SECRET")]
    pub cloudinary_api_secret: Option<String>,

    /// Cloudinary API base URL
    #[arg(
        long,
        env = "CLOUDINARY_API_URL",
        default_value = "https://api.cloudinary.com/v1_1"
    )]
    pub cloudinary_api_url: String,

    /// Directory holding staged uploads
    #[arg(long, env = "UPLOAD_DIR", default_value = "./public/temp")]
    pub upload_dir: PathBuf,

    /// Directory used by the local media store
    #[arg(long, env = "MEDIA_DIR", default_value = "./public/media")]
    pub media_dir: PathBuf,

    /// Public base URL of the local media store
    #[arg(
        long,
        env = "PUBLIC_MEDIA_URL",
        default_value = "http://localhost:8000/media"
    )]
    pub public_media_url: String,
}

/// Cloudinary credentials, present only when all three are configured
#[derive(Debug, Clone)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl MediaArgs {
    /// Cloudinary credentials if fully configured
    pub fn cloudinary(&self) -> Option<CloudinaryCredentials> {
        match (
            &self.cloudinary_cloud_name,
            &self.cloudinary_api_key,
            &self.cloudinary_api_secret,
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryCredentials {
                cloud_name: cloud_name.clone(),
                api_key: api_key.clone(),
                api_secret: api_secret.clone(),
            }),
            _ => None,
        }
    }
}

impl Args {
    /// Per-call timeout for repository and media store operations
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.access_token_secret {
                None => {
                    return Err("ACCESS_TOKEN_SECRET is required in production mode".to_string())
                }
                Some(secret) if secret.len() < MIN_SECRET_LEN => {
                    return Err(format!(
                        "ACCESS_TOKEN_SECRET must be at least {} characters",
                        MIN_SECRET_LEN
                    ))
                }
                Some(_) => {}
            }

            if self.media.cloudinary().is_none() {
                return Err(
                    "CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET are required in production mode"
                        .to_string(),
                );
            }
        }

        if self.request_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS must be greater than zero".to_string());
        }

        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(format!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.log_format
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["videotube"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_dev_mode_needs_no_secrets() {
        let args = parse(&["--dev-mode"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.request_timeout(), Duration::from_millis(10_000));
    }

    #[test]
    fn test_production_requires_secret_and_media() {
        let args = parse(&[]);
        assert!(args.validate().is_err());

        let args = parse(&["--access-token-secret", "short"]);
        assert!(args.validate().unwrap_err().contains("at least"));

        let args = parse(&[
            "--access-token-secret",
            "0123456789abcdef0123456789abcdef",
        ]);
        assert!(args.validate().unwrap_err().contains("CLOUDINARY"));

        let args = parse(&[
            "--access-token-secret",
            "0123456789abcdef0123456789abcdef",
            "--cloudinary-cloud-name",
            "demo",
            "--cloudinary-api-key",
            "key",
            "--cloudinary-api-secret",
            "secret",
        ]);
        assert!(args.validate().is_ok());
        assert_eq!(args.media.cloudinary().unwrap().cloud_name, "demo");
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let args = parse(&["--dev-mode", "--log-format", "xml"]);
        assert!(args.validate().is_err());
    }
}
