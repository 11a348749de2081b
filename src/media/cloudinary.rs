//! Cloudinary-backed media store
//!
//! Uses the signed REST upload API. Request signatures are the SHA-1 of the
//! alphabetically sorted `key=value` parameters joined with `&`, followed by
//! the API secret.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{DeleteOutcome, MediaAsset, MediaKind, MediaStore};
use crate::config::CloudinaryCredentials;
use crate::types::{AppError, Result};

/// Upload response fields we care about
#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    url: String,
    #[serde(default)]
    secure_url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

/// Destroy response: `{"result": "ok"}` or `{"result": "not found"}`
#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Cloudinary REST client
#[derive(Clone)]
pub struct CloudinaryStore {
    client: Client,
    api_url: String,
    credentials: CloudinaryCredentials,
}

impl CloudinaryStore {
    pub fn new(
        api_url: &str,
        credentials: CloudinaryCredentials,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn endpoint(&self, kind: MediaKind, action: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.api_url, self.credentials.cloud_name, kind, action
        )
    }

    async fn read_error(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => format!("{} ({})", body.error.message, status),
            Err(_) => format!("HTTP {}", status),
        }
    }
}

/// Sign request parameters
pub fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl MediaStore for CloudinaryStore {
    fn name(&self) -> &'static str {
        "cloudinary"
    }

    async fn upload(&self, local_path: &Path, kind: MediaKind) -> Result<MediaAsset> {
        let bytes = tokio::fs::read(local_path).await.map_err(|e| {
            AppError::InvalidArgument(format!(
                "Cannot read staged file {}: {}",
                local_path.display(),
                e
            ))
        })?;

        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[("timestamp", timestamp.clone())],
            &self.credentials.api_secret,
        );

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("api_key", self.credentials.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        debug!("Uploading {} as {}", local_path.display(), kind);

        let response = self
            .client
            .post(self.endpoint(kind, "upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let message = Self::read_error(response).await;
            return Err(AppError::MediaStore(format!(
                "Cloudinary {} upload failed: {}",
                kind, message
            )));
        }

        let uploaded: UploadResponse = response.json().await?;
        info!("Uploaded {} {}", kind, uploaded.public_id);

        Ok(MediaAsset {
            url: uploaded.secure_url.unwrap_or(uploaded.url),
            public_id: uploaded.public_id,
            duration: uploaded.duration,
        })
    }

    async fn delete(&self, asset: &MediaAsset, kind: MediaKind) -> Result<DeleteOutcome> {
        let public_id = match asset.delete_id() {
            Some(id) => id,
            None => {
                warn!("No public id on {} asset '{}', nothing to delete", kind, asset.url);
                return Ok(DeleteOutcome::AlreadyAbsent);
            }
        };

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let mut params = vec![
            ("invalidate", "true".to_string()),
            ("public_id", public_id.clone()),
            ("timestamp", timestamp),
        ];
        let signature = sign(&params, &self.credentials.api_secret);
        params.push(("api_key", self.credentials.api_key.clone()));
        params.push(("signature", signature));

        let response = self
            .client
            .post(self.endpoint(kind, "destroy"))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let message = Self::read_error(response).await;
            return Err(AppError::MediaStore(format!(
                "Cloudinary {} delete of {} failed: {}",
                kind, public_id, message
            )));
        }

        let destroyed: DestroyResponse = response.json().await?;
        parse_destroy_result(&destroyed.result, &public_id, kind)
    }
}

fn parse_destroy_result(result: &str, public_id: &str, kind: MediaKind) -> Result<DeleteOutcome> {
    match result {
        "ok" => {
            info!("Deleted {} {}", kind, public_id);
            Ok(DeleteOutcome::Deleted)
        }
        "not found" => {
            warn!("{} {} was already absent from Cloudinary", kind, public_id);
            Ok(DeleteOutcome::AlreadyAbsent)
        }
        other => Err(AppError::MediaStore(format!(
            "Cloudinary refused to delete {} {}: {}",
            kind, public_id, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_sorts_parameters() {
        let a = sign(
            &[
                ("timestamp", "1315060510".to_string()),
                ("public_id", "sample".to_string()),
            ],
            "abcd",
        );
        let b = sign(
            &[
                ("public_id", "sample".to_string()),
                ("timestamp", "1315060510".to_string()),
            ],
            "abcd",
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
        assert_ne!(a, sign(&[("public_id", "sample".to_string())], "abcd"));
    }

    #[test]
    fn test_sign_matches_reference_digest() {
        // sha1("public_id=sample&timestamp=1315060510abcd")
        let expected = {
            let mut h = Sha1::new();
            h.update(b"public_id=sample&timestamp=1315060510abcd");
            hex::encode(h.finalize())
        };
        let got = sign(
            &[
                ("timestamp", "1315060510".to_string()),
                ("public_id", "sample".to_string()),
            ],
            "abcd",
        );
        assert_eq!(got, expected);
    }

    #[test]
    fn test_destroy_results() {
        assert_eq!(
            parse_destroy_result("ok", "x", MediaKind::Video).unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            parse_destroy_result("not found", "x", MediaKind::Image).unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
        assert!(matches!(
            parse_destroy_result("error", "x", MediaKind::Image),
            Err(AppError::MediaStore(_))
        ));
    }

    #[test]
    fn test_endpoint_layout() {
        let store = CloudinaryStore::new(
            "https://api.cloudinary.com/v1_1/",
            CloudinaryCredentials {
                cloud_name: "demo".into(),
                api_key: "key".into(),
                api_secret: "secret".into(),
            },
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(
            store.endpoint(MediaKind::Video, "destroy"),
            "https://api.cloudinary.com/v1_1/demo/video/destroy"
        );
    }
}
