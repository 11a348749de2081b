//! `multipart/form-data` intake
//!
//! File fields are streamed into the upload staging directory under a fresh
//! name; the request then reads like a JSON request whose file fields hold
//! those staged names. Text fields become string members of the same object.

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::header::CONTENT_TYPE;
use hyper::http::request::Parts;
use hyper::HeaderMap;
use multer::{Constraints, Multipart, SizeLimit};
use serde_json::{Map, Value};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::routes::ApiRequest;
use crate::types::{AppError, Result};

/// Multipart boundary, if the request carries form data
pub fn form_boundary(headers: &HeaderMap) -> Option<String> {
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    if !content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
    {
        return None;
    }
    multer::parse_boundary(content_type).ok()
}

/// Stage every file of a form and build the request around them
pub async fn read_form<B>(
    parts: Parts,
    body: B,
    boundary: String,
    upload_dir: &Path,
    max_bytes: u64,
) -> Result<ApiRequest>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    tokio::fs::create_dir_all(upload_dir).await?;

    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(max_bytes));
    let mut form = Multipart::with_constraints(body.into_data_stream(), boundary, constraints);

    let mut fields = Map::new();
    let mut staged = Vec::new();

    let outcome = collect_fields(&mut form, upload_dir, &mut fields, &mut staged).await;
    if let Err(e) = outcome {
        remove_staged(&staged).await;
        return Err(e);
    }

    let body = serde_json::to_vec(&Value::Object(fields))?;
    Ok(ApiRequest::new(
        parts.method,
        parts.uri.path(),
        parts.uri.query(),
        parts.headers,
        Bytes::from(body),
    )
    .with_staged(staged))
}

async fn collect_fields(
    form: &mut Multipart<'static>,
    upload_dir: &Path,
    fields: &mut Map<String, Value>,
    staged: &mut Vec<PathBuf>,
) -> Result<()> {
    while let Some(mut field) = form.next_field().await.map_err(form_error)? {
        let name = match field.name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => continue,
        };

        let Some(original) = field.file_name().map(str::to_string) else {
            let text = field.text().await.map_err(form_error)?;
            fields.insert(name, Value::String(text));
            continue;
        };

        let staged_name = staged_file_name(&original);
        let path = upload_dir.join(&staged_name);
        staged.push(path.clone());

        let mut file = tokio::fs::File::create(&path).await?;
        let mut written = 0usize;
        while let Some(chunk) = field.chunk().await.map_err(form_error)? {
            written += chunk.len();
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        debug!(field = %name, bytes = written, "Staged upload {}", staged_name);
        fields.insert(name, Value::String(staged_name));
    }
    Ok(())
}

fn form_error(e: multer::Error) -> AppError {
    AppError::InvalidArgument(format!("Malformed form data: {}", e))
}

/// Unique, filesystem-safe name that keeps the client's extension
pub fn staged_file_name(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or("");
    let safe: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = safe.trim_start_matches('.');

    if safe.is_empty() {
        Uuid::new_v4().simple().to_string()
    } else {
        format!("{}-{}", Uuid::new_v4().simple(), safe)
    }
}

/// Delete staged files that are still around
pub async fn remove_staged(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Removed leftover upload {}", path.display()),
            Err(e) if e.kind() == IoErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staged file {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_form_boundary() {
        let mut headers = HeaderMap::new();
        assert_eq!(form_boundary(&headers), None);

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert_eq!(form_boundary(&headers), None);

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary=XyZ"),
        );
        assert_eq!(form_boundary(&headers).as_deref(), Some("XyZ"));
    }

    #[test]
    fn test_staged_file_name_is_plain() {
        let name = staged_file_name("../../etc/my clip.mp4");
        assert!(name.ends_with("-my_clip.mp4"));
        assert!(!name.contains('/'));

        let name = staged_file_name(".hidden");
        assert!(name.ends_with("-hidden"));

        assert!(!staged_file_name("").is_empty());
        assert_ne!(staged_file_name("a.png"), staged_file_name("a.png"));
    }
}
