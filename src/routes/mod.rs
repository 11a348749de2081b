//! API route handlers
//!
//! Every endpoint lives under `/api/v1`. Handlers get an [`ApiRequest`]
//! (method, path, decoded query, headers and the collected body), call into
//! [`crate::services`], and answer with the JSON envelope
//! `{statusCode, data, message, success}`. Failures use
//! `{statusCode, message, success: false, code, retryable}`.

pub mod health;
pub mod social;
pub mod subscriptions;
pub mod tweets;
pub mod users;
pub mod videos;

pub use health::{health_check, readiness_check};

use bson::oid::ObjectId;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{HeaderMap, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, error};

use crate::auth::token_from_headers;
use crate::db::schemas::UserDoc;
use crate::db::Repository;
use crate::server::AppState;
use crate::services::bounded;
use crate::types::{AppError, ErrorKind, Result};

pub type FullBody = Full<Bytes>;

/// Path prefix of the versioned API
pub const API_PREFIX: &str = "/api/v1";

/// A request with its body already read
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Files this request wrote to the staging directory
    pub staged: Vec<PathBuf>,
}

impl ApiRequest {
    pub fn new(
        method: Method,
        path: &str,
        query: Option<&str>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: parse_query(query),
            headers,
            body,
            staged: Vec::new(),
        }
    }

    pub fn with_staged(mut self, staged: Vec<PathBuf>) -> Self {
        self.staged = staged;
        self
    }

    /// Non-empty query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Decode the JSON body; an empty body reads as `{}`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::from_slice(b"{}")?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Decode a query string into a map; later keys win
pub fn parse_query(raw: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in raw.unwrap_or("").split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let decode = |s: &str| {
            let spaced = s.replace('+', " ");
            urlencoding::decode(&spaced)
                .map(|c| c.into_owned())
                .unwrap_or(spaced)
        };
        params.insert(decode(key), decode(value));
    }
    params
}

/// Success envelope
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    status_code: u16,
    data: Value,
    message: String,
    success: bool,
}

/// Error envelope
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: u16,
    message: String,
    success: bool,
    code: &'static str,
    retryable: bool,
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<FullBody> {
    let json = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Wrap data in the success envelope
pub fn ok_response<T: Serialize>(
    status: StatusCode,
    data: &T,
    message: &str,
) -> Result<Response<FullBody>> {
    Ok(json_response(
        status,
        &ApiResponse {
            status_code: status.as_u16(),
            data: api_json(data)?,
            message: message.to_string(),
            success: true,
        },
    ))
}

/// Map an error onto the error envelope
pub fn error_response(err: &AppError) -> Response<FullBody> {
    let status = err.status_code();
    if err.kind() == ErrorKind::Internal {
        error!(retryable = err.is_retryable(), "Request failed: {}", err);
    } else {
        debug!("Request rejected: {}", err);
    }

    json_response(
        status,
        &ErrorBody {
            status_code: status.as_u16(),
            message: err.public_message(),
            success: false,
            code: err.kind().code(),
            retryable: err.is_retryable(),
        },
    )
}

/// Serialize for API output
///
/// Document ids become plain hex strings and timestamps RFC 3339 strings
/// instead of their extended-JSON wrappers.
pub fn api_json<T: Serialize>(value: &T) -> Result<Value> {
    let mut json = serde_json::to_value(value)?;
    flatten_extended_json(&mut json);
    Ok(json)
}

fn flatten_extended_json(value: &mut Value) {
    if let Some(scalar) = extended_scalar(value) {
        *value = Value::String(scalar);
        return;
    }
    match value {
        Value::Object(map) => map.values_mut().for_each(flatten_extended_json),
        Value::Array(items) => items.iter_mut().for_each(flatten_extended_json),
        _ => {}
    }
}

/// String form of a `{"$oid": ..}` or `{"$date": ..}` wrapper
fn extended_scalar(value: &Value) -> Option<String> {
    let map = value.as_object().filter(|m| m.len() == 1)?;
    if let Some(hex) = map.get("$oid") {
        return hex.as_str().map(str::to_string);
    }
    map.get("$date").and_then(format_date)
}

fn format_date(date: &Value) -> Option<String> {
    let millis = match date {
        Value::String(s) => return Some(s.clone()),
        Value::Number(n) => n.as_i64()?,
        Value::Object(inner) => inner.get("$numberLong")?.as_str()?.parse().ok()?,
        _ => return None,
    };
    bson::DateTime::from_millis(millis)
        .try_to_rfc3339_string()
        .ok()
}

/// Resolve the authenticated user
///
/// The token must verify and its user must still exist.
pub async fn require_user(state: &AppState, req: &ApiRequest) -> Result<UserDoc> {
    let token = token_from_headers(&req.headers)
        .ok_or_else(|| AppError::Unauthorized("Unauthorized request".into()))?;
    let claims = state.jwt.verify_token(token)?;
    let user_id = claims.user_id()?;

    let services = &state.services;
    bounded(
        "find user",
        services.timeout(),
        services.repo().find_user(user_id),
    )
    .await?
    .ok_or_else(|| AppError::Unauthorized("Invalid access token".into()))
}

/// Like [`require_user`], but anonymous callers are allowed
pub async fn optional_user(state: &AppState, req: &ApiRequest) -> Result<Option<UserDoc>> {
    if token_from_headers(&req.headers).is_none() {
        return Ok(None);
    }
    require_user(state, req).await.map(Some)
}

pub(crate) fn user_id(user: &UserDoc) -> Result<ObjectId> {
    user._id
        .ok_or_else(|| AppError::Internal("Stored user has no id".into()))
}

fn route_not_found(req: &ApiRequest) -> AppError {
    AppError::NotFound(format!("No route for {} {}", req.method, req.path))
}

/// Dispatch a request under `/api/v1`
pub async fn handle_api_request(state: &AppState, req: ApiRequest) -> Response<FullBody> {
    let rest = req
        .path
        .strip_prefix(API_PREFIX)
        .unwrap_or("")
        .trim_matches('/')
        .to_string();
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    let result = match segments.split_first() {
        Some((&"videos", tail)) => videos::handle(state, &req, tail).await,
        Some((&"users", tail)) => users::handle(state, &req, tail).await,
        Some((&"subscriptions", tail)) => subscriptions::handle(state, &req, tail).await,
        Some((&"comments", tail)) => social::handle_comments(state, &req, tail).await,
        Some((&"likes", tail)) => social::handle_likes(state, &req, tail).await,
        Some((&"playlists", tail)) => social::handle_playlists(state, &req, tail).await,
        Some((&"tweets", tail)) => tweets::handle(state, &req, tail).await,
        _ => Err(route_not_found(&req)),
    };

    result.unwrap_or_else(|e| error_response(&e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::Metadata;
    use serde_json::json;

    #[test]
    fn test_parse_query() {
        let q = parse_query(Some("page=2&query=rust+async&sortBy=views&empty=&flag"));
        assert_eq!(q["page"], "2");
        assert_eq!(q["query"], "rust async");
        assert_eq!(q["empty"], "");
        assert_eq!(q["flag"], "");

        let q = parse_query(Some("query=caf%C3%A9%20time"));
        assert_eq!(q["query"], "café time");
        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn test_api_json_flattens_ids_and_dates() {
        let id = ObjectId::new();
        let meta = Metadata {
            created_at: Some(bson::DateTime::from_millis(0)),
            updated_at: None,
        };

        let value = api_json(&json!({ "id": id, "nested": [id] })).unwrap();
        assert_eq!(value["id"], json!(id.to_hex()));
        assert_eq!(value["nested"][0], json!(id.to_hex()));

        let value = api_json(&meta).unwrap();
        assert!(value["createdAt"]
            .as_str()
            .unwrap()
            .starts_with("1970-01-01T00:00:00"));
    }

    #[test]
    fn test_error_envelope() {
        let response = error_response(&AppError::Timeout {
            operation: "delete comments".into(),
            after_ms: 10,
        });
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_empty_body_reads_as_object() {
        #[derive(serde::Deserialize)]
        struct Body {
            #[serde(default)]
            content: String,
        }
        let req = ApiRequest::new(Method::POST, "/", None, HeaderMap::new(), Bytes::new());
        assert_eq!(req.json::<Body>().unwrap().content, "");

        let req = ApiRequest::new(Method::POST, "/", None, HeaderMap::new(), Bytes::from("nope"));
        assert!(matches!(req.json::<Body>(), Err(AppError::InvalidArgument(_))));
    }
}
