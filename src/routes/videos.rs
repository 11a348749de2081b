//! Video endpoints
//!
//! - `GET    /videos` list (published only, unless listing your own channel)
//! - `POST   /videos` publish from staged files
//! - `GET    /videos/{id}` watch
//! - `PATCH  /videos/{id}` update title, description or thumbnail
//! - `DELETE /videos/{id}` delete with every reference to it
//! - `PATCH  /videos/{id}/publish` toggle visibility

use hyper::{Method, Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};

use super::{
    api_json, ok_response, optional_user, require_user, route_not_found, user_id, ApiRequest, FullBody,
};
use crate::db::{VideoQuery, VideoSort};
use crate::server::AppState;
use crate::services::videos::MAX_PAGE_SIZE;
use crate::services::{PublishVideo, VideoUpdate};
use crate::types::{parse_object_id, AppError, Result};

pub async fn handle(
    state: &AppState,
    req: &ApiRequest,
    segments: &[&str],
) -> Result<Response<FullBody>> {
    match (&req.method, segments) {
        (&Method::GET, []) => list_videos(state, req).await,
        (&Method::POST, []) => publish_video(state, req).await,
        (&Method::GET, [id]) => watch_video(state, req, id).await,
        (&Method::PATCH, [id]) => update_video(state, req, id).await,
        (&Method::DELETE, [id]) => delete_video(state, req, id).await,
        (&Method::PATCH, [id, "publish"]) => toggle_publish(state, req, id).await,
        _ => Err(route_not_found(req)),
    }
}

/// Paginated listing in the shape clients already consume
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListingPage {
    docs: Vec<Value>,
    total_docs: u64,
    page: u64,
    limit: u64,
    total_pages: u64,
}

fn number_param(req: &ApiRequest, name: &str, default: u64) -> Result<u64> {
    match req.param(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::InvalidArgument(format!("{} must be a positive number", name))),
    }
}

/// Build the listing query from request parameters
fn video_query(req: &ApiRequest) -> Result<VideoQuery> {
    let defaults = VideoQuery::default();

    let sort = match req.param("sortBy") {
        None => defaults.sort,
        Some(raw) => VideoSort::parse(raw)
            .ok_or_else(|| AppError::InvalidArgument(format!("Cannot sort by '{}'", raw)))?,
    };
    let descending = match req.param("sortType") {
        None => defaults.descending,
        Some("desc") => true,
        Some("asc") => false,
        Some(other) => {
            return Err(AppError::InvalidArgument(format!(
                "sortType must be 'asc' or 'desc', got '{}'",
                other
            )))
        }
    };
    let owner = req
        .param("userId")
        .map(|raw| parse_object_id(raw, "user"))
        .transpose()?;

    Ok(VideoQuery {
        page: number_param(req, "page", defaults.page)?.max(1),
        limit: number_param(req, "limit", defaults.limit)?.clamp(1, MAX_PAGE_SIZE),
        search: req.param("query").map(str::to_string),
        owner,
        include_unpublished: false,
        sort,
        descending,
    })
}

async fn list_videos(state: &AppState, req: &ApiRequest) -> Result<Response<FullBody>> {
    let viewer = match optional_user(state, req).await? {
        Some(user) => Some(user_id(&user)?),
        None => None,
    };
    let query = video_query(req)?;
    let (page, limit) = (query.page, query.limit);

    let result = state.services.list_videos(query, viewer).await?;

    let docs = result
        .videos
        .iter()
        .map(|entry| {
            let mut video = api_json(&entry.video)?;
            video["owner"] = api_json(&entry.owner)?;
            Ok(video)
        })
        .collect::<Result<Vec<Value>>>()?;
    let listing = ListingPage {
        docs,
        total_docs: result.total,
        page,
        limit,
        total_pages: result.total.div_ceil(limit),
    };
    ok_response(StatusCode::OK, &listing, "Videos fetched successfully")
}

async fn publish_video(state: &AppState, req: &ApiRequest) -> Result<Response<FullBody>> {
    let user = require_user(state, req).await?;
    let request: PublishVideo = req.json()?;
    let video = state
        .services
        .publish_video(user_id(&user)?, request)
        .await?;
    ok_response(StatusCode::CREATED, &video, "Video published successfully")
}

async fn watch_video(state: &AppState, req: &ApiRequest, id: &str) -> Result<Response<FullBody>> {
    let user = require_user(state, req).await?;
    let details = state.services.watch_video(id, user_id(&user)?).await?;
    ok_response(StatusCode::OK, &details, "Video fetched successfully")
}

async fn update_video(state: &AppState, req: &ApiRequest, id: &str) -> Result<Response<FullBody>> {
    let user = require_user(state, req).await?;
    let update: VideoUpdate = req.json()?;
    let video = state
        .services
        .update_video(id, user_id(&user)?, update)
        .await?;
    ok_response(StatusCode::OK, &video, "Video updated successfully")
}

async fn delete_video(state: &AppState, req: &ApiRequest, id: &str) -> Result<Response<FullBody>> {
    let user = require_user(state, req).await?;
    state.services.delete_video(id, user_id(&user)?).await?;
    ok_response(StatusCode::OK, &json!({}), "Video deleted successfully")
}

async fn toggle_publish(
    state: &AppState,
    req: &ApiRequest,
    id: &str,
) -> Result<Response<FullBody>> {
    let user = require_user(state, req).await?;
    let video = state
        .services
        .toggle_publish(id, user_id(&user)?)
        .await?;
    ok_response(
        StatusCode::OK,
        &json!({ "isPublished": video.is_published }),
        "Publish status toggled successfully",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::HeaderMap;

    fn request(query: &str) -> ApiRequest {
        ApiRequest::new(
            Method::GET,
            "/api/v1/videos",
            Some(query),
            HeaderMap::new(),
            bytes::Bytes::new(),
        )
    }

    #[test]
    fn test_video_query_from_params() {
        let q = video_query(&request("page=3&limit=500&sortBy=views&sortType=asc&query=cats")).unwrap();
        assert_eq!(q.page, 3);
        assert_eq!(q.limit, MAX_PAGE_SIZE);
        assert_eq!(q.sort, VideoSort::Views);
        assert!(!q.descending);
        assert_eq!(q.search.as_deref(), Some("cats"));

        let q = video_query(&request("")).unwrap();
        assert_eq!((q.page, q.limit), (1, 10));
        assert!(q.descending);
    }

    #[test]
    fn test_video_query_rejects_bad_params() {
        for bad in ["sortBy=password", "sortType=sideways", "page=-1", "userId=abc"] {
            assert!(
                matches!(video_query(&request(bad)), Err(AppError::InvalidArgument(_))),
                "{} should be rejected",
                bad
            );
        }
    }
}
