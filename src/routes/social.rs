//! Comment, like and playlist endpoints
//!
//! - `POST  /comments/{videoId}`
//! - `POST  /likes/toggle/v/{videoId}`
//! - `POST  /likes/toggle/c/{commentId}`
//! - `POST  /playlists`
//! - `PATCH /playlists/{playlistId}/videos/{videoId}`

use hyper::{Method, Response, StatusCode};
use serde_json::json;

use super::{ok_response, require_user, route_not_found, user_id, ApiRequest, FullBody};
use crate::server::AppState;
use crate::services::{NewComment, NewPlaylist};
use crate::types::Result;

pub async fn handle_comments(
    state: &AppState,
    req: &ApiRequest,
    segments: &[&str],
) -> Result<Response<FullBody>> {
    match (&req.method, segments) {
        (&Method::POST, [video_id]) => {
            let user = require_user(state, req).await?;
            let request: NewComment = req.json()?;
            let comment = state
                .services
                .add_comment(video_id, user_id(&user)?, request)
                .await?;
            ok_response(StatusCode::CREATED, &comment, "Comment added successfully")
        }
        _ => Err(route_not_found(req)),
    }
}

pub async fn handle_likes(
    state: &AppState,
    req: &ApiRequest,
    segments: &[&str],
) -> Result<Response<FullBody>> {
    let is_liked = match (&req.method, segments) {
        (&Method::POST, ["toggle", "v", video_id]) => {
            let user = require_user(state, req).await?;
            state
                .services
                .toggle_video_like(video_id, user_id(&user)?)
                .await?
        }
        (&Method::POST, ["toggle", "c", comment_id]) => {
            let user = require_user(state, req).await?;
            state
                .services
                .toggle_comment_like(comment_id, user_id(&user)?)
                .await?
        }
        _ => return Err(route_not_found(req)),
    };

    ok_response(
        StatusCode::OK,
        &json!({ "isLiked": is_liked }),
        "Like toggled successfully",
    )
}

pub async fn handle_playlists(
    state: &AppState,
    req: &ApiRequest,
    segments: &[&str],
) -> Result<Response<FullBody>> {
    match (&req.method, segments) {
        (&Method::POST, []) => {
            let user = require_user(state, req).await?;
            let request: NewPlaylist = req.json()?;
            let playlist = state
                .services
                .create_playlist(user_id(&user)?, request)
                .await?;
            ok_response(StatusCode::CREATED, &playlist, "Playlist created successfully")
        }
        (&Method::PATCH, [playlist_id, "videos", video_id]) => {
            let user = require_user(state, req).await?;
            let playlist = state
                .services
                .add_video_to_playlist(playlist_id, video_id, user_id(&user)?)
                .await?;
            ok_response(StatusCode::OK, &playlist, "Video added to playlist")
        }
        _ => Err(route_not_found(req)),
    }
}
