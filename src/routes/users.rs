//! User endpoints
//!
//! - `GET /users/current`
//! - `PATCH /users/update-profile` `{fullName?, email?}`
//! - `PATCH /users/upload-avatar` form field `avatar`
//! - `PATCH /users/upload-cover-image` form field `coverImage`
//! - `GET /users/channel/{userName}`
//! - `GET /users/watch-history`

use hyper::{Method, Response, StatusCode};
use serde_json::Value;

use super::{api_json, ok_response, require_user, route_not_found, user_id, ApiRequest, FullBody};
use crate::db::UserImage;
use crate::server::AppState;
use crate::services::ProfileUpdate;
use crate::types::{AppError, Result};

pub async fn handle(
    state: &AppState,
    req: &ApiRequest,
    segments: &[&str],
) -> Result<Response<FullBody>> {
    match (&req.method, segments) {
        (&Method::GET, ["current"]) => {
            let user = require_user(state, req).await?;
            ok_response(StatusCode::OK, &user, "Current user fetched successfully")
        }
        (&Method::PATCH, ["update-profile"]) => {
            let user = require_user(state, req).await?;
            let update: ProfileUpdate = req.json()?;
            let updated = state
                .services
                .update_profile(user_id(&user)?, update)
                .await?;
            ok_response(StatusCode::OK, &updated, "Profile updated successfully")
        }
        (&Method::PATCH, ["upload-avatar"]) => {
            replace_image(state, req, UserImage::Avatar, "Avatar updated successfully").await
        }
        (&Method::PATCH, ["upload-cover-image"]) => {
            replace_image(state, req, UserImage::CoverImage, "Cover image updated successfully")
                .await
        }
        (&Method::GET, ["channel", user_name]) => {
            let user = require_user(state, req).await?;
            let profile = state
                .services
                .channel_profile(user_name, user_id(&user)?)
                .await?;
            ok_response(StatusCode::OK, &profile, "Channel fetched successfully")
        }
        (&Method::GET, ["watch-history"]) => watch_history(state, req).await,
        _ => Err(route_not_found(req)),
    }
}

async fn replace_image(
    state: &AppState,
    req: &ApiRequest,
    image: UserImage,
    message: &str,
) -> Result<Response<FullBody>> {
    let user = require_user(state, req).await?;
    let fields: Value = req.json()?;
    let staged = fields
        .get(image.field())
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::InvalidArgument(format!("{} file is missing", image.field())))?;

    let updated = state
        .services
        .update_user_image(user_id(&user)?, image, staged)
        .await?;
    ok_response(StatusCode::OK, &updated, message)
}

async fn watch_history(state: &AppState, req: &ApiRequest) -> Result<Response<FullBody>> {
    let user = require_user(state, req).await?;
    let history = state.services.watch_history(user_id(&user)?).await?;

    // Each entry carries the owner's public profile in place of the owner id
    let entries = history
        .iter()
        .map(|entry| {
            let mut video = api_json(&entry.video)?;
            video["owner"] = api_json(&entry.owner)?;
            Ok(video)
        })
        .collect::<Result<Vec<Value>>>()?;

    ok_response(StatusCode::OK, &entries, "Watch history fetched successfully")
}
