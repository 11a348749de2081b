//! Subscription endpoints
//!
//! - `POST /subscriptions/c/{channelId}` toggle
//! - `GET  /subscriptions/c/{channelId}` subscribers of a channel
//! - `GET  /subscriptions/u/{subscriberId}` channels a user follows

use hyper::{Method, Response, StatusCode};
use serde_json::json;

use super::{ok_response, require_user, route_not_found, user_id, ApiRequest, FullBody};
use crate::server::AppState;
use crate::types::Result;

pub async fn handle(
    state: &AppState,
    req: &ApiRequest,
    segments: &[&str],
) -> Result<Response<FullBody>> {
    match (&req.method, segments) {
        (&Method::POST, ["c", channel_id]) => {
            let user = require_user(state, req).await?;
            let subscribed = state
                .services
                .toggle_subscription(channel_id, user_id(&user)?)
                .await?;
            let message = if subscribed {
                "Subscribed successfully"
            } else {
                "Unsubscribed successfully"
            };
            ok_response(StatusCode::OK, &json!({ "subscribed": subscribed }), message)
        }
        (&Method::GET, ["c", channel_id]) => {
            let subscribers = state.services.channel_subscribers(channel_id).await?;
            ok_response(StatusCode::OK, &subscribers, "Subscribers fetched successfully")
        }
        (&Method::GET, ["u", subscriber_id]) => {
            let channels = state.services.subscribed_channels(subscriber_id).await?;
            ok_response(
                StatusCode::OK,
                &channels,
                "Subscribed channels fetched successfully",
            )
        }
        _ => Err(route_not_found(req)),
    }
}
