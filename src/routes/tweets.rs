//! Tweet endpoints
//!
//! - `POST   /tweets`
//! - `GET    /tweets/user/{userId}`
//! - `DELETE /tweets/{tweetId}`

use hyper::{Method, Response, StatusCode};
use serde_json::json;

use super::{ok_response, require_user, route_not_found, user_id, ApiRequest, FullBody};
use crate::server::AppState;
use crate::services::NewTweet;
use crate::types::Result;

pub async fn handle(
    state: &AppState,
    req: &ApiRequest,
    segments: &[&str],
) -> Result<Response<FullBody>> {
    match (&req.method, segments) {
        (&Method::POST, []) => {
            let user = require_user(state, req).await?;
            let request: NewTweet = req.json()?;
            let tweet = state.services.create_tweet(user_id(&user)?, request).await?;
            ok_response(StatusCode::CREATED, &tweet, "Tweet created successfully")
        }
        (&Method::GET, ["user", owner_id]) => {
            let tweets = state.services.user_tweets(owner_id).await?;
            ok_response(StatusCode::OK, &tweets, "Tweets fetched successfully")
        }
        (&Method::DELETE, [tweet_id]) => {
            let user = require_user(state, req).await?;
            state
                .services
                .delete_tweet(tweet_id, user_id(&user)?)
                .await?;
            ok_response(StatusCode::OK, &json!({}), "Tweet deleted successfully")
        }
        _ => Err(route_not_found(req)),
    }
}
