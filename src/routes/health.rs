//! Liveness and readiness endpoints
//!
//! - `/health`, `/healthz` answer 200 whenever the process is serving, and
//!   report which storage and media backends it runs on.
//! - `/ready`, `/readyz` answer 503 until the repository answers a ping.

use hyper::{Response, StatusCode};
use serde::Serialize;

use tracing::warn;

use super::{json_response, FullBody};
use crate::db::Repository;
use crate::media::MediaStore;
use crate::server::AppState;
use crate::services::bounded;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub timestamp: String,
    /// "development" or "production"
    pub mode: &'static str,
    /// Repository backend ("mongodb" or "memory")
    pub database: &'static str,
    pub media_store: &'static str,
    /// Set by the readiness check only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        database: state.services.repo().backend(),
        media_store: state.services.media().name(),
        ready: None,
    }
}

pub fn health_check(state: &AppState) -> Response<FullBody> {
    json_response(StatusCode::OK, &build_health_response(state))
}

/// Ready once the repository responds within the call timeout
pub async fn readiness_check(state: &AppState) -> Response<FullBody> {
    let services = &state.services;
    let ping = bounded(
        "repository ping",
        services.timeout(),
        services.repo().ping(),
    )
    .await;

    let ready = match ping {
        Ok(()) => true,
        Err(e) => {
            warn!("Not ready: {}", e);
            false
        }
    };

    let response = HealthResponse {
        ready: Some(ready),
        ..build_health_response(state)
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &response)
}
