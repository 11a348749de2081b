//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo, one task per connection. Request bodies
//! are read up front under `MAX_BODY_BYTES` and handed to the API router as
//! an [`ApiRequest`]; form posts have their files staged to disk first (see
//! [`super::multipart`]).

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Body;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::db::Repository;
use crate::media::MediaStore;
use crate::routes::{self, error_response, json_response, ApiRequest, FullBody, API_PREFIX};
use crate::services::Services;

use super::multipart;
use crate::types::{AppError, Result};

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub services: Services,
    pub jwt: JwtValidator,
}

impl AppState {
    pub fn new(args: Args, services: Services, jwt: JwtValidator) -> Self {
        Self {
            args,
            services,
            jwt,
        }
    }
}

/// Accept connections until the listener fails
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "VideoTube listening on {} (database: {}, media: {})",
        state.args.listen,
        state.services.repo().backend(),
        state.services.media().name()
    );

    if state.args.dev_mode {
        info!("Development mode enabled");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request<B>(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<B>,
) -> std::result::Result<Response<FullBody>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = dispatch(&state, req).await;

    info!(
        "[{}] {} {} -> {} ({}ms)",
        addr,
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    Ok(response)
}

/// Route one request and decorate the response with CORS headers
pub async fn dispatch<B>(state: &AppState, req: Request<B>) -> Response<FullBody>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut response = match (&method, path.as_str()) {
        (&Method::OPTIONS, _) => preflight_response(),
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => routes::health_check(state),
        (&Method::GET, "/ready") | (&Method::GET, "/readyz") => {
            routes::readiness_check(state).await
        }
        (_, p) if p == API_PREFIX || p.starts_with("/api/v1/") => match read_request(state, req).await {
            Ok(api_req) => {
                let staged = api_req.staged.clone();
                let response = routes::handle_api_request(state, api_req).await;
                multipart::remove_staged(&staged).await;
                response
            }
            Err(e) => error_response(&e),
        },
        _ => not_found_response(&path),
    };

    apply_cors(&mut response, &state.args.cors_origin);
    response
}

/// Collect the body under a size limit, or stage its files for form posts
async fn read_request<B>(state: &AppState, req: Request<B>) -> Result<ApiRequest>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let (parts, body) = req.into_parts();

    if let Some(boundary) = multipart::form_boundary(&parts.headers) {
        return multipart::read_form(
            parts,
            body,
            boundary,
            state.services.upload_dir(),
            state.args.max_upload_bytes,
        )
        .await;
    }

    let body = Limited::new(body, state.args.max_body_bytes)
        .collect()
        .await
        .map_err(|e| AppError::InvalidArgument(format!("Unreadable request body: {}", e)))?
        .to_bytes();

    Ok(ApiRequest::new(
        parts.method,
        parts.uri.path(),
        parts.uri.query(),
        parts.headers,
        body,
    ))
}

fn apply_cors(response: &mut Response<FullBody>, origin: &str) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    // Cookies may carry the access token; browsers refuse credentials with "*"
    if origin != "*" {
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
}

/// CORS preflight response
fn preflight_response() -> Response<FullBody> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Authorization, Content-Type"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PATCH, DELETE, OPTIONS"),
    );
    response
}

/// Not found response
fn not_found_response(path: &str) -> Response<FullBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({
            "statusCode": 404,
            "message": format!("Cannot resolve {}", path),
            "success": false,
            "code": "NOT_FOUND",
            "retryable": false,
        }),
    )
}
