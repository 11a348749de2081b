//! VideoTube server binary

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use videotube::{
    auth::JwtValidator,
    config::Args,
    db::{MemoryRepository, MongoClient, MongoRepository, Repository},
    media::{CloudinaryStore, LocalMediaStore, MediaStore},
    server::{self, AppState},
    services::Services,
};

/// Lifetime used for tokens signed by the dev validator
const TOKEN_EXPIRY_SECS: u64 = 24 * 60 * 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_tracing(&args);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  VideoTube API v{}", env!("CARGO_PKG_VERSION"));
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Call timeout: {}ms", args.request_timeout_ms);
    info!("======================================");

    let repo = connect_repository(&args).await?;
    let media = build_media_store(&args)?;

    if let Err(e) = tokio::fs::create_dir_all(&args.media.upload_dir).await {
        warn!(
            "Cannot create upload directory {}: {}",
            args.media.upload_dir.display(),
            e
        );
    }

    let jwt = match &args.access_token_secret {
        Some(secret) => JwtValidator::new(secret.clone(), TOKEN_EXPIRY_SECS)?,
        None => {
            warn!("No ACCESS_TOKEN_SECRET set, using the development secret");
            JwtValidator::new_dev()
        }
    };

    let services = Services::new(
        repo,
        media,
        args.request_timeout(),
        args.media.upload_dir.clone(),
    );
    let state = Arc::new(AppState::new(args, services, jwt));

    server::run(state).await?;
    Ok(())
}

fn init_tracing(args: &Args) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("videotube={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);

    if args.log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// MongoDB, or the in-memory repository when dev mode cannot reach it
async fn connect_repository(args: &Args) -> anyhow::Result<Arc<dyn Repository>> {
    let connected = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => MongoRepository::new(&client).await,
        Err(e) => Err(e),
    };

    match connected {
        Ok(repo) => {
            info!("MongoDB repository ready");
            Ok(Arc::new(repo))
        }
        Err(e) if args.dev_mode => {
            warn!("MongoDB unavailable (dev mode, using in-memory repository): {}", e);
            Ok(Arc::new(MemoryRepository::new()))
        }
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            Err(e.into())
        }
    }
}

/// Cloudinary when configured, local disk otherwise (dev mode only)
fn build_media_store(args: &Args) -> anyhow::Result<Arc<dyn MediaStore>> {
    match args.media.cloudinary() {
        Some(credentials) => {
            info!("Media store: Cloudinary ({})", credentials.cloud_name);
            let store = CloudinaryStore::new(
                &args.media.cloudinary_api_url,
                credentials,
                args.request_timeout(),
            )?;
            Ok(Arc::new(store))
        }
        None => {
            info!(
                "Media store: local disk at {}",
                args.media.media_dir.display()
            );
            Ok(Arc::new(LocalMediaStore::new(
                &args.media.media_dir,
                &args.media.public_media_url,
            )))
        }
    }
}
