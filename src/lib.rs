//! VideoTube - video sharing backend
//!
//! A JSON API over MongoDB and a hosted media store (Cloudinary) for
//! videos, comments, likes, playlists, subscriptions and tweets.
//!
//! ## Layout
//!
//! - `db`: document schemas, the repository contract and its MongoDB and
//!   in-memory implementations
//! - `media`: media store adapter (Cloudinary, local disk)
//! - `services`: domain operations, including the cascading video deletion
//! - `routes` / `server`: hyper HTTP surface

pub mod auth;
pub mod config;
pub mod db;
pub mod media;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{AppError, Result};
