//! Persistence layer
//!
//! MongoDB is the production backend; the in-memory repository backs tests
//! and dev mode without a database.

pub mod memory;
pub mod mongo;
pub mod mongo_repository;
pub mod repository;
pub mod schemas;

pub use memory::MemoryRepository;
pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata};
pub use mongo_repository::MongoRepository;
pub use repository::{
    CascadeRepository, ChannelProfile, ProfileChanges, Repository, UserImage, UserSummary,
    VideoChanges, VideoPage, VideoQuery, VideoSort, VideoWithOwner,
};
