//! Pulse Feed Engine library crate
//!
//! Re-exports core modules for integration tests and external use.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod kafka;
pub mod ranking;

// Re-export commonly used types
pub use config::Config;
pub use database::Database;
pub use error::Result;
pub use kafka::KafkaProducer;
pub use ranking::{FeedCategory, InteractionKind, Post, RankingEngine, ScoredPost};
