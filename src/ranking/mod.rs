//! Feed Ranking Module
//!
//! Produces the ordered, diversified feed for Pulse users.
//!
//! ## Architecture
//!
//! 1. **History** - Bounded window of the user's recent interactions
//!    (reactions, comments, profile views), fetched concurrently and shaped
//!    into per-author and per-type aggregates
//! 2. **Engine** - Score candidates, sort, diversify, and re-order for
//!    perceived variety; falls back to chronological order on any failure
//! 3. **Trending** - Live 6-hour reaction velocity, batched per pass
//! 4. **Updater** - Background warming of cached feeds for active users
//!
//! ## Scoring Overview
//!
//! Each candidate's 0-100 score is a weighted sum of five factors:
//! - Engagement (30%): reactions and comments with linear time decay
//! - Personal relevance (35%): affinity for the author and post type
//! - Recency (20%): step function on post age
//! - Author diversity (10%): reward authors the user hasn't seen lately
//! - Trending (5%): reaction velocity in the last 6 hours

pub mod engine;
pub mod history;
pub mod metrics;
pub mod trending;
pub mod updater;

// Re-export the types that are actually used externally
pub use engine::{FeedCategory, Post, RankingEngine, ScoredPost};
pub use history::{InteractionKind, NewInteraction};
