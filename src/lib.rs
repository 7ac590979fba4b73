//! Tiered Cache - a strategy-driven cache over two storage tiers
//!
//! Small entries live together in one compact container, large entries
//! each get their own blob. Every entry carries a validity strategy
//! (time, external state version, params, or permanent) that is checked
//! on read.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use api::AppState;
pub use cache::CacheEngine;
pub use config::Config;
