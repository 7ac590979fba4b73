//! API Module
//!
//! HTTP handlers and routing for the cache admin REST API.
//!
//! # Endpoints
//! - `PUT /set` - Store a value under a namespaced key
//! - `GET /get/:key` - Retrieve a valid value by key
//! - `DELETE /del/:key` - Remove a key
//! - `DELETE /clear` - Remove every entry
//! - `GET /debug/:key` - Diagnostics report for a key
//! - `GET /stats` - Get cache statistics
//! - `POST /state/bump` - Advance the external state version
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
