//! API Handlers
//!
//! HTTP request handlers for each admin endpoint. Every handler goes
//! through the cache engine's get/set/remove/clear/debug contract.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use crate::cache::{CacheEngine, DiagnosticsReport, VersionCounter};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, GetResponse, HealthResponse, RemoveResponse, SetRequest, SetResponse,
    StateResponse, StatsResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache engine (internally synchronized, cheap to clone)
    pub cache: CacheEngine,
    /// External state version the engine validates state-based entries against
    pub state: Arc<VersionCounter>,
    /// TTL applied when a set request omits one
    pub default_ttl_ms: u64,
}

impl AppState {
    /// Creates a new AppState around an engine and its oracle.
    pub fn new(cache: CacheEngine, state: Arc<VersionCounter>, default_ttl_ms: u64) -> Self {
        Self {
            cache,
            state,
            default_ttl_ms,
        }
    }

    /// Opens file-backed storage as described by the Config.
    ///
    /// Fails once, here, if the storage location is unusable.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let state = Arc::new(VersionCounter::default());
        let cache = CacheEngine::open(config, state.clone()).await?;
        Ok(Self::new(cache, state, config.default_ttl_ms))
    }
}

/// Handler for PUT /set
///
/// Stores a JSON value under a namespaced key with a validity strategy.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let ttl = req.ttl.unwrap_or(state.default_ttl_ms);
    let tier = state
        .cache
        .set(&req.key, &req.value, req.strategy, ttl, req.params)
        .await;

    Ok(Json(SetResponse::new(req.key, tier)))
}

/// Handler for GET /get/:key
///
/// Returns the value if present and valid, 404 otherwise.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    match state.cache.get::<Value>(&key).await {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for DELETE /del/:key
///
/// Always succeeds, whether or not the key was cached.
pub async fn remove_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<RemoveResponse> {
    state.cache.remove(&key).await;
    Json(RemoveResponse::new(key))
}

/// Handler for DELETE /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.cache.clear().await;
    Json(ClearResponse::new())
}

/// Handler for GET /debug/:key
///
/// Describes the entry without evicting it.
pub async fn debug_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DiagnosticsReport> {
    Json(state.cache.debug(&key).await)
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.cache.stats().await.into())
}

/// Handler for POST /state/bump
///
/// Advances the external state version, invalidating state-based entries.
pub async fn bump_state_handler(State(state): State<AppState>) -> Json<StateResponse> {
    let version = state.state.bump();
    tracing::info!("State version bumped to {}", version);
    Json(StateResponse { version })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
