use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::CourseEngine;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: courseforge_db::DbPool,
    /// Server configuration (read by the auth extractor).
    pub config: Arc<ServerConfig>,
    /// Revision engine over the pool, the content store and the id allocator.
    pub engine: CourseEngine,
}
