//! Handlers for revisions nested under `/courses/{course_id}/revisions`.
//!
//! Everything that touches the content store goes through the engine;
//! listing and reads hit the database directly.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use courseforge_core::error::CoreError;
use courseforge_core::tree::DraftTree;
use courseforge_core::types::DbId;
use courseforge_db::repositories::RevisionRepo;

use crate::error::{AppError, AppResult};
use crate::handlers::courses::ensure_course_exists;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /api/v1/courses/{course_id}/revisions
///
/// Newest first.
pub async fn list(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    ensure_course_exists(&state, course_id).await?;
    let revisions = RevisionRepo::list_by_course(&state.pool, course_id).await?;

    Ok(Json(DataResponse { data: revisions }))
}

/// GET /api/v1/courses/{course_id}/revisions/{revision_id}
pub async fn get_by_id(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path((course_id, revision_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let revision = RevisionRepo::find_by_id(&state.pool, course_id, revision_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Revision",
            id: revision_id,
        }))?;

    Ok(Json(DataResponse { data: revision }))
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// POST /api/v1/courses/{course_id}/revisions
pub async fn submit(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<DbId>,
    Json(draft): Json<DraftTree>,
) -> AppResult<impl IntoResponse> {
    let revision = state.engine.submit(course_id, &auth, draft).await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: revision })))
}

/// POST /api/v1/courses/{course_id}/revisions/{revision_id}/approve
///
/// Returns the tree as it was applied.
pub async fn approve(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((course_id, revision_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let tree = state.engine.approve(course_id, revision_id, &auth).await?;

    Ok(Json(DataResponse { data: tree }))
}

/// POST /api/v1/courses/{course_id}/revisions/{revision_id}/close
pub async fn close(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((course_id, revision_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let revision = state.engine.close(course_id, revision_id, &auth).await?;

    Ok(Json(DataResponse { data: revision }))
}

/// POST /api/v1/courses/{course_id}/revisions/{revision_id}/lock
pub async fn lock(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((course_id, revision_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let revision = state.engine.lock(course_id, revision_id, &auth).await?;

    Ok(Json(DataResponse { data: revision }))
}
