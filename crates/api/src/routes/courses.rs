//! Route definitions for the `/courses` resource.
//!
//! Revisions are nested under `/courses/{course_id}/revisions`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{courses, revisions};
use crate::state::AppState;

/// Routes mounted at `/courses`.
///
/// ```text
/// POST   /                                               -> create
/// GET    /{course_id}                                    -> get_by_id
/// GET    /{course_id}/items/{item_id}/content            -> get_item_content
///
/// GET    /{course_id}/revisions                          -> list
/// POST   /{course_id}/revisions                          -> submit
/// GET    /{course_id}/revisions/{revision_id}            -> get_by_id
/// POST   /{course_id}/revisions/{revision_id}/approve    -> approve
/// POST   /{course_id}/revisions/{revision_id}/close      -> close
/// POST   /{course_id}/revisions/{revision_id}/lock       -> lock
/// ```
pub fn router() -> Router<AppState> {
    let revision_routes = Router::new()
        .route("/", get(revisions::list).post(revisions::submit))
        .route("/{revision_id}", get(revisions::get_by_id))
        .route("/{revision_id}/approve", post(revisions::approve))
        .route("/{revision_id}/close", post(revisions::close))
        .route("/{revision_id}/lock", post(revisions::lock));

    Router::new()
        .route("/", post(courses::create))
        .route("/{course_id}", get(courses::get_by_id))
        .route(
            "/{course_id}/items/{item_id}/content",
            get(courses::get_item_content),
        )
        .nest("/{course_id}/revisions", revision_routes)
}
