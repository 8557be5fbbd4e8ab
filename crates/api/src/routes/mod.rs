pub mod courses;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Every route requires a Bearer token.
///
/// ```text
/// /courses                                                 create (POST)
/// /courses/{course_id}                                     course + live tree
/// /courses/{course_id}/items/{item_id}/content             item body on trunk
///
/// /courses/{course_id}/revisions                           list, submit
/// /courses/{course_id}/revisions/{revision_id}             get
/// /courses/{course_id}/revisions/{revision_id}/approve     approve (POST)
/// /courses/{course_id}/revisions/{revision_id}/close       close (POST)
/// /courses/{course_id}/revisions/{revision_id}/lock        lock (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/courses", courses::router())
}
