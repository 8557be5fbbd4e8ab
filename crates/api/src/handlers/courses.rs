//! Handlers for the `/courses` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use courseforge_core::error::CoreError;
use courseforge_core::tree::DraftContainer;
use courseforge_core::types::DbId;
use courseforge_db::models::course::Course;
use courseforge_db::repositories::{CourseRepo, CourseTreeRepo};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /courses`.
#[derive(Debug, Deserialize)]
pub struct CreateCourseRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A course together with its live tree.
#[derive(Debug, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub containers: Vec<DraftContainer>,
}

/// Body of a single item.
#[derive(Debug, Serialize)]
pub struct ItemContent {
    pub id: String,
    pub content: String,
}

/// Look up a course or fail with 404.
pub(crate) async fn ensure_course_exists(state: &AppState, course_id: DbId) -> AppResult<Course> {
    CourseRepo::find_by_id(&state.pool, course_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Course",
            id: course_id,
        }))
}

/// POST /api/v1/courses
pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateCourseRequest>,
) -> AppResult<impl IntoResponse> {
    let course = state
        .engine
        .create_course(auth.user_id, input.name, input.description)
        .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: course })))
}

/// GET /api/v1/courses/{course_id}
///
/// The course row plus its active containers and items, ordered by position.
pub async fn get_by_id(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(course_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let course = ensure_course_exists(&state, course_id).await?;
    let mut conn = state.pool.acquire().await?;
    let baseline = CourseTreeRepo::load_baseline(&mut conn, course_id).await?;

    Ok(Json(DataResponse {
        data: CourseDetail {
            course,
            containers: baseline.to_draft("").containers,
        },
    }))
}

/// GET /api/v1/courses/{course_id}/items/{item_id}/content
pub async fn get_item_content(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path((course_id, item_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let content = state.engine.item_content(course_id, item_id).await?;

    Ok(Json(DataResponse {
        data: ItemContent {
            id: item_id.to_string(),
            content,
        },
    }))
}
