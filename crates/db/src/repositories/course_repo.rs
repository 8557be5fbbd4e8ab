//! Repository for the `courses` table.

use courseforge_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::course::{Course, CreateCourse};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, description, creator_id, created_at, updated_at";

/// Provides access to course rows.
pub struct CourseRepo;

impl CourseRepo {
    /// Insert a new course, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateCourse) -> Result<Course, sqlx::Error> {
        let query = format!(
            "INSERT INTO courses (id, name, description, creator_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Course>(&query)
            .bind(input.id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.creator_id)
            .fetch_one(pool)
            .await
    }

    /// Find a course by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Course>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM courses WHERE id = $1");
        sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lock a course row until the surrounding transaction ends.
    ///
    /// Tree writes take this lock first, so they run one at a time per
    /// course. `NO KEY UPDATE` leaves inserts of child rows unblocked.
    /// Returns `false` when the course does not exist.
    pub async fn lock_for_tree_update(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let row: Option<(DbId,)> =
            sqlx::query_as("SELECT id FROM courses WHERE id = $1 FOR NO KEY UPDATE")
                .bind(id)
                .fetch_optional(conn)
                .await?;
        Ok(row.is_some())
    }
}
