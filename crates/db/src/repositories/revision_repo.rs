//! Repository for the `course_revisions` table.
//!
//! Status changes are conditional updates (`WHERE status_id = open`) so two
//! concurrent requests can never both move the same revision.

use courseforge_core::reconcile::StructuralChanges;
use courseforge_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::revision::{CreateRevision, Revision};
use crate::models::status::RevisionStatus;
use crate::repositories::CourseTreeRepo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, course_id, branch_id, pull_request_id, description, status_id, \
                       editor_id, approver_id, created_at, updated_at";

/// Provides revision persistence and lifecycle transitions.
pub struct RevisionRepo;

impl RevisionRepo {
    /// Insert a new revision in the `Open` state.
    pub async fn create(pool: &PgPool, input: &CreateRevision) -> Result<Revision, sqlx::Error> {
        let query = format!(
            "INSERT INTO course_revisions
                (id, course_id, branch_id, pull_request_id, description, status_id, editor_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Revision>(&query)
            .bind(input.id)
            .bind(input.course_id)
            .bind(input.branch_id)
            .bind(input.pull_request_id)
            .bind(&input.description)
            .bind(RevisionStatus::Open.id())
            .bind(input.editor_id)
            .fetch_one(pool)
            .await
    }

    /// Find a revision of a course.
    pub async fn find_by_id(
        pool: &PgPool,
        course_id: DbId,
        id: DbId,
    ) -> Result<Option<Revision>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM course_revisions WHERE id = $1 AND course_id = $2");
        sqlx::query_as::<_, Revision>(&query)
            .bind(id)
            .bind(course_id)
            .fetch_optional(pool)
            .await
    }

    /// List revisions of a course, newest first.
    pub async fn list_by_course(
        pool: &PgPool,
        course_id: DbId,
    ) -> Result<Vec<Revision>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM course_revisions
             WHERE course_id = $1
             ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Revision>(&query)
            .bind(course_id)
            .fetch_all(pool)
            .await
    }

    /// Move an open revision to `target` (closed or locked).
    ///
    /// Returns `None` when the revision does not exist or is no longer open.
    pub async fn transition(
        pool: &PgPool,
        course_id: DbId,
        id: DbId,
        target: RevisionStatus,
    ) -> Result<Option<Revision>, sqlx::Error> {
        let query = format!(
            "UPDATE course_revisions SET status_id = $3
             WHERE id = $1 AND course_id = $2 AND status_id = $4
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Revision>(&query)
            .bind(id)
            .bind(course_id)
            .bind(target.id())
            .bind(RevisionStatus::Open.id())
            .fetch_optional(pool)
            .await
    }

    /// Mark an open revision merged and apply its structural changes on an
    /// open transaction. The caller commits.
    ///
    /// The status update runs first and locks the row, so a concurrent
    /// merge of the same revision waits and then finds it no longer open.
    /// Returns `None` (with nothing written) when the revision is not open.
    pub async fn merge(
        conn: &mut PgConnection,
        course_id: DbId,
        id: DbId,
        approver_id: DbId,
        changes: &StructuralChanges,
    ) -> Result<Option<Revision>, sqlx::Error> {
        let query = format!(
            "UPDATE course_revisions SET status_id = $3, approver_id = $4
             WHERE id = $1 AND course_id = $2 AND status_id = $5
             RETURNING {COLUMNS}"
        );
        let merged = sqlx::query_as::<_, Revision>(&query)
            .bind(id)
            .bind(course_id)
            .bind(RevisionStatus::Merged.id())
            .bind(approver_id)
            .bind(RevisionStatus::Open.id())
            .fetch_optional(&mut *conn)
            .await?;

        let Some(revision) = merged else {
            return Ok(None);
        };

        CourseTreeRepo::apply_changes(conn, changes).await?;
        Ok(Some(revision))
    }
}
