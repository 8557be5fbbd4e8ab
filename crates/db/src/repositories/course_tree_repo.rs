//! Repository for `course_containers` and `course_items`: the live tree and
//! the structural writes produced by reconciliation.
//!
//! The live tree is the `active = true` projection. Deletes only clear the
//! flag; rows are never removed.

use std::collections::HashSet;

use courseforge_core::reconcile::StructuralChanges;
use courseforge_core::tree::BaselineTree;
use courseforge_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::course::{build_baseline, ContainerRow, ItemRow};

const CONTAINER_COLUMNS: &str = "id, course_id, position, name, active";
const ITEM_COLUMNS: &str = "i.id, i.container_id, i.position, i.item_type, i.name, i.active";

/// Provides access to the course tree.
pub struct CourseTreeRepo;

impl CourseTreeRepo {
    /// Active containers of a course ordered by position.
    pub async fn list_active_containers(
        conn: &mut PgConnection,
        course_id: DbId,
    ) -> Result<Vec<ContainerRow>, sqlx::Error> {
        let query = format!(
            "SELECT {CONTAINER_COLUMNS} FROM course_containers
             WHERE course_id = $1 AND active = true
             ORDER BY position, id"
        );
        sqlx::query_as::<_, ContainerRow>(&query)
            .bind(course_id)
            .fetch_all(&mut *conn)
            .await
    }

    /// Active items under active containers of a course, ordered by
    /// container position then item position.
    pub async fn list_active_items(
        conn: &mut PgConnection,
        course_id: DbId,
    ) -> Result<Vec<ItemRow>, sqlx::Error> {
        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM course_items i
             JOIN course_containers c ON c.id = i.container_id
             WHERE c.course_id = $1 AND c.active = true AND i.active = true
             ORDER BY c.position, i.position, i.id"
        );
        sqlx::query_as::<_, ItemRow>(&query)
            .bind(course_id)
            .fetch_all(&mut *conn)
            .await
    }

    /// Load the live tree of a course.
    ///
    /// Takes a connection so approval can read the tree inside the
    /// transaction that writes it.
    pub async fn load_baseline(
        conn: &mut PgConnection,
        course_id: DbId,
    ) -> Result<BaselineTree, sqlx::Error> {
        let containers = Self::list_active_containers(conn, course_id).await?;
        let items = Self::list_active_items(conn, course_id).await?;
        Ok(build_baseline(containers, items))
    }

    /// Whether `item_id` is a live item of `course_id`.
    pub async fn is_live_item(
        pool: &PgPool,
        course_id: DbId,
        item_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (
                SELECT 1 FROM course_items i
                JOIN course_containers c ON c.id = i.container_id
                WHERE i.id = $1 AND c.course_id = $2 AND i.active = true AND c.active = true
            )",
        )
        .bind(item_id)
        .bind(course_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Which of `ids` are already used by any container or item row,
    /// active or not, in any course.
    pub async fn find_existing_ids(
        conn: &mut PgConnection,
        ids: &[DbId],
    ) -> Result<HashSet<DbId>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT id FROM course_containers WHERE id = ANY($1)
             UNION
             SELECT id FROM course_items WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Apply structural changes on an open transaction.
    ///
    /// Order: soft deletes, container updates, container inserts, item
    /// updates, item inserts. Items may move into containers created by the
    /// same change set, so containers always go first.
    pub async fn apply_changes(
        conn: &mut PgConnection,
        changes: &StructuralChanges,
    ) -> Result<(), sqlx::Error> {
        if !changes.delete_items.is_empty() {
            sqlx::query("UPDATE course_items SET active = false WHERE id = ANY($1)")
                .bind(&changes.delete_items)
                .execute(&mut *conn)
                .await?;
        }
        if !changes.delete_containers.is_empty() {
            sqlx::query("UPDATE course_containers SET active = false WHERE id = ANY($1)")
                .bind(&changes.delete_containers)
                .execute(&mut *conn)
                .await?;
        }

        if !changes.update_containers.is_empty() {
            let ids: Vec<DbId> = changes.update_containers.iter().map(|c| c.id).collect();
            let positions: Vec<i32> = changes.update_containers.iter().map(|c| c.position).collect();
            let names: Vec<String> = changes.update_containers.iter().map(|c| c.name.clone()).collect();
            sqlx::query(
                "UPDATE course_containers AS c
                 SET position = u.position, name = u.name
                 FROM UNNEST($1::bigint[], $2::integer[], $3::text[]) AS u(id, position, name)
                 WHERE c.id = u.id",
            )
            .bind(&ids)
            .bind(&positions)
            .bind(&names)
            .execute(&mut *conn)
            .await?;
        }

        if !changes.create_containers.is_empty() {
            let ids: Vec<DbId> = changes.create_containers.iter().map(|c| c.id).collect();
            let course_ids: Vec<DbId> = changes.create_containers.iter().map(|c| c.course_id).collect();
            let positions: Vec<i32> = changes.create_containers.iter().map(|c| c.position).collect();
            let names: Vec<String> = changes.create_containers.iter().map(|c| c.name.clone()).collect();
            sqlx::query(
                "INSERT INTO course_containers (id, course_id, position, name)
                 SELECT * FROM UNNEST($1::bigint[], $2::bigint[], $3::integer[], $4::text[])",
            )
            .bind(&ids)
            .bind(&course_ids)
            .bind(&positions)
            .bind(&names)
            .execute(&mut *conn)
            .await?;
        }

        if !changes.update_items.is_empty() {
            let ids: Vec<DbId> = changes.update_items.iter().map(|i| i.id).collect();
            let containers: Vec<DbId> = changes.update_items.iter().map(|i| i.container_id).collect();
            let positions: Vec<i32> = changes.update_items.iter().map(|i| i.position).collect();
            let types: Vec<i16> = changes.update_items.iter().map(|i| i.item_type.id()).collect();
            let names: Vec<String> = changes.update_items.iter().map(|i| i.name.clone()).collect();
            sqlx::query(
                "UPDATE course_items AS i
                 SET container_id = u.container_id, position = u.position,
                     item_type = u.item_type, name = u.name
                 FROM UNNEST($1::bigint[], $2::bigint[], $3::integer[], $4::smallint[], $5::text[])
                     AS u(id, container_id, position, item_type, name)
                 WHERE i.id = u.id",
            )
            .bind(&ids)
            .bind(&containers)
            .bind(&positions)
            .bind(&types)
            .bind(&names)
            .execute(&mut *conn)
            .await?;
        }

        if !changes.create_items.is_empty() {
            let ids: Vec<DbId> = changes.create_items.iter().map(|i| i.id).collect();
            let containers: Vec<DbId> = changes.create_items.iter().map(|i| i.container_id).collect();
            let positions: Vec<i32> = changes.create_items.iter().map(|i| i.position).collect();
            let types: Vec<i16> = changes.create_items.iter().map(|i| i.item_type.id()).collect();
            let names: Vec<String> = changes.create_items.iter().map(|i| i.name.clone()).collect();
            sqlx::query(
                "INSERT INTO course_items (id, container_id, position, item_type, name)
                 SELECT * FROM UNNEST($1::bigint[], $2::bigint[], $3::integer[], $4::smallint[], $5::text[])",
            )
            .bind(&ids)
            .bind(&containers)
            .bind(&positions)
            .bind(&types)
            .bind(&names)
            .execute(&mut *conn)
            .await?;
        }

        tracing::debug!(
            created = changes.create_containers.len() + changes.create_items.len(),
            updated = changes.update_containers.len() + changes.update_items.len(),
            deleted = changes.delete_containers.len() + changes.delete_items.len(),
            "Applied structural changes",
        );
        Ok(())
    }
}
