//! Course, container and item rows.

use courseforge_core::tree::{BaselineContainer, BaselineItem, BaselineTree};
use courseforge_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `courses` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Course {
    #[serde(with = "id_string")]
    pub id: DbId,
    pub name: String,
    pub description: String,
    #[serde(with = "id_string")]
    pub creator_id: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Values for inserting a course. The id comes from the allocator.
#[derive(Debug, Clone)]
pub struct CreateCourse {
    pub id: DbId,
    pub name: String,
    pub description: String,
    pub creator_id: DbId,
}

/// A row from `course_containers`.
#[derive(Debug, Clone, FromRow)]
pub struct ContainerRow {
    pub id: DbId,
    pub course_id: DbId,
    pub position: i32,
    pub name: String,
    pub active: bool,
}

/// A row from `course_items`.
#[derive(Debug, Clone, FromRow)]
pub struct ItemRow {
    pub id: DbId,
    pub container_id: DbId,
    pub position: i32,
    pub item_type: i16,
    pub name: String,
    pub active: bool,
}

/// Assemble the live tree from rows already ordered by position.
///
/// Items whose container is not among `containers` are dropped.
pub fn build_baseline(containers: Vec<ContainerRow>, items: Vec<ItemRow>) -> BaselineTree {
    let mut tree = BaselineTree {
        containers: containers
            .into_iter()
            .map(|c| BaselineContainer {
                id: c.id,
                position: c.position,
                name: c.name,
                items: Vec::new(),
            })
            .collect(),
    };

    for item in items {
        if let Some(container) = tree
            .containers
            .iter_mut()
            .find(|c| c.id == item.container_id)
        {
            container.items.push(BaselineItem {
                id: item.id,
                position: item.position,
                item_type: item.item_type,
                name: item.name,
            });
        }
    }
    tree
}

/// Serialize ids as decimal strings for JavaScript clients.
pub(crate) mod id_string {
    use serde::Serializer;

    use courseforge_core::types::DbId;

    pub fn serialize<S: Serializer>(id: &DbId, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&id.to_string())
    }
}

/// [`id_string`] for nullable ids.
pub(crate) mod optional_id_string {
    use serde::Serializer;

    use courseforge_core::types::DbId;

    pub fn serialize<S: Serializer>(id: &Option<DbId>, serializer: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => serializer.serialize_some(&id.to_string()),
            None => serializer.serialize_none(),
        }
    }
}
