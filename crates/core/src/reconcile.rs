//! Draft-vs-baseline reconciliation for course trees.
//!
//! [`reconcile`] compares a submitted (or stored) [`DraftTree`] with the
//! live [`BaselineTree`] of a course and produces:
//!
//! - the resolved draft, with an id on every node and transient item fields
//!   (`content`, `updated`) stripped,
//! - the content-body changes to send to the content store,
//! - the structural creates / updates / deletes to apply to the database.
//!
//! It performs no I/O. Fresh ids come from the supplied [`IdAllocator`].

use std::collections::{HashMap, HashSet};

use crate::content_type::ContentType;
use crate::error::CoreError;
use crate::ids::IdAllocator;
use crate::tree::{BaselineContainer, BaselineItem, BaselineTree, DraftItem, DraftTree};
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum number of containers in a course draft.
pub const MAX_CONTAINERS: usize = 10;

/// Maximum number of items in a single container.
pub const MAX_ITEMS_PER_CONTAINER: usize = 20;

/// Maximum length of a container name.
pub const MAX_CONTAINER_NAME_LENGTH: usize = 30;

/// Maximum length of an item name.
pub const MAX_ITEM_NAME_LENGTH: usize = 50;

/// Maximum length of an item body.
pub const MAX_CONTENT_LENGTH: usize = 100_000;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which kind of draft is being reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// A client draft. Nodes may lack ids (they are new); any id present must
    /// refer to a live node of the course.
    Submit,
    /// A resolved draft read back from the content store. Every node carries
    /// an id; ids missing from the baseline are structural creates.
    Approve,
}

/// What happens to an item body in the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentChangeKind {
    Create,
    Update,
    Delete,
}

/// A single item-body change, addressed by item id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
    pub item_id: DbId,
    pub kind: ContentChangeKind,
    /// Raw (unencoded) body. `None` for deletes.
    pub body: Option<String>,
}

impl ContentChange {
    /// File path of the body inside the course repository.
    pub fn path(&self) -> String {
        self.item_id.to_string()
    }
}

/// Container row values to insert or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: DbId,
    pub course_id: DbId,
    pub position: i32,
    pub name: String,
}

/// Item row values to insert or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub id: DbId,
    pub container_id: DbId,
    pub position: i32,
    pub item_type: ContentType,
    pub name: String,
}

/// Structural writes for the relational store. Deletes are soft: the rows
/// are marked inactive, never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuralChanges {
    pub create_containers: Vec<ContainerRecord>,
    pub create_items: Vec<ItemRecord>,
    pub update_containers: Vec<ContainerRecord>,
    pub update_items: Vec<ItemRecord>,
    pub delete_containers: Vec<DbId>,
    pub delete_items: Vec<DbId>,
}

impl StructuralChanges {
    pub fn is_empty(&self) -> bool {
        self.create_containers.is_empty()
            && self.create_items.is_empty()
            && self.update_containers.is_empty()
            && self.update_items.is_empty()
            && self.delete_containers.is_empty()
            && self.delete_items.is_empty()
    }

    /// Ids of every container and item this change set inserts.
    pub fn created_ids(&self) -> Vec<DbId> {
        self.create_containers
            .iter()
            .map(|c| c.id)
            .chain(self.create_items.iter().map(|i| i.id))
            .collect()
    }
}

/// Output of [`reconcile`].
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub resolved: DraftTree,
    pub content_changes: Vec<ContentChange>,
    pub structural: StructuralChanges,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Sort containers and items by position, then check positions are exactly
/// `1..=N` at every level and that every field is within limits.
///
/// Sorting is stable, so duplicated positions survive as adjacent entries
/// and are reported by the dense-sequence check.
pub fn validate_draft(draft: &mut DraftTree) -> Result<(), CoreError> {
    if draft.containers.is_empty() {
        return Err(CoreError::Validation(
            "A course must have at least one container".to_string(),
        ));
    }
    if draft.containers.len() > MAX_CONTAINERS {
        return Err(CoreError::Validation(format!(
            "A course can have at most {MAX_CONTAINERS} containers, got {}",
            draft.containers.len()
        )));
    }

    draft.containers.sort_by_key(|c| c.position);
    for container in &mut draft.containers {
        container.items.sort_by_key(|i| i.position);
    }

    for (index, container) in draft.containers.iter().enumerate() {
        let expected = index as i32 + 1;
        if container.position != expected {
            return Err(CoreError::Validation(format!(
                "Invalid container position at index {index}: expected {expected}, got {}",
                container.position
            )));
        }
        validate_name("Container", &container.name, MAX_CONTAINER_NAME_LENGTH, true)?;

        if container.items.len() > MAX_ITEMS_PER_CONTAINER {
            return Err(CoreError::Validation(format!(
                "Container {expected} can have at most {MAX_ITEMS_PER_CONTAINER} items, got {}",
                container.items.len()
            )));
        }

        for (item_index, item) in container.items.iter().enumerate() {
            let expected_item = item_index as i32 + 1;
            if item.position != expected_item {
                return Err(CoreError::Validation(format!(
                    "Invalid item position in container {expected} at index {item_index}: \
                     expected {expected_item}, got {}",
                    item.position
                )));
            }
            ContentType::try_from(item.item_type)?;
            validate_name("Item", &item.name, MAX_ITEM_NAME_LENGTH, false)?;
            if let Some(content) = &item.content {
                if content.chars().count() > MAX_CONTENT_LENGTH {
                    return Err(CoreError::Validation(format!(
                        "Item {expected_item} in container {expected} exceeds \
                         {MAX_CONTENT_LENGTH} characters of content"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_name(kind: &str, name: &str, max: usize, required: bool) -> Result<(), CoreError> {
    if required && name.trim().is_empty() {
        return Err(CoreError::Validation(format!(
            "{kind} name must not be empty"
        )));
    }
    let len = name.chars().count();
    if len > max {
        return Err(CoreError::Validation(format!(
            "{kind} name must not exceed {max} characters, got {len}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Compare `draft` with `baseline` for course `course_id`.
///
/// Fails without side effects on any validation problem: bad positions,
/// unknown content types, duplicate or unknown ids, missing bodies, or a
/// freshly allocated id that collides with one already in the tree.
pub fn reconcile(
    course_id: DbId,
    mut draft: DraftTree,
    baseline: &BaselineTree,
    mode: ReconcileMode,
    ids: &dyn IdAllocator,
) -> Result<Reconciliation, CoreError> {
    validate_draft(&mut draft)?;

    let baseline_containers: HashMap<DbId, &BaselineContainer> =
        baseline.containers.iter().map(|c| (c.id, c)).collect();
    let baseline_items: HashMap<DbId, (DbId, &BaselineItem)> = baseline
        .containers
        .iter()
        .flat_map(|c| c.items.iter().map(move |i| (i.id, (c.id, i))))
        .collect();

    let mut referenced = collect_referenced_ids(&draft, mode, &baseline_containers, &baseline_items)?;

    let mut content_changes = Vec::new();
    let mut structural = StructuralChanges::default();

    // Deletes: every live node the draft no longer references. Items are
    // walked even when their container is also gone so each body gets a
    // file delete.
    for container in &baseline.containers {
        for item in &container.items {
            if !referenced.contains(&item.id) {
                structural.delete_items.push(item.id);
                content_changes.push(ContentChange {
                    item_id: item.id,
                    kind: ContentChangeKind::Delete,
                    body: None,
                });
            }
        }
        if !referenced.contains(&container.id) {
            structural.delete_containers.push(container.id);
        }
    }

    let allocate = |referenced: &mut HashSet<DbId>| -> Result<DbId, CoreError> {
        let id = ids.next_id()?;
        if !referenced.insert(id)
            || baseline_containers.contains_key(&id)
            || baseline_items.contains_key(&id)
        {
            return Err(CoreError::Validation(format!(
                "Allocated id {id} collides with an existing node"
            )));
        }
        Ok(id)
    };

    for container in &mut draft.containers {
        let container_id = match container.id {
            Some(id) => id,
            None => {
                let id = allocate(&mut referenced)?;
                container.id = Some(id);
                id
            }
        };

        let record = ContainerRecord {
            id: container_id,
            course_id,
            position: container.position,
            name: container.name.clone(),
        };
        match baseline_containers.get(&container_id) {
            Some(old) if old.name == record.name && old.position == record.position => {}
            Some(_) => structural.update_containers.push(record),
            None => structural.create_containers.push(record),
        }

        for item in &mut container.items {
            let item_id = match item.id {
                Some(id) => {
                    if item.is_updated() {
                        content_changes.push(ContentChange {
                            item_id: id,
                            kind: ContentChangeKind::Update,
                            body: item.content.take(),
                        });
                    }
                    id
                }
                None => {
                    let id = allocate(&mut referenced)?;
                    item.id = Some(id);
                    content_changes.push(ContentChange {
                        item_id: id,
                        kind: ContentChangeKind::Create,
                        body: item.content.take(),
                    });
                    id
                }
            };
            strip_transient(item);

            let record = ItemRecord {
                id: item_id,
                container_id,
                position: item.position,
                item_type: ContentType::try_from(item.item_type)?,
                name: item.name.clone(),
            };
            match baseline_items.get(&item_id) {
                Some((old_container, old))
                    if *old_container == container_id
                        && old.position == record.position
                        && old.name == record.name
                        && old.item_type == record.item_type.id() => {}
                Some(_) => structural.update_items.push(record),
                None => structural.create_items.push(record),
            }
        }
    }

    Ok(Reconciliation {
        resolved: draft,
        content_changes,
        structural,
    })
}

/// Gather every id the draft carries, rejecting duplicates, ids the mode
/// does not allow, and nodes lacking a body they need.
fn collect_referenced_ids(
    draft: &DraftTree,
    mode: ReconcileMode,
    baseline_containers: &HashMap<DbId, &BaselineContainer>,
    baseline_items: &HashMap<DbId, (DbId, &BaselineItem)>,
) -> Result<HashSet<DbId>, CoreError> {
    let mut referenced = HashSet::new();

    for container in &draft.containers {
        match container.id {
            Some(id) => {
                if !referenced.insert(id) {
                    return Err(CoreError::Validation(format!("Duplicate id {id} in draft")));
                }
                if mode == ReconcileMode::Submit && !baseline_containers.contains_key(&id) {
                    return Err(CoreError::Validation(format!(
                        "Unknown container id {id}"
                    )));
                }
            }
            None if mode == ReconcileMode::Approve => {
                return Err(CoreError::Validation(format!(
                    "Stored draft container at position {} has no id",
                    container.position
                )));
            }
            None => {}
        }

        for item in &container.items {
            match item.id {
                Some(id) => {
                    if !referenced.insert(id) {
                        return Err(CoreError::Validation(format!(
                            "Duplicate id {id} in draft"
                        )));
                    }
                    if mode == ReconcileMode::Submit {
                        if !baseline_items.contains_key(&id) {
                            return Err(CoreError::Validation(format!("Unknown item id {id}")));
                        }
                        if item.is_updated() {
                            require_content(item, container.position)?;
                        }
                    }
                }
                None if mode == ReconcileMode::Approve => {
                    return Err(CoreError::Validation(format!(
                        "Stored draft item at position {} in container {} has no id",
                        item.position, container.position
                    )));
                }
                None => require_content(item, container.position)?,
            }
        }
    }
    Ok(referenced)
}

fn require_content(item: &DraftItem, container_position: i32) -> Result<(), CoreError> {
    if item.content.is_none() {
        return Err(CoreError::Validation(format!(
            "Item {} in container {container_position} must include content",
            item.position
        )));
    }
    Ok(())
}

fn strip_transient(item: &mut DraftItem) {
    item.content = None;
    item.updated = None;
}

/// Reject a change set whose inserts reuse an id already present anywhere in
/// the database (`existing`), including inactive rows and other courses.
pub fn ensure_no_collisions(
    changes: &StructuralChanges,
    existing: &HashSet<DbId>,
) -> Result<(), CoreError> {
    match changes.created_ids().into_iter().find(|id| existing.contains(id)) {
        Some(id) => Err(CoreError::Validation(format!(
            "Id {id} is already in use and cannot be created again"
        ))),
        None => Ok(()),
    }
}
