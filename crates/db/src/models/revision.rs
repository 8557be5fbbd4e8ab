//! Revision rows.

use courseforge_core::types::{DbId, Timestamp};
use serde::{Serialize, Serializer};
use sqlx::FromRow;

use crate::models::course::{id_string, optional_id_string};
use crate::models::status::{RevisionStatus, StatusId};

/// A row from the `course_revisions` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Revision {
    #[serde(with = "id_string")]
    pub id: DbId,
    #[serde(with = "id_string")]
    pub course_id: DbId,
    #[serde(with = "id_string")]
    pub branch_id: DbId,
    pub pull_request_id: i64,
    pub description: String,
    #[serde(rename = "status", serialize_with = "status_name")]
    pub status_id: StatusId,
    #[serde(with = "id_string")]
    pub editor_id: DbId,
    #[serde(with = "optional_id_string")]
    pub approver_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Revision {
    /// Decoded lifecycle status. Unknown ids (not produced by the seed data)
    /// are treated as locked so they are never processed.
    pub fn status(&self) -> RevisionStatus {
        decode_status(self.status_id)
    }
}

fn decode_status(id: StatusId) -> RevisionStatus {
    RevisionStatus::from_id(id).unwrap_or(RevisionStatus::Locked)
}

/// Revisions go out with their status by name (`"open"`, `"merged"`, ...).
fn status_name<S: Serializer>(id: &StatusId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(decode_status(*id).label())
}

/// Values for inserting a revision in the `Open` state.
#[derive(Debug, Clone)]
pub struct CreateRevision {
    pub id: DbId,
    pub course_id: DbId,
    pub branch_id: DbId,
    pub pull_request_id: i64,
    pub description: String,
    pub editor_id: DbId,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn revision(status: RevisionStatus, approver_id: Option<DbId>) -> Revision {
        Revision {
            id: 9_007_199_254_740_993,
            course_id: 1,
            branch_id: 2,
            pull_request_id: 3,
            description: "d".to_string(),
            status_id: status.id(),
            editor_id: 9_007_199_254_740_995,
            approver_id,
            created_at: Timestamp::default(),
            updated_at: Timestamp::default(),
        }
    }

    #[test]
    fn ids_serialize_as_strings_and_status_by_name() {
        let json = serde_json::to_value(revision(RevisionStatus::Open, None)).unwrap();
        assert_eq!(json["id"], "9007199254740993");
        assert_eq!(json["editor_id"], "9007199254740995");
        assert!(json["approver_id"].is_null());
        assert_eq!(json["status"], "open");
        assert!(json.get("status_id").is_none());
        assert_eq!(json["pull_request_id"], 3);
    }

    #[test]
    fn approver_serializes_as_string() {
        let json = serde_json::to_value(revision(RevisionStatus::Merged, Some(42))).unwrap();
        assert_eq!(json["approver_id"], "42");
        assert_eq!(json["status"], "merged");
    }
}
