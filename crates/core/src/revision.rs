//! Revision constants and validation shared by the DB and API layers.

use crate::course::validate_text;
use crate::error::CoreError;
use crate::types::DbId;

/// Path of the structural document in every course repository.
pub const STRUCTURE_DOCUMENT_PATH: &str = "course_data.json";

/// Maximum length of a revision description (also the pull-request title).
pub const MAX_REVISION_DESCRIPTION_LENGTH: usize = 100;

/// Validate a revision description.
pub fn validate_revision_description(description: &str) -> Result<(), CoreError> {
    validate_text(
        "Revision description",
        description,
        MAX_REVISION_DESCRIPTION_LENGTH,
    )
}

/// Repository name of a course in the content store.
pub fn repository_name(course_id: DbId) -> String {
    course_id.to_string()
}

/// Branch name for a revision.
pub fn branch_name(branch_id: DbId) -> String {
    branch_id.to_string()
}

/// Commit email derived from a user id.
pub fn commit_email(user_id: DbId, domain: &str) -> String {
    format!("{user_id}@{domain}")
}
