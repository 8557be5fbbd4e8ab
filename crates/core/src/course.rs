//! Course metadata limits and the course access policy.
//!
//! Proposing a change to a course is open to its creator and to users with
//! the `editor` or `admin` role. Reviewing (approve, close, lock) is limited
//! to the creator and admins.

use crate::error::CoreError;
use crate::types::DbId;

/// Maximum length of a course name.
pub const MAX_COURSE_NAME_LENGTH: usize = 50;

/// Maximum length of a course description.
pub const MAX_COURSE_DESCRIPTION_LENGTH: usize = 200;

/// Role allowed to review any course.
pub const ROLE_ADMIN: &str = "admin";

/// Role allowed to propose changes to any course.
pub const ROLE_EDITOR: &str = "editor";

/// Validate a course name: non-blank and within [`MAX_COURSE_NAME_LENGTH`].
pub fn validate_course_name(name: &str) -> Result<(), CoreError> {
    validate_text("Course name", name, MAX_COURSE_NAME_LENGTH)
}

/// Validate a course description: non-blank and within
/// [`MAX_COURSE_DESCRIPTION_LENGTH`].
pub fn validate_course_description(description: &str) -> Result<(), CoreError> {
    validate_text("Course description", description, MAX_COURSE_DESCRIPTION_LENGTH)
}

pub(crate) fn validate_text(label: &str, value: &str, max: usize) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{label} must not be empty")));
    }
    let len = value.chars().count();
    if len > max {
        return Err(CoreError::Validation(format!(
            "{label} must not exceed {max} characters, got {len}"
        )));
    }
    Ok(())
}

/// Check that `user_id` (with `role`) may submit revisions to a course
/// created by `creator_id`.
pub fn ensure_can_propose(creator_id: DbId, user_id: DbId, role: &str) -> Result<(), CoreError> {
    if user_id == creator_id || role == ROLE_ADMIN || role == ROLE_EDITOR {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "Only the course creator or an editor can propose changes".to_string(),
        ))
    }
}

/// Check that `user_id` (with `role`) may approve, close or lock revisions
/// of a course created by `creator_id`.
pub fn ensure_can_review(creator_id: DbId, user_id: DbId, role: &str) -> Result<(), CoreError> {
    if user_id == creator_id || role == ROLE_ADMIN {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "Only the course creator or an admin can review revisions".to_string(),
        ))
    }
}
