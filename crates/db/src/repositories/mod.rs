//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` (or an open transaction) as the first argument.

pub mod course_repo;
pub mod course_tree_repo;
pub mod revision_repo;

pub use course_repo::CourseRepo;
pub use course_tree_repo::CourseTreeRepo;
pub use revision_repo::RevisionRepo;
