//! Row structs and insert DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` entity struct matching the database row
//! - A create DTO carrying an allocator-issued id

pub mod course;
pub mod revision;
pub mod status;
