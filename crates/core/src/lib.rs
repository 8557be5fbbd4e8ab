//! Domain layer for the courseforge authoring backend.
//!
//! Everything in this crate is free of I/O: identifier allocation, the
//! course tree types, the draft-vs-baseline reconciler, and the validation
//! and access rules shared by the database and API layers.

pub mod content_type;
pub mod course;
pub mod error;
pub mod ids;
pub mod reconcile;
pub mod revision;
pub mod tree;
pub mod types;
