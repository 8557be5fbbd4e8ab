//! Request handlers.
//!
//! Each submodule provides async handler functions for one resource.
//! Handlers that change courses delegate to the engine; plain reads go to
//! the repositories in `courseforge_db`. Errors map via [`crate::error::AppError`].

pub mod courses;
pub mod revisions;
