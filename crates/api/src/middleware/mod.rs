//! Request extractors.
//!
//! - [`auth::AuthUser`] -- Extracts the authenticated user from a JWT Bearer token.
//!
//! Course-level permissions depend on the course creator, so they are
//! checked inside the engine rather than by a role extractor.

pub mod auth;
