//! Course content revision engine.
//!
//! Coordinates writes across the two systems of record: Postgres holds the
//! course structure, the content store holds item bodies and the proposed
//! tree document. There is no shared transaction. Every operation orders
//! its steps so that a failure leaves at most one well-defined kind of
//! inconsistency, reported through [`RevisionError`]:
//!
//! - [`courses`] -- course creation and item body reads.
//! - [`revisions`] -- submit, approve, close and lock.

use std::sync::Arc;

use courseforge_content_store::{ContentStore, Identity, RepoRef};
use courseforge_core::error::CoreError;
use courseforge_core::ids::IdAllocator;
use courseforge_core::revision::{commit_email, repository_name};
use courseforge_core::types::DbId;
use courseforge_db::models::course::Course;
use courseforge_db::repositories::CourseRepo;
use sqlx::PgPool;

use crate::config::ContentStoreConfig;

pub mod courses;
pub mod revisions;

pub use revisions::{RevisionError, StorePhase};

/// Repository layout shared by every course.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Organisation owning the course repositories.
    pub owner: String,
    /// Trunk branch pull requests merge into.
    pub trunk: String,
    /// Domain for commit author emails.
    pub commit_email_domain: String,
}

impl From<&ContentStoreConfig> for EngineSettings {
    fn from(config: &ContentStoreConfig) -> Self {
        Self {
            owner: config.org.clone(),
            trunk: config.trunk.clone(),
            commit_email_domain: config.commit_email_domain.clone(),
        }
    }
}

/// Orchestrates the relational store, the content store and the identifier
/// allocator. Cheap to clone.
#[derive(Clone)]
pub struct CourseEngine {
    pool: PgPool,
    store: Arc<dyn ContentStore>,
    ids: Arc<dyn IdAllocator>,
    settings: Arc<EngineSettings>,
}

impl CourseEngine {
    pub fn new(
        pool: PgPool,
        store: Arc<dyn ContentStore>,
        ids: Arc<dyn IdAllocator>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            pool,
            store,
            ids,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn repo(&self, course_id: DbId) -> RepoRef {
        RepoRef::new(self.settings.owner.clone(), repository_name(course_id))
    }

    fn identity(&self, user_id: DbId) -> Identity {
        Identity {
            name: user_id.to_string(),
            email: commit_email(user_id, &self.settings.commit_email_domain),
        }
    }

    async fn load_course(&self, course_id: DbId) -> Result<Course, RevisionError> {
        CourseRepo::find_by_id(&self.pool, course_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "Course",
                    id: course_id,
                }
                .into()
            })
    }
}
