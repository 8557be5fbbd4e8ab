//! Course creation and item body reads.

use courseforge_content_store::{CommitRequest, ContentStoreError, CreateRepository, FileChange};
use courseforge_core::course::{validate_course_description, validate_course_name};
use courseforge_core::error::CoreError;
use courseforge_core::revision::STRUCTURE_DOCUMENT_PATH;
use courseforge_core::tree::DraftTree;
use courseforge_core::types::DbId;
use courseforge_db::models::course::{Course, CreateCourse};
use courseforge_db::repositories::{CourseRepo, CourseTreeRepo};

use crate::engine::{CourseEngine, RevisionError, StorePhase};

impl CourseEngine {
    /// Create a course with an empty tree, backed by a fresh content
    /// repository whose trunk holds an empty structure document.
    pub async fn create_course(
        &self,
        user_id: DbId,
        name: String,
        description: String,
    ) -> Result<Course, RevisionError> {
        validate_course_name(&name)?;
        validate_course_description(&description)?;

        let course_id = self.ids.next_id()?;
        let repo = self.repo(course_id);

        self.store
            .create_repository(
                &self.settings.owner,
                &CreateRepository {
                    name: repo.name.clone(),
                    default_branch: self.settings.trunk.clone(),
                    auto_init: true,
                    private: true,
                },
            )
            .await
            .map_err(|source| RevisionError::ContentStore {
                phase: StorePhase::BeforeCommit,
                source,
            })?;

        let empty = DraftTree {
            description: String::new(),
            containers: Vec::new(),
        };
        let document = serde_json::to_string(&empty)
            .map_err(|e| CoreError::Internal(format!("Failed to serialize course tree: {e}")))?;

        self.store
            .commit_files(
                &repo,
                &CommitRequest {
                    branch: Some(self.settings.trunk.clone()),
                    new_branch: None,
                    author: self.identity(user_id),
                    committer: self.identity(user_id),
                    message: format!("Create course {name}"),
                    files: vec![FileChange::create(STRUCTURE_DOCUMENT_PATH, document)],
                },
            )
            .await
            .map_err(|source| {
                tracing::warn!(
                    course_id,
                    repository = %repo,
                    error = %source,
                    "Repository created but initial commit failed",
                );
                RevisionError::ContentStore {
                    phase: StorePhase::AfterCommit,
                    source,
                }
            })?;

        let input = CreateCourse {
            id: course_id,
            name,
            description,
            creator_id: user_id,
        };
        let course = CourseRepo::create(&self.pool, &input).await.map_err(|source| {
            tracing::error!(
                course_id,
                repository = %repo,
                error = %source,
                "Repository created but course could not be recorded",
            );
            RevisionError::PartiallyCommitted {
                repository: repo.to_string(),
                branch_id: None,
                pull_request: None,
                source,
            }
        })?;

        tracing::info!(course_id, user_id, repository = %repo, "Course created");
        Ok(course)
    }

    /// Body of a live item as it stands on trunk.
    pub async fn item_content(
        &self,
        course_id: DbId,
        item_id: DbId,
    ) -> Result<String, RevisionError> {
        self.load_course(course_id).await?;

        let not_found = || CoreError::NotFound {
            entity: "Item",
            id: item_id,
        };
        if !CourseTreeRepo::is_live_item(&self.pool, course_id, item_id).await? {
            return Err(not_found().into());
        }

        match self
            .store
            .get_file(&self.repo(course_id), &self.settings.trunk, &item_id.to_string())
            .await
        {
            Ok(body) => Ok(body),
            Err(ContentStoreError::NotFound { .. }) => {
                tracing::warn!(course_id, item_id, "Live item has no body on trunk");
                Err(not_found().into())
            }
            Err(source) => Err(RevisionError::ContentStore {
                phase: StorePhase::BeforeCommit,
                source,
            }),
        }
    }
}
