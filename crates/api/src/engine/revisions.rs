//! Revision submission, approval, close and lock.
//!
//! Submit: reconcile the client draft against the live tree, commit item
//! bodies plus the resolved tree document to a new branch, open a pull
//! request, then record the revision.
//!
//! Approve: read the tree document back from the branch, then, holding the
//! course lock in one database transaction, reconcile it against the
//! *current* live tree, mark the revision merged and apply the structural
//! changes. The pull request is merged after commit.

use std::fmt;

use courseforge_content_store::{
    CommitRequest, ContentStoreError, FileChange, MergeStyle, PullRequestOptions, PullRequestRef,
};
use courseforge_core::course::{ensure_can_propose, ensure_can_review};
use courseforge_core::error::CoreError;
use courseforge_core::reconcile::{
    ensure_no_collisions, reconcile, ContentChange, ContentChangeKind, ReconcileMode,
    Reconciliation,
};
use courseforge_core::revision::{
    branch_name, validate_revision_description, STRUCTURE_DOCUMENT_PATH,
};
use courseforge_core::tree::DraftTree;
use courseforge_core::types::DbId;
use courseforge_db::models::revision::{CreateRevision, Revision};
use courseforge_db::models::status::RevisionStatus;
use courseforge_db::repositories::{CourseRepo, CourseTreeRepo, RevisionRepo};
use sqlx::PgConnection;

use crate::engine::CourseEngine;
use crate::middleware::auth::AuthUser;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Whether a failed content-store call happened before or after the store
/// was first mutated by the current operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    /// Nothing was written to the content store. Retrying is safe.
    BeforeCommit,
    /// The content store already holds changes from this operation (a
    /// repository or branch). Retrying creates new ones next to them.
    AfterCommit,
}

impl fmt::Display for StorePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BeforeCommit => "before commit",
            Self::AfterCommit => "after commit",
        })
    }
}

/// Errors from engine operations.
#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    /// Validation, not-found, conflict and permission failures.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A relational store failure. Any transaction was rolled back.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A content-store call failed.
    #[error("Content store error ({phase}): {source}")]
    ContentStore {
        phase: StorePhase,
        #[source]
        source: ContentStoreError,
    },

    /// The content store was changed but the database row tracking the
    /// change could not be written. Needs manual cleanup.
    #[error("Content store changes in {repository} were not recorded: {source}")]
    PartiallyCommitted {
        repository: String,
        branch_id: Option<DbId>,
        pull_request: Option<i64>,
        #[source]
        source: sqlx::Error,
    },

    /// The revision status changed in the database but the pull request
    /// could not follow.
    #[error("Revision {revision_id} is {} but pull request #{pull_request} was not updated: {source}", .status.label())]
    Diverged {
        revision_id: DbId,
        status: RevisionStatus,
        pull_request: i64,
        #[source]
        source: ContentStoreError,
    },
}

impl RevisionError {
    fn store(phase: StorePhase) -> impl FnOnce(ContentStoreError) -> Self {
        move |source| Self::ContentStore { phase, source }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

fn file_change(change: ContentChange) -> FileChange {
    let path = change.path();
    match change.kind {
        ContentChangeKind::Create => FileChange::create(path, change.body.unwrap_or_default()),
        ContentChangeKind::Update => FileChange::update(path, change.body.unwrap_or_default()),
        ContentChangeKind::Delete => FileChange::delete(path),
    }
}

impl CourseEngine {
    /// Reconcile `draft` against the live tree and reject inserts whose ids
    /// are already taken anywhere in the database.
    async fn reconcile_against_live(
        &self,
        conn: &mut PgConnection,
        course_id: DbId,
        draft: DraftTree,
        mode: ReconcileMode,
    ) -> Result<Reconciliation, RevisionError> {
        let baseline = CourseTreeRepo::load_baseline(conn, course_id).await?;
        let reconciliation = reconcile(course_id, draft, &baseline, mode, &*self.ids)?;

        let existing =
            CourseTreeRepo::find_existing_ids(conn, &reconciliation.structural.created_ids())
                .await?;
        ensure_no_collisions(&reconciliation.structural, &existing)?;
        Ok(reconciliation)
    }

    async fn find_revision(
        &self,
        course_id: DbId,
        revision_id: DbId,
    ) -> Result<Revision, RevisionError> {
        RevisionRepo::find_by_id(&self.pool, course_id, revision_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "Revision",
                    id: revision_id,
                }
                .into()
            })
    }

    /// Propose `draft` as a new revision of a course.
    pub async fn submit(
        &self,
        course_id: DbId,
        user: &AuthUser,
        draft: DraftTree,
    ) -> Result<Revision, RevisionError> {
        let course = self.load_course(course_id).await?;
        ensure_can_propose(course.creator_id, user.user_id, &user.role)?;
        validate_revision_description(&draft.description)?;

        let reconciliation = {
            let mut conn = self.pool.acquire().await?;
            self.reconcile_against_live(&mut conn, course_id, draft, ReconcileMode::Submit)
                .await?
        };

        let document = serde_json::to_string(&reconciliation.resolved)
            .map_err(|e| CoreError::Internal(format!("Failed to serialize course tree: {e}")))?;
        let mut files: Vec<FileChange> = reconciliation
            .content_changes
            .into_iter()
            .map(file_change)
            .collect();
        files.push(FileChange::update(STRUCTURE_DOCUMENT_PATH, document));

        let branch_id = self.ids.next_id()?;
        let revision_id = self.ids.next_id()?;
        let branch = branch_name(branch_id);
        let repo = self.repo(course_id);
        let description = reconciliation.resolved.description.clone();

        self.store
            .commit_files(
                &repo,
                &CommitRequest {
                    branch: Some(self.settings.trunk.clone()),
                    new_branch: Some(branch.clone()),
                    author: self.identity(user.user_id),
                    committer: self.identity(user.user_id),
                    message: description.clone(),
                    files,
                },
            )
            .await
            .map_err(RevisionError::store(StorePhase::BeforeCommit))?;

        let pull_request = self
            .store
            .open_pull_request(
                &repo,
                &PullRequestOptions {
                    head: branch,
                    base: self.settings.trunk.clone(),
                    title: description.clone(),
                },
            )
            .await
            .map_err(|source| {
                tracing::warn!(
                    course_id,
                    branch_id,
                    error = %source,
                    "Branch committed but pull request could not be opened",
                );
                RevisionError::ContentStore {
                    phase: StorePhase::AfterCommit,
                    source,
                }
            })?;

        let input = CreateRevision {
            id: revision_id,
            course_id,
            branch_id,
            pull_request_id: pull_request.number,
            description,
            editor_id: user.user_id,
        };
        let revision = match RevisionRepo::create(&self.pool, &input).await {
            Ok(revision) => revision,
            Err(source) => {
                tracing::error!(
                    course_id,
                    branch_id,
                    pull_request = pull_request.number,
                    error = %source,
                    "Pull request opened but revision could not be recorded",
                );
                return Err(RevisionError::PartiallyCommitted {
                    repository: repo.to_string(),
                    branch_id: Some(branch_id),
                    pull_request: Some(pull_request.number),
                    source,
                });
            }
        };

        tracing::info!(
            course_id,
            revision_id,
            branch_id,
            pull_request = pull_request.number,
            user_id = user.user_id,
            "Revision submitted",
        );
        Ok(revision)
    }

    /// Apply an open revision to the live tree and merge its pull request.
    /// Returns the tree as applied.
    pub async fn approve(
        &self,
        course_id: DbId,
        revision_id: DbId,
        user: &AuthUser,
    ) -> Result<DraftTree, RevisionError> {
        let course = self.load_course(course_id).await?;
        ensure_can_review(course.creator_id, user.user_id, &user.role)?;

        let revision = self.find_revision(course_id, revision_id).await?;
        revision.status().ensure_transition(RevisionStatus::Merged)?;

        let repo = self.repo(course_id);
        let document = self
            .store
            .get_file(&repo, &branch_name(revision.branch_id), STRUCTURE_DOCUMENT_PATH)
            .await
            .map_err(RevisionError::store(StorePhase::BeforeCommit))?;
        let draft: DraftTree = serde_json::from_str(&document).map_err(|e| {
            CoreError::Internal(format!(
                "Stored tree of revision {revision_id} is malformed: {e}"
            ))
        })?;

        // The course lock serializes approvals of the same course, so the
        // tree read here is the tree the writes land on.
        let mut tx = self.pool.begin().await?;
        if !CourseRepo::lock_for_tree_update(&mut *tx, course_id).await? {
            return Err(CoreError::NotFound {
                entity: "Course",
                id: course_id,
            }
            .into());
        }

        let reconciliation = self
            .reconcile_against_live(&mut *tx, course_id, draft, ReconcileMode::Approve)
            .await?;

        RevisionRepo::merge(
            &mut *tx,
            course_id,
            revision_id,
            user.user_id,
            &reconciliation.structural,
        )
        .await?
        .ok_or_else(|| CoreError::Conflict(format!("Revision {revision_id} is no longer open")))?;
        tx.commit().await?;

        let pull_request = PullRequestRef {
            number: revision.pull_request_id,
        };
        if let Err(source) = self
            .store
            .merge_pull_request(&repo, pull_request, MergeStyle::Merge)
            .await
        {
            tracing::error!(
                course_id,
                revision_id,
                branch_id = revision.branch_id,
                pull_request = pull_request.number,
                error = %source,
                "Revision merged in database but pull request merge failed",
            );
            return Err(RevisionError::Diverged {
                revision_id,
                status: RevisionStatus::Merged,
                pull_request: pull_request.number,
                source,
            });
        }

        tracing::info!(
            course_id,
            revision_id,
            user_id = user.user_id,
            created = reconciliation.structural.created_ids().len(),
            updated = reconciliation.structural.update_containers.len()
                + reconciliation.structural.update_items.len(),
            deleted = reconciliation.structural.delete_containers.len()
                + reconciliation.structural.delete_items.len(),
            "Revision approved",
        );
        Ok(reconciliation.resolved)
    }

    /// Abandon an open revision and close its pull request.
    pub async fn close(
        &self,
        course_id: DbId,
        revision_id: DbId,
        user: &AuthUser,
    ) -> Result<Revision, RevisionError> {
        let revision = self
            .transition(course_id, revision_id, user, RevisionStatus::Closed)
            .await?;

        let pull_request = PullRequestRef {
            number: revision.pull_request_id,
        };
        if let Err(source) = self
            .store
            .close_pull_request(&self.repo(course_id), pull_request)
            .await
        {
            tracing::error!(
                course_id,
                revision_id,
                pull_request = pull_request.number,
                error = %source,
                "Revision closed in database but pull request close failed",
            );
            return Err(RevisionError::Diverged {
                revision_id,
                status: RevisionStatus::Closed,
                pull_request: pull_request.number,
                source,
            });
        }

        tracing::info!(course_id, revision_id, user_id = user.user_id, "Revision closed");
        Ok(revision)
    }

    /// Freeze an open revision. The pull request is left as it is.
    pub async fn lock(
        &self,
        course_id: DbId,
        revision_id: DbId,
        user: &AuthUser,
    ) -> Result<Revision, RevisionError> {
        let revision = self
            .transition(course_id, revision_id, user, RevisionStatus::Locked)
            .await?;
        tracing::info!(course_id, revision_id, user_id = user.user_id, "Revision locked");
        Ok(revision)
    }

    async fn transition(
        &self,
        course_id: DbId,
        revision_id: DbId,
        user: &AuthUser,
        target: RevisionStatus,
    ) -> Result<Revision, RevisionError> {
        let course = self.load_course(course_id).await?;
        ensure_can_review(course.creator_id, user.user_id, &user.role)?;

        let revision = self.find_revision(course_id, revision_id).await?;
        revision.status().ensure_transition(target)?;

        let updated = RevisionRepo::transition(&self.pool, course_id, revision_id, target)
            .await?
            .ok_or_else(|| {
                CoreError::Conflict(format!("Revision {revision_id} is no longer open"))
            })?;
        Ok(updated)
    }
}
