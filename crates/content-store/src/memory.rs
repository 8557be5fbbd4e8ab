//! In-process content store.
//!
//! Used when no content store URL is configured and by the API tests. Keeps
//! branches as flat file maps and records the changes committed to each
//! branch since it was forked so a merge can replay them onto the base.
//! File operations are strict: `create` requires the path to be absent,
//! `update` and `delete` require it to be present.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::{
    CommitRequest, ContentStore, ContentStoreError, CreateRepository, FileChange, FileOperation,
    MergeStyle, PullRequestOptions, PullRequestRef, RepoRef,
};

/// A store operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateRepository,
    GetFile,
    CommitFiles,
    OpenPullRequest,
    MergePullRequest,
    ClosePullRequest,
}

/// Failure returned by an armed [`FailPoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    Unavailable,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestState {
    Open,
    Closed,
    Merged,
}

/// Copy of a pull request's state for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSnapshot {
    pub head: String,
    pub base: String,
    pub title: String,
    pub state: PullRequestState,
}

#[derive(Debug, Default, Clone)]
struct Branch {
    files: BTreeMap<String, String>,
    /// Changes committed since the branch was forked.
    changes: Vec<FileChange>,
}

#[derive(Debug)]
struct Repository {
    default_branch: String,
    branches: HashMap<String, Branch>,
    pulls: BTreeMap<i64, PullRequestSnapshot>,
}

#[derive(Debug, Default)]
struct State {
    repos: HashMap<RepoRef, Repository>,
    failures: HashMap<FailPoint, InjectedFailure>,
    commits: usize,
    merges: usize,
}

/// Content store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    state: Mutex<State>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `point` fail with [`ContentStoreError::Unavailable`]
    /// until [`recover`](Self::recover) is called.
    pub fn fail(&self, point: FailPoint) {
        self.lock().failures.insert(point, InjectedFailure::Unavailable);
    }

    /// Make every call to `point` fail with [`ContentStoreError::Timeout`].
    pub fn time_out(&self, point: FailPoint) {
        self.lock().failures.insert(point, InjectedFailure::Timeout);
    }

    pub fn recover(&self, point: FailPoint) {
        self.lock().failures.remove(&point);
    }

    /// Body of `path` on `branch`, if both exist.
    pub fn file(&self, repo: &RepoRef, branch: &str, path: &str) -> Option<String> {
        let state = self.lock();
        state
            .repos
            .get(repo)?
            .branches
            .get(branch)?
            .files
            .get(path)
            .cloned()
    }

    /// Paths present on `branch`, sorted.
    pub fn paths(&self, repo: &RepoRef, branch: &str) -> Vec<String> {
        let state = self.lock();
        state
            .repos
            .get(repo)
            .and_then(|r| r.branches.get(branch))
            .map(|b| b.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn branch_exists(&self, repo: &RepoRef, branch: &str) -> bool {
        let state = self.lock();
        state
            .repos
            .get(repo)
            .is_some_and(|r| r.branches.contains_key(branch))
    }

    pub fn pull_request(&self, repo: &RepoRef, number: i64) -> Option<PullRequestSnapshot> {
        let state = self.lock();
        state.repos.get(repo)?.pulls.get(&number).cloned()
    }

    pub fn commit_count(&self) -> usize {
        self.lock().commits
    }

    pub fn merge_count(&self) -> usize {
        self.lock().merges
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves the maps consistent: every
        // mutation is applied after validation.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl State {
    fn check(&self, point: FailPoint) -> Result<(), ContentStoreError> {
        match self.failures.get(&point) {
            None => Ok(()),
            Some(InjectedFailure::Timeout) => Err(ContentStoreError::Timeout),
            Some(InjectedFailure::Unavailable) => Err(ContentStoreError::Unavailable(format!(
                "injected failure at {point:?}"
            ))),
        }
    }

    fn repo(&self, repo: &RepoRef) -> Result<&Repository, ContentStoreError> {
        self.repos.get(repo).ok_or_else(|| ContentStoreError::NotFound {
            path: repo.to_string(),
        })
    }

    fn repo_mut(&mut self, repo: &RepoRef) -> Result<&mut Repository, ContentStoreError> {
        self.repos
            .get_mut(repo)
            .ok_or_else(|| ContentStoreError::NotFound {
                path: repo.to_string(),
            })
    }
}

impl Repository {
    fn open_pull_mut(
        &mut self,
        repo: &RepoRef,
        number: i64,
    ) -> Result<&mut PullRequestSnapshot, ContentStoreError> {
        let pull = self
            .pulls
            .get_mut(&number)
            .ok_or_else(|| ContentStoreError::NotFound {
                path: format!("{repo}#{number}"),
            })?;
        if pull.state != PullRequestState::Open {
            return Err(ContentStoreError::Conflict(format!(
                "pull request {repo}#{number} is {:?}",
                pull.state
            )));
        }
        Ok(pull)
    }
}

/// Apply `changes` to `files`, failing on the first change that does not
/// match the current contents. `files` is only modified on success.
fn apply_strict(
    files: &BTreeMap<String, String>,
    changes: &[FileChange],
) -> Result<BTreeMap<String, String>, ContentStoreError> {
    let mut next = files.clone();
    for change in changes {
        let exists = next.contains_key(&change.path);
        match change.operation {
            FileOperation::Create if exists => {
                return Err(ContentStoreError::Conflict(format!(
                    "file {} already exists",
                    change.path
                )));
            }
            FileOperation::Update | FileOperation::Delete if !exists => {
                return Err(ContentStoreError::NotFound {
                    path: change.path.clone(),
                });
            }
            FileOperation::Delete => {
                next.remove(&change.path);
            }
            FileOperation::Create | FileOperation::Update => {
                next.insert(
                    change.path.clone(),
                    change.content.clone().unwrap_or_default(),
                );
            }
        }
    }
    Ok(next)
}

/// Replay `changes` onto `files`; the last write to a path wins.
fn replay(files: &mut BTreeMap<String, String>, changes: &[FileChange]) {
    for change in changes {
        match change.operation {
            FileOperation::Delete => {
                files.remove(&change.path);
            }
            FileOperation::Create | FileOperation::Update => {
                files.insert(
                    change.path.clone(),
                    change.content.clone().unwrap_or_default(),
                );
            }
        }
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn create_repository(
        &self,
        owner: &str,
        options: &CreateRepository,
    ) -> Result<(), ContentStoreError> {
        let mut state = self.lock();
        state.check(FailPoint::CreateRepository)?;

        let key = RepoRef::new(owner, options.name.clone());
        if state.repos.contains_key(&key) {
            return Err(ContentStoreError::Conflict(format!(
                "repository {key} already exists"
            )));
        }

        let mut branches = HashMap::new();
        if options.auto_init {
            branches.insert(options.default_branch.clone(), Branch::default());
        }
        state.repos.insert(
            key,
            Repository {
                default_branch: options.default_branch.clone(),
                branches,
                pulls: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn get_file(
        &self,
        repo: &RepoRef,
        git_ref: &str,
        path: &str,
    ) -> Result<String, ContentStoreError> {
        let state = self.lock();
        state.check(FailPoint::GetFile)?;

        state
            .repo(repo)?
            .branches
            .get(git_ref)
            .and_then(|b| b.files.get(path))
            .cloned()
            .ok_or_else(|| ContentStoreError::NotFound {
                path: format!("{repo}@{git_ref}:{path}"),
            })
    }

    async fn commit_files(
        &self,
        repo: &RepoRef,
        request: &CommitRequest,
    ) -> Result<(), ContentStoreError> {
        let mut state = self.lock();
        state.check(FailPoint::CommitFiles)?;

        let repository = state.repo_mut(repo)?;
        let source = request
            .branch
            .clone()
            .unwrap_or_else(|| repository.default_branch.clone());

        let (target, mut branch) = match &request.new_branch {
            Some(new_branch) => {
                if repository.branches.contains_key(new_branch) {
                    return Err(ContentStoreError::Conflict(format!(
                        "branch {new_branch} already exists"
                    )));
                }
                let base = repository.branches.get(&source).ok_or_else(|| {
                    ContentStoreError::NotFound {
                        path: format!("{repo}@{source}"),
                    }
                })?;
                let forked = Branch {
                    files: base.files.clone(),
                    changes: Vec::new(),
                };
                (new_branch.clone(), forked)
            }
            None => {
                let existing = repository.branches.get(&source).cloned().unwrap_or_default();
                (source, existing)
            }
        };

        branch.files = apply_strict(&branch.files, &request.files)?;
        branch.changes.extend(request.files.iter().cloned());
        repository.branches.insert(target, branch);
        state.commits += 1;
        Ok(())
    }

    async fn open_pull_request(
        &self,
        repo: &RepoRef,
        options: &PullRequestOptions,
    ) -> Result<PullRequestRef, ContentStoreError> {
        let mut state = self.lock();
        state.check(FailPoint::OpenPullRequest)?;

        let repository = state.repo_mut(repo)?;
        for branch in [&options.head, &options.base] {
            if !repository.branches.contains_key(branch) {
                return Err(ContentStoreError::NotFound {
                    path: format!("{repo}@{branch}"),
                });
            }
        }

        let number = repository.pulls.keys().next_back().copied().unwrap_or(0) + 1;
        repository.pulls.insert(
            number,
            PullRequestSnapshot {
                head: options.head.clone(),
                base: options.base.clone(),
                title: options.title.clone(),
                state: PullRequestState::Open,
            },
        );
        Ok(PullRequestRef { number })
    }

    async fn merge_pull_request(
        &self,
        repo: &RepoRef,
        pull_request: PullRequestRef,
        _style: MergeStyle,
    ) -> Result<(), ContentStoreError> {
        let mut state = self.lock();
        state.check(FailPoint::MergePullRequest)?;

        let repository = state.repo_mut(repo)?;
        let (head, base) = {
            let pull = repository.open_pull_mut(repo, pull_request.number)?;
            (pull.head.clone(), pull.base.clone())
        };

        let changes = repository
            .branches
            .get(&head)
            .map(|b| b.changes.clone())
            .ok_or_else(|| ContentStoreError::NotFound {
                path: format!("{repo}@{head}"),
            })?;
        let target = repository
            .branches
            .get_mut(&base)
            .ok_or_else(|| ContentStoreError::NotFound {
                path: format!("{repo}@{base}"),
            })?;
        replay(&mut target.files, &changes);
        target.changes.extend(changes);

        repository.open_pull_mut(repo, pull_request.number)?.state = PullRequestState::Merged;
        state.merges += 1;
        tracing::debug!(%repo, number = pull_request.number, "Merged pull request in memory store");
        Ok(())
    }

    async fn close_pull_request(
        &self,
        repo: &RepoRef,
        pull_request: PullRequestRef,
    ) -> Result<(), ContentStoreError> {
        let mut state = self.lock();
        state.check(FailPoint::ClosePullRequest)?;

        let repository = state.repo_mut(repo)?;
        repository.open_pull_mut(repo, pull_request.number)?.state = PullRequestState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::Identity;

    fn repo() -> RepoRef {
        RepoRef::new("courses", "1")
    }

    fn identity() -> Identity {
        Identity {
            name: "u".into(),
            email: "u@example.test".into(),
        }
    }

    fn commit(new_branch: Option<&str>, files: Vec<FileChange>) -> CommitRequest {
        CommitRequest {
            branch: Some("main".into()),
            new_branch: new_branch.map(str::to_string),
            author: identity(),
            committer: identity(),
            message: "m".into(),
            files,
        }
    }

    async fn seeded() -> MemoryContentStore {
        let store = MemoryContentStore::new();
        store
            .create_repository(
                "courses",
                &CreateRepository {
                    name: "1".into(),
                    default_branch: "main".into(),
                    auto_init: true,
                    private: true,
                },
            )
            .await
            .unwrap();
        store
            .commit_files(&repo(), &commit(None, vec![FileChange::create("doc", "{}")]))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn branch_commit_then_merge_lands_on_trunk() {
        let store = seeded().await;
        store
            .commit_files(
                &repo(),
                &commit(
                    Some("b1"),
                    vec![FileChange::create("10", "body"), FileChange::update("doc", "{\"a\":1}")],
                ),
            )
            .await
            .unwrap();

        assert_eq!(store.file(&repo(), "main", "10"), None);
        assert_eq!(store.file(&repo(), "b1", "10").as_deref(), Some("body"));

        let pr = store
            .open_pull_request(
                &repo(),
                &PullRequestOptions {
                    head: "b1".into(),
                    base: "main".into(),
                    title: "t".into(),
                },
            )
            .await
            .unwrap();
        store
            .merge_pull_request(&repo(), pr, MergeStyle::Merge)
            .await
            .unwrap();

        assert_eq!(store.file(&repo(), "main", "10").as_deref(), Some("body"));
        assert_eq!(store.file(&repo(), "main", "doc").as_deref(), Some("{\"a\":1}"));
        assert_eq!(
            store.pull_request(&repo(), pr.number).unwrap().state,
            PullRequestState::Merged
        );
        assert_eq!(store.merge_count(), 1);
    }

    #[tokio::test]
    async fn strict_operations_reject_mismatched_state_atomically() {
        let store = seeded().await;
        let err = store
            .commit_files(
                &repo(),
                &commit(
                    Some("b1"),
                    vec![FileChange::create("10", "x"), FileChange::delete("missing")],
                ),
            )
            .await
            .unwrap_err();

        assert_matches!(err, ContentStoreError::NotFound { .. });
        assert!(!store.branch_exists(&repo(), "b1"));
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn existing_branch_cannot_be_recreated() {
        let store = seeded().await;
        store
            .commit_files(&repo(), &commit(Some("b1"), vec![FileChange::create("1", "a")]))
            .await
            .unwrap();
        let err = store
            .commit_files(&repo(), &commit(Some("b1"), vec![FileChange::create("2", "b")]))
            .await
            .unwrap_err();
        assert_matches!(err, ContentStoreError::Conflict(_));
    }

    #[tokio::test]
    async fn closed_pull_request_cannot_be_merged() {
        let store = seeded().await;
        store
            .commit_files(&repo(), &commit(Some("b1"), vec![FileChange::create("1", "a")]))
            .await
            .unwrap();
        let pr = store
            .open_pull_request(
                &repo(),
                &PullRequestOptions {
                    head: "b1".into(),
                    base: "main".into(),
                    title: "t".into(),
                },
            )
            .await
            .unwrap();
        store.close_pull_request(&repo(), pr).await.unwrap();

        let err = store
            .merge_pull_request(&repo(), pr, MergeStyle::Merge)
            .await
            .unwrap_err();
        assert_matches!(err, ContentStoreError::Conflict(_));
        assert_eq!(store.file(&repo(), "main", "1"), None);
    }

    #[tokio::test]
    async fn injected_failures_until_recovered() {
        let store = seeded().await;
        store.time_out(FailPoint::GetFile);
        assert_matches!(
            store.get_file(&repo(), "main", "doc").await,
            Err(ContentStoreError::Timeout)
        );

        store.recover(FailPoint::GetFile);
        assert_eq!(store.get_file(&repo(), "main", "doc").await.unwrap(), "{}");

        store.fail(FailPoint::CommitFiles);
        assert_matches!(
            store
                .commit_files(&repo(), &commit(None, vec![FileChange::update("doc", "x")]))
                .await,
            Err(ContentStoreError::Unavailable(_))
        );
    }
}
