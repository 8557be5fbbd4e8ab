//! Client for the version-controlled store that holds course content.
//!
//! Each course owns one repository. Item bodies live in files named by item
//! id, and the proposed tree shape lives in a structural document. Changes
//! are committed to a new branch, proposed as a pull request against the
//! trunk branch, and merged on approval.
//!
//! [`ContentStore`] is the seam the revision engine depends on:
//! - [`gitea::GiteaStore`] talks to a Gitea-compatible HTTP API.
//! - [`memory::MemoryContentStore`] keeps everything in process (local
//!   development and tests).
//!
//! Bodies are passed around as plain strings. Base64 encoding for transport
//! happens inside the HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod encoding;
pub mod gitea;
pub mod memory;

pub use gitea::GiteaStore;
pub use memory::MemoryContentStore;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Repository address: owning organisation plus repository name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Operation applied to a single file in a multi-file commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Create,
    Update,
    Delete,
}

/// One file change. `content` is the raw body and is `None` for deletes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub operation: FileOperation,
    pub content: Option<String>,
}

impl FileChange {
    pub fn create(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operation: FileOperation::Create,
            content: Some(content.into()),
        }
    }

    pub fn update(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operation: FileOperation::Update,
            content: Some(content.into()),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operation: FileOperation::Delete,
            content: None,
        }
    }
}

/// Commit author / committer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// An atomic multi-file commit.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    /// Branch to start from. `None` means the repository's default branch.
    pub branch: Option<String>,
    /// Branch to create for the commit. `None` commits onto `branch`.
    pub new_branch: Option<String>,
    pub author: Identity,
    pub committer: Identity,
    pub message: String,
    pub files: Vec<FileChange>,
}

/// Options for opening a pull request.
#[derive(Debug, Clone, Serialize)]
pub struct PullRequestOptions {
    pub head: String,
    pub base: String,
    pub title: String,
}

/// Reference to an opened pull request (its per-repository number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PullRequestRef {
    pub number: i64,
}

/// How a pull request is merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeStyle {
    #[default]
    Merge,
    Rebase,
    Squash,
}

impl MergeStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Rebase => "rebase",
            Self::Squash => "squash",
        }
    }
}

/// Options for creating a course repository.
#[derive(Debug, Clone, Serialize)]
pub struct CreateRepository {
    pub name: String,
    pub default_branch: String,
    pub auto_init: bool,
    pub private: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from the content store layer.
#[derive(Debug, thiserror::Error)]
pub enum ContentStoreError {
    /// The request did not complete within the configured timeout.
    #[error("Content store request timed out")]
    Timeout,

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The content store returned a non-2xx status code.
    #[error("Content store API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The requested file, branch or repository does not exist.
    #[error("Not found in content store: {path}")]
    NotFound { path: String },

    /// A file body could not be decoded.
    #[error("Invalid file encoding: {0}")]
    Decode(String),

    /// The change conflicts with the current repository state.
    #[error("Content store conflict: {0}")]
    Conflict(String),

    /// The store is not accepting requests.
    #[error("Content store unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for ContentStoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}

impl ContentStoreError {
    /// Whether retrying the same call later may succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Timeout | Self::Request(_) | Self::Unavailable(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::NotFound { .. } | Self::Decode(_) | Self::Conflict(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Operations the revision engine needs from the content store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Create a repository owned by `owner`.
    async fn create_repository(
        &self,
        owner: &str,
        options: &CreateRepository,
    ) -> Result<(), ContentStoreError>;

    /// Read a file at `git_ref` (branch name), returning the decoded body.
    async fn get_file(
        &self,
        repo: &RepoRef,
        git_ref: &str,
        path: &str,
    ) -> Result<String, ContentStoreError>;

    /// Apply all `request.files` in a single commit.
    async fn commit_files(
        &self,
        repo: &RepoRef,
        request: &CommitRequest,
    ) -> Result<(), ContentStoreError>;

    /// Open a pull request from `options.head` into `options.base`.
    async fn open_pull_request(
        &self,
        repo: &RepoRef,
        options: &PullRequestOptions,
    ) -> Result<PullRequestRef, ContentStoreError>;

    /// Merge an open pull request.
    async fn merge_pull_request(
        &self,
        repo: &RepoRef,
        pull_request: PullRequestRef,
        style: MergeStyle,
    ) -> Result<(), ContentStoreError>;

    /// Close an open pull request without merging.
    async fn close_pull_request(
        &self,
        repo: &RepoRef,
        pull_request: PullRequestRef,
    ) -> Result<(), ContentStoreError>;
}
