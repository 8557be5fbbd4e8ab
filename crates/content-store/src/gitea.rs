//! HTTP client for a Gitea-compatible content store.
//!
//! Wraps the repository, contents and pull-request endpoints of the
//! `/api/v1` REST API using [`reqwest`]. Every request carries the API token
//! and is bounded by the client-wide timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    encoding, CommitRequest, ContentStore, ContentStoreError, CreateRepository, FileOperation,
    Identity, MergeStyle, PullRequestOptions, PullRequestRef, RepoRef,
};

/// HTTP client for a single Gitea server.
pub struct GiteaStore {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

/// File body returned by `GET /repos/{owner}/{repo}/contents/{path}`.
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: Option<String>,
}

/// Pull request returned by `POST /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    number: i64,
}

#[derive(Debug, Serialize)]
struct ChangeFilesBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_branch: Option<&'a str>,
    author: &'a Identity,
    committer: &'a Identity,
    message: &'a str,
    files: Vec<ChangeFileBody<'a>>,
}

#[derive(Debug, Serialize)]
struct ChangeFileBody<'a> {
    operation: FileOperation,
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

impl GiteaStore {
    /// Create a client for the server at `base_url` (e.g. `https://git.example.com`).
    pub fn new(
        base_url: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ContentStoreError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, token))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: &str, token: impl Into<String>) -> Self {
        Self {
            client,
            api_url: format!("{}/api/v1", base_url.trim_end_matches('/')),
            token: token.into(),
        }
    }

    fn repo_url(&self, repo: &RepoRef) -> String {
        format!("{}/repos/{}/{}", self.api_url, repo.owner, repo.name)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("Authorization", format!("token {}", self.token))
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ContentStoreError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ContentStoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ContentStoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ContentStoreError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ContentStoreError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for GiteaStore {
    async fn create_repository(
        &self,
        owner: &str,
        options: &CreateRepository,
    ) -> Result<(), ContentStoreError> {
        let response = self
            .authorized(self.client.post(format!("{}/orgs/{owner}/repos", self.api_url)))
            .json(options)
            .send()
            .await?;

        Self::check_status(response).await
    }

    async fn get_file(
        &self,
        repo: &RepoRef,
        git_ref: &str,
        path: &str,
    ) -> Result<String, ContentStoreError> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/contents/{path}", self.repo_url(repo)))
                    .query(&[("ref", git_ref)]),
            )
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ContentStoreError::NotFound {
                path: format!("{repo}@{git_ref}:{path}"),
            });
        }

        let contents: ContentsResponse = Self::parse_response(response).await?;
        encoding::decode(contents.content.as_deref().unwrap_or_default())
    }

    async fn commit_files(
        &self,
        repo: &RepoRef,
        request: &CommitRequest,
    ) -> Result<(), ContentStoreError> {
        let body = ChangeFilesBody {
            branch: request.branch.as_deref(),
            new_branch: request.new_branch.as_deref(),
            author: &request.author,
            committer: &request.committer,
            message: &request.message,
            files: request
                .files
                .iter()
                .map(|f| ChangeFileBody {
                    operation: f.operation,
                    path: &f.path,
                    content: f.content.as_deref().map(encoding::encode),
                })
                .collect(),
        };

        let response = self
            .authorized(self.client.post(format!("{}/contents", self.repo_url(repo))))
            .json(&body)
            .send()
            .await?;

        Self::check_status(response).await?;
        tracing::debug!(%repo, files = request.files.len(), "Committed files to content store");
        Ok(())
    }

    async fn open_pull_request(
        &self,
        repo: &RepoRef,
        options: &PullRequestOptions,
    ) -> Result<PullRequestRef, ContentStoreError> {
        let response = self
            .authorized(self.client.post(format!("{}/pulls", self.repo_url(repo))))
            .json(options)
            .send()
            .await?;

        let pr: PullRequestResponse = Self::parse_response(response).await?;
        Ok(PullRequestRef { number: pr.number })
    }

    async fn merge_pull_request(
        &self,
        repo: &RepoRef,
        pull_request: PullRequestRef,
        style: MergeStyle,
    ) -> Result<(), ContentStoreError> {
        let response = self
            .authorized(self.client.post(format!(
                "{}/pulls/{}/merge",
                self.repo_url(repo),
                pull_request.number
            )))
            .json(&serde_json::json!({ "Do": style.as_str() }))
            .send()
            .await?;

        Self::check_status(response).await
    }

    async fn close_pull_request(
        &self,
        repo: &RepoRef,
        pull_request: PullRequestRef,
    ) -> Result<(), ContentStoreError> {
        let response = self
            .authorized(self.client.patch(format!(
                "{}/pulls/{}",
                self.repo_url(repo),
                pull_request.number
            )))
            .json(&serde_json::json!({ "state": "closed" }))
            .send()
            .await?;

        Self::check_status(response).await
    }
}
