use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use courseforge_content_store::ContentStoreError;
use courseforge_core::error::CoreError;
use courseforge_db::models::status::RevisionStatus;
use serde_json::{json, Value};

use crate::engine::{RevisionError, StorePhase};

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`RevisionError`] for engine
/// failures, and adds HTTP-specific variants. Implements [`IntoResponse`]
/// to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `courseforge_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A failure inside the revision engine.
    #[error(transparent)]
    Revision(#[from] RevisionError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

type Classified = (StatusCode, &'static str, String);

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, code, message) = match &self {
            // --- Domain errors ---
            AppError::Core(core) => classify_core_error(core),

            // --- Engine errors ---
            AppError::Revision(err) => {
                details = revision_details(err);
                classify_revision_error(err)
            }

            // --- Database errors ---
            AppError::Database(err) => classify_sqlx_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> Classified {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        INTERNAL_MESSAGE.to_string(),
    )
}

fn classify_core_error(core: &CoreError) -> Classified {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            internal()
        }
    }
}

/// Classify an engine error.
///
/// - Content-store failures before anything was written map to 502, or 504
///   when the store timed out. The caller may retry.
/// - Content-store failures after a write map to 502 `CONTENT_STORE_PARTIAL`.
/// - Writes that reached the content store but not the database, and
///   database transitions the pull request could not follow, map to 500
///   with a dedicated code and identifying details.
fn classify_revision_error(err: &RevisionError) -> Classified {
    match err {
        RevisionError::Core(core) => classify_core_error(core),
        RevisionError::Database(db) => classify_sqlx_error(db),
        RevisionError::ContentStore {
            phase: StorePhase::BeforeCommit,
            source: ContentStoreError::Timeout,
        } => {
            tracing::warn!("Content store timed out");
            (
                StatusCode::GATEWAY_TIMEOUT,
                "CONTENT_STORE_TIMEOUT",
                "The content store did not respond in time".to_string(),
            )
        }
        RevisionError::ContentStore {
            phase: StorePhase::BeforeCommit,
            source,
        } => {
            tracing::warn!(error = %source, "Content store request failed");
            (
                StatusCode::BAD_GATEWAY,
                "CONTENT_STORE_ERROR",
                "The content store rejected the request".to_string(),
            )
        }
        RevisionError::ContentStore {
            phase: StorePhase::AfterCommit,
            source,
        } => {
            tracing::error!(error = %source, "Content store failed after partial write");
            (
                StatusCode::BAD_GATEWAY,
                "CONTENT_STORE_PARTIAL",
                "The content store accepted part of the change and then failed".to_string(),
            )
        }
        RevisionError::PartiallyCommitted { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "PARTIALLY_COMMITTED",
            "Content was stored but could not be recorded".to_string(),
        ),
        RevisionError::Diverged { status, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            match status {
                RevisionStatus::Closed => "CLOSE_DIVERGED",
                _ => "MERGE_DIVERGED",
            },
            format!(
                "Revision is {} but its pull request could not be updated",
                status.label()
            ),
        ),
    }
}

fn revision_details(err: &RevisionError) -> Option<Value> {
    match err {
        RevisionError::PartiallyCommitted {
            repository,
            branch_id,
            pull_request,
            ..
        } => Some(json!({
            "repository": repository,
            "branch_id": branch_id.map(|id| id.to_string()),
            "pull_request": pull_request,
        })),
        RevisionError::Diverged {
            revision_id,
            pull_request,
            ..
        } => Some(json!({
            "revision_id": revision_id.to_string(),
            "pull_request": pull_request,
        })),
        _ => None,
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> Classified {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
