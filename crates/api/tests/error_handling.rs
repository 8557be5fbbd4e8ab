//! Tests for `AppError` → HTTP response mapping.
//!
//! These tests verify that each `AppError` variant produces the correct HTTP
//! status code, error code, and message. They do NOT need an HTTP server --
//! they call `IntoResponse` directly on `AppError` values.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use courseforge_api::engine::{RevisionError, StorePhase};
use courseforge_api::error::AppError;
use courseforge_content_store::ContentStoreError;
use courseforge_core::error::CoreError;
use courseforge_db::models::status::RevisionStatus;
use http_body_util::BodyExt;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

fn store_error(phase: StorePhase, source: ContentStoreError) -> AppError {
    AppError::Revision(RevisionError::ContentStore { phase, source })
}

// ---------------------------------------------------------------------------
// Domain errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Course",
        id: 42,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Course with id 42 not found");
    assert!(json.get("details").is_none());
}

#[tokio::test]
async fn conflict_error_returns_409() {
    let err = AppError::Core(CoreError::Conflict("Revision is already merged".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
    assert_eq!(json["error"], "Revision is already merged");
}

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("Course name must not be empty".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn forbidden_error_returns_403() {
    let err = AppError::Core(CoreError::Forbidden("not the creator".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");
}

#[tokio::test]
async fn unauthorized_error_returns_401() {
    let err = AppError::Core(CoreError::Unauthorized("no token provided".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn internal_error_returns_500_and_sanitizes_message() {
    let err = AppError::InternalError("secret database credentials leaked".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert!(!json.to_string().contains("secret"));
    assert_eq!(json["error"], "An internal error occurred");
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn core_errors_inside_the_engine_keep_their_mapping() {
    let err = AppError::Revision(RevisionError::Core(CoreError::NotFound {
        entity: "Revision",
        id: 7,
    }));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Revision with id 7 not found");
}

#[tokio::test]
async fn store_failure_before_commit_returns_502() {
    let err = store_error(
        StorePhase::BeforeCommit,
        ContentStoreError::Api {
            status: 500,
            body: "token=abc123".into(),
        },
    );

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["code"], "CONTENT_STORE_ERROR");
    assert!(!json.to_string().contains("abc123"));
}

#[tokio::test]
async fn store_timeout_before_commit_returns_504() {
    let err = store_error(StorePhase::BeforeCommit, ContentStoreError::Timeout);

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["code"], "CONTENT_STORE_TIMEOUT");
}

#[tokio::test]
async fn store_failure_after_commit_is_partial() {
    let err = store_error(StorePhase::AfterCommit, ContentStoreError::Timeout);

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["code"], "CONTENT_STORE_PARTIAL");
}

#[tokio::test]
async fn partially_committed_reports_identifiers() {
    let err = AppError::Revision(RevisionError::PartiallyCommitted {
        repository: "org/123".into(),
        branch_id: Some(9_007_199_254_740_993),
        pull_request: Some(4),
        source: sqlx::Error::PoolTimedOut,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "PARTIALLY_COMMITTED");
    assert_eq!(json["details"]["repository"], "org/123");
    assert_eq!(json["details"]["branch_id"], "9007199254740993");
    assert_eq!(json["details"]["pull_request"], 4);
}

#[tokio::test]
async fn diverged_code_follows_target_status() {
    let merged = AppError::Revision(RevisionError::Diverged {
        revision_id: 11,
        status: RevisionStatus::Merged,
        pull_request: 2,
        source: ContentStoreError::Unavailable("down".into()),
    });
    let (status, json) = error_to_response(merged).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "MERGE_DIVERGED");
    assert_eq!(json["details"]["revision_id"], "11");
    assert_eq!(json["details"]["pull_request"], 2);

    let closed = AppError::Revision(RevisionError::Diverged {
        revision_id: 12,
        status: RevisionStatus::Closed,
        pull_request: 3,
        source: ContentStoreError::Timeout,
    });
    let (_, json) = error_to_response(closed).await;
    assert_eq!(json["code"], "CLOSE_DIVERGED");
}

#[tokio::test]
async fn row_not_found_returns_404() {
    let err = AppError::Database(sqlx::Error::RowNotFound);

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}
