//! HTTP-level integration tests for the `/courses` endpoints.
//!
//! Uses Axum's tower::ServiceExt to send requests directly to the router
//! without an actual TCP listener. The content store is in memory.

mod common;

use axum::http::StatusCode;
use common::{
    body_json, get_auth, post_json_auth, reject_inserts, spawn_app, token, TEST_ORG, TRUNK,
};
use courseforge_content_store::memory::FailPoint;
use courseforge_core::types::DbId;
use courseforge_db::repositories::CourseRepo;
use sqlx::PgPool;

const OWNER: DbId = 10;

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_course_returns_201_and_initialises_repository(pool: PgPool) {
    let app = spawn_app(pool);
    let response = post_json_auth(
        app.app(),
        "/api/v1/courses",
        &token(OWNER, "user"),
        serde_json::json!({"name": "Rust 101", "description": "Ownership and borrowing"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["name"], "Rust 101");
    assert_eq!(json["data"]["creator_id"], OWNER.to_string());

    let id: DbId = json["data"]["id"].as_str().unwrap().parse().unwrap();
    let document = app
        .store
        .file(&app.repo(id), TRUNK, "course_data.json")
        .expect("structure document on trunk");
    let tree: serde_json::Value = serde_json::from_str(&document).unwrap();
    assert_eq!(tree["containers"], serde_json::json!([]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_course_validates_before_touching_the_store(pool: PgPool) {
    let app = spawn_app(pool);
    let response = post_json_auth(
        app.app(),
        "/api/v1/courses",
        &token(OWNER, "user"),
        serde_json::json!({"name": "   ", "description": "x"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert_eq!(app.store.commit_count(), 0);

    let long_name = "n".repeat(51);
    let response = post_json_auth(
        app.app(),
        "/api/v1/courses",
        &token(OWNER, "user"),
        serde_json::json!({"name": long_name, "description": "x"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_course_store_outage_persists_nothing(pool: PgPool) {
    let app = spawn_app(pool.clone());
    app.store.fail(FailPoint::CreateRepository);

    let response = post_json_auth(
        app.app(),
        "/api/v1/courses",
        &token(OWNER, "user"),
        serde_json::json!({"name": "Rust 101", "description": "x"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "CONTENT_STORE_ERROR");

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM courses")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_course_initial_commit_failure_is_partial(pool: PgPool) {
    let app = spawn_app(pool);
    app.store.fail(FailPoint::CommitFiles);

    let response = post_json_auth(
        app.app(),
        "/api/v1/courses",
        &token(OWNER, "user"),
        serde_json::json!({"name": "Rust 101", "description": "x"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "CONTENT_STORE_PARTIAL");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_course_unrecorded_repository_is_partially_committed(pool: PgPool) {
    let app = spawn_app(pool.clone());
    reject_inserts(&pool, "courses").await;

    let response = post_json_auth(
        app.app(),
        "/api/v1/courses",
        &token(OWNER, "user"),
        serde_json::json!({"name": "Rust 101", "description": "x"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "PARTIALLY_COMMITTED");

    let details = &json["details"];
    assert!(details["branch_id"].is_null());
    assert!(details["pull_request"].is_null());

    // The repository exists with its structure document, but no course row.
    let repository = details["repository"].as_str().unwrap();
    let (owner, name) = repository.split_once('/').unwrap();
    assert_eq!(owner, TEST_ORG);
    let id: DbId = name.parse().unwrap();
    assert!(app
        .store
        .file(&app.repo(id), TRUNK, "course_data.json")
        .is_some());
    assert!(CourseRepo::find_by_id(&pool, id).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn get_course_returns_row_and_empty_tree(pool: PgPool) {
    let app = spawn_app(pool.clone());
    let id = common::create_course(&app, OWNER).await;

    let response = get_auth(
        app.app(),
        &format!("/api/v1/courses/{id}"),
        &token(99, "user"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["id"], id.to_string());
    assert_eq!(json["data"]["containers"], serde_json::json!([]));

    let stored = CourseRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(stored.creator_id, OWNER);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn get_unknown_course_returns_404(pool: PgPool) {
    let app = spawn_app(pool);
    let response = get_auth(app.app(), "/api/v1/courses/123456", &token(OWNER, "user")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Course with id 123456 not found");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn item_content_of_unknown_item_returns_404(pool: PgPool) {
    let app = spawn_app(pool);
    let id = common::create_course(&app, OWNER).await;

    let response = get_auth(
        app.app(),
        &format!("/api/v1/courses/{id}/items/42/content"),
        &token(OWNER, "user"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Item with id 42 not found");
}
