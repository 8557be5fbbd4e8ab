#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use courseforge_content_store::{MemoryContentStore, RepoRef};
use courseforge_core::ids::SnowflakeAllocator;
use courseforge_core::revision::repository_name;
use courseforge_core::types::DbId;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use courseforge_api::auth::jwt::{generate_access_token, JwtConfig};
use courseforge_api::config::{ContentStoreConfig, ServerConfig};
use courseforge_api::engine::{CourseEngine, EngineSettings};
use courseforge_api::router::build_app_router;
use courseforge_api::state::AppState;

pub const TEST_JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";
pub const TEST_ORG: &str = "courseforge-test";
pub const TRUNK: &str = "main";

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default),
/// a 30-second request timeout and the in-memory content store.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        machine_id: 1,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        },
        content_store: ContentStoreConfig {
            url: None,
            token: String::new(),
            org: TEST_ORG.to_string(),
            trunk: TRUNK.to_string(),
            timeout_secs: 5,
            commit_email_domain: "users.noreply.test".to_string(),
        },
    }
}

/// Router plus handles on its backing stores.
///
/// The router is cheap to clone; every request goes through the same state
/// so content written by one request is visible to the next.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryContentStore>,
    pub pool: PgPool,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Reference to the content repository of a course.
    pub fn repo(&self, course_id: DbId) -> RepoRef {
        RepoRef::new(TEST_ORG, repository_name(course_id))
    }
}

/// Build the full application router with all middleware layers over the
/// given pool and an in-memory content store.
pub fn spawn_app(pool: PgPool) -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryContentStore::new());
    let ids = SnowflakeAllocator::new(config.machine_id).unwrap();

    let engine = CourseEngine::new(
        pool.clone(),
        store.clone(),
        Arc::new(ids),
        EngineSettings::from(&config.content_store),
    );
    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        engine,
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        pool,
    }
}

/// Shorthand for tests that only need the router.
pub fn build_test_app(pool: PgPool) -> Router {
    spawn_app(pool).router
}

/// A valid access token for `user_id` with `role`.
pub fn token(user_id: DbId, role: &str) -> String {
    generate_access_token(user_id, role, &test_config().jwt).unwrap()
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Make every insert into `table` fail, so writes that follow a successful
/// content-store call can be broken from the database side.
pub async fn reject_inserts(pool: &PgPool, table: &str) {
    sqlx::query(
        "CREATE OR REPLACE FUNCTION reject_insert() RETURNS trigger AS $$
         BEGIN
             RAISE EXCEPTION 'inserts into % are disabled', TG_TABLE_NAME;
         END
         $$ LANGUAGE plpgsql",
    )
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(&format!(
        "CREATE TRIGGER reject_insert BEFORE INSERT ON {table}
         FOR EACH ROW EXECUTE FUNCTION reject_insert()"
    ))
    .execute(pool)
    .await
    .unwrap();
}

/// Create a course owned by `owner` and return its id.
pub async fn create_course(app: &TestApp, owner: DbId) -> DbId {
    let response = post_json_auth(
        app.app(),
        "/api/v1/courses",
        &token(owner, "user"),
        serde_json::json!({"name": "Rust 101", "description": "Ownership and borrowing"}),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    let json = body_json(response).await;
    json["data"]["id"].as_str().unwrap().parse().unwrap()
}

/// Submit `draft` as `user_id` and return the response.
pub async fn submit(
    app: &TestApp,
    course_id: DbId,
    user_id: DbId,
    draft: serde_json::Value,
) -> Response {
    post_json_auth(
        app.app(),
        &format!("/api/v1/courses/{course_id}/revisions"),
        &token(user_id, "user"),
        draft,
    )
    .await
}

/// Approve a revision as `user_id`.
pub async fn approve(
    app: &TestApp,
    course_id: DbId,
    revision_id: &str,
    user_id: DbId,
) -> Response {
    post_auth(
        app.app(),
        &format!("/api/v1/courses/{course_id}/revisions/{revision_id}/approve"),
        &token(user_id, "user"),
    )
    .await
}
