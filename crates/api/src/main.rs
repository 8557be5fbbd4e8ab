use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use courseforge_content_store::{ContentStore, GiteaStore, MemoryContentStore};
use courseforge_core::ids::SnowflakeAllocator;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courseforge_api::config::ServerConfig;
use courseforge_api::engine::{CourseEngine, EngineSettings};
use courseforge_api::router::build_app_router;
use courseforge_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courseforge_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        machine_id = config.machine_id,
        "Loaded server configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = courseforge_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    courseforge_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    courseforge_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Content store ---
    let store_config = &config.content_store;
    let store: Arc<dyn ContentStore> = match &store_config.url {
        Some(url) => {
            let store = GiteaStore::new(
                url,
                store_config.token.clone(),
                Duration::from_secs(store_config.timeout_secs),
            )
            .expect("Failed to build content store client");
            tracing::info!(%url, org = %store_config.org, "Using Gitea content store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("CONTENT_STORE_URL not set, using in-memory content store");
            Arc::new(MemoryContentStore::new())
        }
    };

    // --- Id allocator ---
    let ids = SnowflakeAllocator::new(config.machine_id).expect("Invalid MACHINE_ID");

    // --- App state ---
    let engine = CourseEngine::new(
        pool.clone(),
        store,
        Arc::new(ids),
        EngineSettings::from(store_config),
    );
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        engine,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
