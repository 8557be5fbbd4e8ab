use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Identifier allocator discriminator, `0..=1023` (default: `0`).
    /// Must differ between instances sharing a database.
    pub machine_id: u16,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
    /// Content store connection and repository layout.
    pub content_store: ContentStoreConfig,
}

/// Content store settings.
#[derive(Debug, Clone)]
pub struct ContentStoreConfig {
    /// Gitea base URL. `None` selects the in-memory store.
    pub url: Option<String>,
    /// API token sent as `Authorization: token ...`.
    pub token: String,
    /// Organisation owning every course repository.
    pub org: String,
    /// Trunk branch of every course repository.
    pub trunk: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Commit author email domain: `{user_id}@{domain}`.
    pub commit_email_domain: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `MACHINE_ID`           | `0`                        |
    ///
    /// See [`JwtConfig::from_env`] and [`ContentStoreConfig::from_env`] for
    /// the remaining variables.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let machine_id: u16 = std::env::var("MACHINE_ID")
            .unwrap_or_else(|_| "0".into())
            .parse()
            .expect("MACHINE_ID must be a valid u16");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            machine_id,
            jwt: JwtConfig::from_env(),
            content_store: ContentStoreConfig::from_env(),
        }
    }
}

impl ContentStoreConfig {
    /// Load content store settings from environment variables.
    ///
    /// | Env Var                      | Default                             |
    /// |------------------------------|-------------------------------------|
    /// | `CONTENT_STORE_URL`          | unset (in-memory store)             |
    /// | `CONTENT_STORE_TOKEN`        | empty                               |
    /// | `CONTENT_STORE_ORG`          | `courseforge`                       |
    /// | `CONTENT_STORE_TRUNK`        | `main`                              |
    /// | `CONTENT_STORE_TIMEOUT_SECS` | `15`                                |
    /// | `COMMIT_EMAIL_DOMAIN`        | `users.noreply.courseforge.local`   |
    pub fn from_env() -> Self {
        let url = std::env::var("CONTENT_STORE_URL")
            .ok()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        let timeout_secs: u64 = std::env::var("CONTENT_STORE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "15".into())
            .parse()
            .expect("CONTENT_STORE_TIMEOUT_SECS must be a valid u64");

        Self {
            url,
            token: std::env::var("CONTENT_STORE_TOKEN").unwrap_or_default(),
            org: std::env::var("CONTENT_STORE_ORG").unwrap_or_else(|_| "courseforge".into()),
            trunk: std::env::var("CONTENT_STORE_TRUNK").unwrap_or_else(|_| "main".into()),
            timeout_secs,
            commit_email_domain: std::env::var("COMMIT_EMAIL_DOMAIN")
                .unwrap_or_else(|_| "users.noreply.courseforge.local".into()),
        }
    }
}
