use std::env;
use std::str::FromStr;

/// Which side of the sync this instance plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRole {
    /// Authoritative store, accepts pushes and serves the change feed
    Server,
    /// On-device backend: journals local changes and reconciles with a server
    Client,
}

impl SyncRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncRole::Server => "server",
            SyncRole::Client => "client",
        }
    }
}

impl FromStr for SyncRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "server" => Ok(SyncRole::Server),
            "client" | "device" | "mobile" => Ok(SyncRole::Client),
            other => Err(format!("Unknown SYNC_ROLE: {}", other)),
        }
    }
}

/// Connection details of the remote server, only used in the client role.
#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub profile: String,
    pub sync_role: SyncRole,
    pub remote: Option<RemoteConfig>,
    pub sync_interval_secs: u64,
    pub sync_batch_size: u64,
    pub seed_demo: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let profile = env::var("PROFILE").unwrap_or_else(|_| "default".to_string());

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| {
            if profile == "default" {
                "sqlite://stockroute.db?mode=rwc".to_string()
            } else {
                format!("sqlite://stockroute_{}.db?mode=rwc", profile)
            }
        });

        let sync_role = match env::var("SYNC_ROLE") {
            Ok(value) => value.parse().unwrap_or_else(|e: String| {
                tracing::warn!("{}, falling back to server role", e);
                SyncRole::Server
            }),
            Err(_) => SyncRole::Server,
        };

        let remote = match (
            env::var("REMOTE_URL"),
            env::var("REMOTE_USERNAME"),
            env::var("REMOTE_PASSWORD"),
        ) {
            (Ok(url), Ok(username), Ok(password)) if !url.trim().is_empty() => {
                Some(RemoteConfig {
                    url: url.trim().trim_end_matches('/').to_string(),
                    username,
                    password,
                })
            }
            _ => None,
        };

        Self {
            database_url,
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(Vec::new),
            profile,
            sync_role,
            remote,
            sync_interval_secs: env::var("SYNC_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(60),
            sync_batch_size: env::var("SYNC_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(100),
            seed_demo: env::var("SEED_DEMO").is_ok(),
        }
    }
}

impl Default for Config {
    /// In-memory server configuration, used by tests and embedding callers.
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
            profile: "default".to_string(),
            sync_role: SyncRole::Server,
            remote: None,
            sync_interval_secs: 60,
            sync_batch_size: 100,
            seed_demo: false,
        }
    }
}
