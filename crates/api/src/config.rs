use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running the hub from the project
/// directory. Override via environment variables (or a `.env` file).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Preferred bind port (default: `5003`). If taken, an OS-assigned
    /// port is used instead.
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    /// A single `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Directory holding normalized doodle images.
    pub doodle_dir: PathBuf,
    /// URI prefix under which `doodle_dir` is served.
    pub public_prefix: String,
    /// Cap for the latest-doodles snapshot (default: `18`).
    pub max_images: usize,
    /// Settings JSON file read for every submission.
    pub settings_path: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                 |
    /// |------------------------|-------------------------|
    /// | `HOST`                 | `0.0.0.0`               |
    /// | `PORT`                 | `5003`                  |
    /// | `CORS_ORIGINS`         | `*`                     |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                    |
    /// | `DOODLE_DIR`           | `static/doodles`        |
    /// | `PUBLIC_PREFIX`        | `/static/doodles`       |
    /// | `MAX_IMAGES`           | `18`                    |
    /// | `SETTINGS_PATH`        | `static/js/config.json` |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5003".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let doodle_dir = std::env::var("DOODLE_DIR")
            .unwrap_or_else(|_| "static/doodles".into())
            .into();

        let public_prefix = std::env::var("PUBLIC_PREFIX")
            .unwrap_or_else(|_| "/static/doodles".into())
            .trim_end_matches('/')
            .to_string();

        let max_images: usize = std::env::var("MAX_IMAGES")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(doodlewall_core::store::DEFAULT_LATEST_LIMIT);

        let settings_path = std::env::var("SETTINGS_PATH")
            .unwrap_or_else(|_| "static/js/config.json".into())
            .into();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            doodle_dir,
            public_prefix,
            max_images,
            settings_path,
        }
    }

    /// Whether CORS should allow any origin.
    pub fn cors_allows_any(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}
