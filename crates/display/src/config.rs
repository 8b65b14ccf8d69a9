use std::time::Duration;

use crate::grid::{GridConfig, Viewport};
use crate::scheduler::{SchedulerConfig, DEFAULT_DWELL};

/// Display client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    /// Hub base URL, e.g. `http://127.0.0.1:5003`.
    pub hub_url: String,
    pub viewport: Viewport,
    pub grid: GridConfig,
    pub dwell: Duration,
}

impl DisplayConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default                 |
    /// |----------------------|-------------------------|
    /// | `HUB_URL`            | `http://127.0.0.1:5003` |
    /// | `VIEWPORT_WIDTH`     | `1920`                  |
    /// | `VIEWPORT_HEIGHT`    | `1080`                  |
    /// | `IMAGE_SIZE`         | `250`                   |
    /// | `IMAGE_MARGIN`       | `30`                    |
    /// | `DISPLAY_MAX_IMAGES` | `18`                    |
    /// | `PREVIEW_DWELL_MS`   | `2000`                  |
    pub fn from_env() -> Self {
        let hub_url = std::env::var("HUB_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5003".into())
            .trim_end_matches('/')
            .to_string();

        let defaults = GridConfig::default();

        Self {
            hub_url,
            viewport: Viewport {
                width: env_or("VIEWPORT_WIDTH", 1920),
                height: env_or("VIEWPORT_HEIGHT", 1080),
            },
            grid: GridConfig {
                image_size: env_or("IMAGE_SIZE", defaults.image_size),
                margin: env_or("IMAGE_MARGIN", defaults.margin),
                max_images: env_or("DISPLAY_MAX_IMAGES", defaults.max_images),
            },
            dwell: Duration::from_millis(env_or(
                "PREVIEW_DWELL_MS",
                DEFAULT_DWELL.as_millis() as u64,
            )),
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            grid: self.grid,
            viewport: self.viewport,
            dwell: self.dwell,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
