//! Normalization settings: target size and encode quality.
//!
//! These live in the shared settings JSON file next to unrelated keys
//! (`IP`, `PORT`, ...), which are ignored here.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default target width in pixels.
pub const DEFAULT_RESIZE_WIDTH: u32 = 720;

/// Default target height in pixels.
pub const DEFAULT_RESIZE_HEIGHT: u32 = 720;

/// Default encode quality (1-100).
pub const DEFAULT_IMAGE_QUALITY: u8 = 100;

/// Largest accepted target edge in pixels.
pub const MAX_DIMENSION: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeSettings {
    #[serde(default = "default_width")]
    pub resize_width: u32,
    #[serde(default = "default_height")]
    pub resize_height: u32,
    #[serde(default = "default_quality")]
    pub image_quality: u8,
}

fn default_width() -> u32 {
    DEFAULT_RESIZE_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_RESIZE_HEIGHT
}

fn default_quality() -> u8 {
    DEFAULT_IMAGE_QUALITY
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            resize_width: DEFAULT_RESIZE_WIDTH,
            resize_height: DEFAULT_RESIZE_HEIGHT,
            image_quality: DEFAULT_IMAGE_QUALITY,
        }
    }
}

impl NormalizeSettings {
    /// Reject zero or oversized dimensions and out-of-range quality.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, value) in [
            ("resize_width", self.resize_width),
            ("resize_height", self.resize_height),
        ] {
            if value == 0 || value > MAX_DIMENSION {
                return Err(CoreError::Validation(format!(
                    "{name} must be between 1 and {MAX_DIMENSION}, got {value}"
                )));
            }
        }
        if !(1..=100).contains(&self.image_quality) {
            return Err(CoreError::Validation(format!(
                "image_quality must be between 1 and 100, got {}",
                self.image_quality
            )));
        }
        Ok(())
    }
}
