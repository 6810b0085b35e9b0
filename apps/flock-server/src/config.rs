//! Server configuration module.
//!
//! Supports configuration via environment variables:
//!
//! ```bash
//! # Base URL stamped onto stored asset URLs
//! FLOCK_ASSET_BASE_URL=https://assets.flock.example
//!
//! # Upper bound on images per post proposal
//! FLOCK_MAX_POST_IMAGES=6
//! ```

use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid FLOCK_MAX_POST_IMAGES: {0}")]
    InvalidMaxPostImages(String),
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL for stored assets.
    pub asset_base_url: String,
    /// Maximum number of images accepted per post proposal.
    pub max_post_images: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            asset_base_url: "https://assets.flock.local".to_string(),
            max_post_images: 6,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = env::var("FLOCK_ASSET_BASE_URL") {
            config.asset_base_url = url;
        }
        if let Ok(raw) = env::var("FLOCK_MAX_POST_IMAGES") {
            config.max_post_images = raw
                .parse()
                .map_err(|_| ConfigError::InvalidMaxPostImages(raw))?;
        }

        Ok(config)
    }
}
