//! Configuration management for snapfetch
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use snapfetch::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Running {} workers", config.dispatcher.workers);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `SNAPFETCH__<section>__<key>`
//!
//! Examples:
//! - `SNAPFETCH__DISPATCHER__WORKERS=8`
//! - `SNAPFETCH__CACHE__MEMORY_BYTES=128MB`
//! - `SNAPFETCH__NETWORK__USER_AGENT=my-app/1.0`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/snapfetch.toml`.
//! This can be overridden using the `SNAPFETCH_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{
    CacheConfig, Config, DecodeConfig, DispatcherConfig, HandlersConfig, NetworkConfig,
};
pub use validation::ValidationError;

use std::time::Duration;
use thiserror::Error;

use crate::handlers::{DecodeOptions, TierPolicy};
use crate::transform::TransformOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a value
    /// fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Check a config assembled in code rather than loaded.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }

    pub fn tier_policy(&self) -> TierPolicy {
        let [micro_w, micro_h] = self.handlers.micro_max;
        let [mini_w, mini_h] = self.handlers.mini_max;
        TierPolicy::new((micro_w, micro_h), (mini_w, mini_h))
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_alloc: Some(self.decode.max_alloc.as_u64()),
            default_format: self.decode.pixel_format,
        }
    }

    /// Rendered outputs share the decode allocation budget.
    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            max_alloc: Some(self.decode.max_alloc.as_u64()),
        }
    }
}

impl DispatcherConfig {
    /// Delay before the given retry attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}
