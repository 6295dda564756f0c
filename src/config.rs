//! # Configuration Management
//!
//! Centralized configuration for the interceptor.
//!
//! This module holds the reserved pipeline stage names, the priority-ordered
//! anchor list used for stage placement, and the runtime configuration
//! structure loadable from TOML files or environment variables.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Stage Names
//! All pipeline lookups use the named constants below rather than ad-hoc
//! strings, so a rename stays a one-line change and the reserved names can
//! never drift apart between injection and removal paths.

use crate::error::{InterceptError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Name of the accept-handling stage installed on listening channels.
pub const CONNECTION_HANDLER_NAME: &str = "interceptor-connection-handler";

/// Name of the per-connection decoder stage.
pub const DECODER_NAME: &str = "interceptor-decoder";

/// Name of the per-connection encoder stage.
pub const ENCODER_NAME: &str = "interceptor-encoder";

/// Priority-ordered names of third-party stages the interceptor is known to
/// cooperate with. Placement scans this list in order and inserts directly
/// after the first stage found present; see `core::positioner`.
pub const DEFAULT_ANCHOR_STAGES: &[&str] = &[
    "proxy-forwarding-handler",
    "geo-gate-init",
    "vanilla-pipeline-head",
];

/// Max allowed frame size (e.g. 8 MB). Length claims above this are rejected
/// before any allocation happens.
pub const MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// Main configuration structure for an interceptor instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterceptorConfig {
    /// Anchor stage names, highest priority first. Replaces
    /// [`DEFAULT_ANCHOR_STAGES`] when customized.
    #[serde(default = "default_anchors")]
    pub anchor_stages: Vec<String>,

    /// Upper bound on a single frame's byte length.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,

    /// Whether late-bind catch-up runs over connections that were already
    /// open at `inject()` time.
    #[serde(default = "default_true")]
    pub catch_up_existing: bool,

    /// Whether already-open connections sharing a newly instrumented
    /// listener's local address are closed as stale duplicates.
    #[serde(default = "default_true")]
    pub close_duplicate_connections: bool,
}

fn default_anchors() -> Vec<String> {
    DEFAULT_ANCHOR_STAGES.iter().map(|s| s.to_string()).collect()
}

fn default_max_frame_size() -> usize {
    MAX_FRAME_SIZE
}

fn default_true() -> bool {
    true
}

impl Default for InterceptorConfig {
    fn default() -> Self {
        Self {
            anchor_stages: default_anchors(),
            max_frame_size: MAX_FRAME_SIZE,
            catch_up_existing: true,
            close_duplicate_connections: true,
        }
    }
}

impl InterceptorConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| InterceptError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| InterceptError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| InterceptError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(anchors) = std::env::var("INTERCEPTOR_ANCHOR_STAGES") {
            config.anchor_stages = anchors
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(size) = std::env::var("INTERCEPTOR_MAX_FRAME_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.max_frame_size = val;
            }
        }

        if let Ok(flag) = std::env::var("INTERCEPTOR_CATCH_UP_EXISTING") {
            if let Ok(val) = flag.parse::<bool>() {
                config.catch_up_existing = val;
            }
        }

        if let Ok(flag) = std::env::var("INTERCEPTOR_CLOSE_DUPLICATES") {
            if let Ok(val) = flag.parse::<bool>() {
                config.close_duplicate_connections = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| InterceptError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| InterceptError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_frame_size == 0 {
            errors.push("max_frame_size must be greater than zero".to_string());
        }

        if self.max_frame_size > 64 * 1024 * 1024 {
            errors.push(format!(
                "max_frame_size {} exceeds the 64MB sanity ceiling",
                self.max_frame_size
            ));
        }

        for name in &self.anchor_stages {
            if name.is_empty() {
                errors.push("anchor_stages contains an empty stage name".to_string());
            }
            if name == CONNECTION_HANDLER_NAME || name == DECODER_NAME || name == ENCODER_NAME {
                errors.push(format!("anchor stage '{name}' collides with a reserved name"));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for name in &self.anchor_stages {
            if !seen.insert(name) {
                errors.push(format!("duplicate anchor stage '{name}'"));
            }
        }

        errors
    }
}
