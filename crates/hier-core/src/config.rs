//! Controller configuration

use crate::error::ConfigError;
use hier_model::PathStyle;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// What `refresh` does with the selections made before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Keep each selected id if the reloaded list still contains it,
    /// otherwise fall back to the first item
    #[default]
    PreserveIfPresent,
    /// Always re-select the first item at every level
    ResetToFirst,
}

/// Hierarchy controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Selection handling on refresh
    pub refresh_policy: RefreshPolicy,
    /// Breadcrumb rendering
    pub path: PathStyle,
    /// Per-fetch timeout in milliseconds; `None` waits indefinitely
    pub fetch_timeout_ms: Option<u64>,
    /// Capacity of the consumer request channel
    pub request_buffer: usize,
}

impl HierarchyConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With refresh policy
    #[inline]
    #[must_use]
    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    /// With fetch timeout
    #[inline]
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// With breadcrumb style
    #[inline]
    #[must_use]
    pub fn with_path_style(mut self, style: PathStyle) -> Self {
        self.path = style;
        self
    }

    /// Fetch timeout as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.map(Duration::from_millis)
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// - `ConfigError::Toml` on malformed input
    /// - `ConfigError::Invalid` when a value is out of range
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Same as [`HierarchyConfig::from_toml_str`], plus `ConfigError::Io`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_buffer == 0 {
            return Err(ConfigError::Invalid(
                "request_buffer must be at least 1".to_string(),
            ));
        }
        if self.fetch_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "fetch_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            refresh_policy: RefreshPolicy::PreserveIfPresent,
            path: PathStyle::default(),
            fetch_timeout_ms: None,
            request_buffer: 64,
        }
    }
}
