//! Error types for the hierarchy engine
//!
//! Two layers:
//! - [`FetchError`]: what a data source reports for one list call
//! - [`HierarchyError`]: what the controller records or rejects

use hier_model::{Level, NodeId};

/// Failure of a single list call against the data service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Session missing or rejected by the service
    #[error("unauthorized")]
    Unauthorized,

    /// Service could not be reached (network down, timeout)
    #[error("service unreachable: {0}")]
    Unreachable(String),

    /// Service answered with a server-side failure
    #[error("server fault: {0}")]
    ServerFault(String),
}

impl FetchError {
    /// Whether the error means "no session" rather than a broken request
    #[inline]
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Timeout after `secs` seconds
    #[inline]
    #[must_use]
    pub fn timed_out(secs: f64) -> Self {
        Self::Unreachable(format!("timed out after {secs:.1}s"))
    }
}

/// Controller-level error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    /// Requested entity is not part of the level's current collection
    #[error("invalid {level} selection: {id} is not in the current collection")]
    InvalidSelection { level: Level, id: NodeId },

    /// Loading a level failed; the level and everything below stay empty
    #[error("failed to load {level} list: {cause}")]
    FetchFailed { level: Level, cause: FetchError },
}

impl HierarchyError {
    /// Level the error belongs to
    #[inline]
    #[must_use]
    pub fn level(&self) -> Level {
        match self {
            Self::InvalidSelection { level, .. } | Self::FetchFailed { level, .. } => *level,
        }
    }

    /// Whether re-selecting the parent or refreshing may clear the error
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed {
                cause: FetchError::Unreachable(_) | FetchError::ServerFault(_),
                ..
            }
        )
    }
}

/// Error submitting a request through a [`crate::RequestHandle`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// The request loop has stopped
    #[error("hierarchy controller is no longer accepting requests")]
    Closed,

    /// The controller rejected the request
    #[error(transparent)]
    Rejected(#[from] HierarchyError),
}

/// Error loading configuration or dataset files
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
