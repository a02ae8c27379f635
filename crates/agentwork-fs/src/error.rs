//! Error types for the filesystem store.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Work item not found.
    #[error("work item not found: {0}")]
    NotFound(String),

    /// The request broke a creation, transition or session rule.
    #[error(transparent)]
    Validation(#[from] agentwork_core::CoreError),

    /// Delete refused because other items name this one as parent.
    #[error("work item {id} still has {children} child item(s)")]
    HasChildren { id: String, children: usize },

    /// IO error while locking, reading or writing the index.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Filesystem watch error.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// Watching was requested outside a tokio runtime.
    #[error("watching requires a running tokio runtime")]
    NoRuntime,
}

impl StoreError {
    /// Whether the request was rejected before anything was changed.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::HasChildren { .. })
    }
}
