//! Engine error type.
//!
//! Every variant is recoverable: callers keep their previous layout or LOD
//! frame and carry on rendering.

use thiserror::Error;

/// Errors produced by hierarchy resolution, layout and LOD updates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Zero or multiple roots, duplicate ids, cycles, or an unresolved
    /// parent under the strict orphan policy.
    #[error("malformed hierarchy: {0}")]
    MalformedHierarchy(String),

    /// The snapshot contained no nodes to lay out.
    #[error("no root node in snapshot")]
    NoRootNode,

    /// The viewer position was non-finite and no previous frame exists.
    #[error("invalid viewer state: {0}")]
    InvalidViewerState(String),

    /// An engine configuration document could not be parsed.
    #[error("invalid config: {0}")]
    Config(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
