//! Error types for Astrolabe layout operations.
//!
//! This module provides the main error type [`LayoutError`] which wraps the
//! failure conditions a layout, manager or connector can report.

use thiserror::Error;

use astrolabe_core::graph::GraphError;

/// The main error type for layout operations.
///
/// Missing node or edge ids referenced by constraints and connections are not
/// errors: they are skipped where they are encountered.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("unknown layout '{0}'")]
    UnknownLayout(String),

    #[error("invalid value for option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },

    #[error("force worker failure: {0}")]
    Worker(String),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
}

impl LayoutError {
    /// Create a new `InvalidOption` error.
    pub fn invalid_option(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
