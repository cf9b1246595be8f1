//! Error type of the Astrolabe CLI.

use std::io;

use thiserror::Error;

use astrolabe::{LayoutError, graph::GraphError};

use crate::config::ConfigError;

/// Everything that can fail while running the CLI
#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The input file is not valid TOML or does not match the graph schema.
    #[error("invalid graph file '{path}': {err}")]
    Input {
        path: String,
        src: String,
        err: toml::de::Error,
    },

    /// The input parsed but describes something meaningless.
    #[error("invalid graph: {0}")]
    Invalid(String),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("failed to serialize output: {0}")]
    Output(#[from] toml::ser::Error),
}
