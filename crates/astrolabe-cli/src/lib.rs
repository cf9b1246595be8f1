//! CLI logic for the Astrolabe layout tool.
//!
//! Reads a TOML graph file, lays it out, routes its connections and writes the
//! resulting positions and paths as TOML.

pub mod error_adapter;

mod args;
mod config;
mod error;
mod graph_file;

pub use args::Args;
pub use error::CliError;

use std::{fs, time::Duration};

use log::info;

use astrolabe::{LayoutBuilder, LayoutRequest, manager::LayoutMode};

use graph_file::{GraphFile, LayoutOutput};

/// Run the Astrolabe CLI application
///
/// # Errors
///
/// Returns `CliError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Malformed graph files
/// - Layout errors
pub fn run(args: &Args) -> Result<(), CliError> {
    info!(
        input_path = args.input,
        output_path = args.output;
        "Processing graph"
    );

    let app_config = config::load_config(args.config.as_ref())?;

    let source = fs::read_to_string(&args.input)?;
    let file = GraphFile::parse(&args.input, &source)?;
    let mut graph = file.build_graph()?;

    let mode = args
        .mode
        .as_deref()
        .map(str::parse::<LayoutMode>)
        .transpose()
        .map_err(CliError::Invalid)?;
    let request = LayoutRequest {
        layout: args.layout.clone(),
        mode,
        settle: Duration::from_millis(args.settle_ms),
    };

    let builder = LayoutBuilder::new(app_config);
    let mode = builder.layout(&mut graph, &request)?;

    let mut connector = builder.connector();
    file.route(&graph, &mut connector)?;

    let output = LayoutOutput::new(mode, &graph, &connector).to_toml()?;
    fs::write(&args.output, output)?;

    info!(output_file = args.output, mode = mode.name(); "Layout exported successfully");

    Ok(())
}
