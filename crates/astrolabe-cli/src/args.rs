//! Command-line argument definitions for the Astrolabe CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments control input/output paths, the layout to run,
//! configuration file selection, and logging verbosity.

use clap::Parser;

/// Command-line arguments for the Astrolabe layout tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input graph file
    #[arg(help = "Path to the input graph file (TOML)")]
    pub input: String,

    /// Path to the output positions file
    #[arg(short, long, default_value = "out.toml")]
    pub output: String,

    /// Layout to run in standard mode (grid, circular, force, ...)
    #[arg(short, long)]
    pub layout: Option<String>,

    /// Operating mode (standard, constraint, nested, adaptive, hybrid)
    #[arg(short, long)]
    pub mode: Option<String>,

    /// How long continuous layouts run after the transition, in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub settle_ms: u64,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
