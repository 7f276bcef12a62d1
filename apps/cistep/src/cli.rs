//! Command line interface definition

use clap::{Parser, Subcommand};
use cistep_types::ColorChoice;
use std::path::PathBuf;

/// cistep - Resolve and run CI source checkout steps
#[derive(Parser)]
#[command(name = "cistep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve and run CI source checkout steps")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Color output control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show the name and description a step would report
    Describe {
        /// Step definition (TOML)
        step: PathBuf,

        /// Show the description used once the step has finished
        #[arg(long)]
        done: bool,
    },

    /// List the variants a backend registers under an attribute group
    Members {
        /// Backend name
        backend: String,

        /// Attribute group (all groups when omitted)
        group: Option<String>,
    },

    /// Resolve a step against a build and run its backend
    Run {
        /// Step definition (TOML)
        step: PathBuf,

        /// Build description with source stamps and properties (TOML)
        #[arg(long, value_name = "PATH")]
        build: Option<PathBuf>,

        /// Override the step's default branch
        #[arg(long)]
        branch: Option<String>,
    },
}
