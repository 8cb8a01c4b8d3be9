use clap::{Parser, Subcommand};

use crate::ingest::TaskName;

/// Congress.gov ingestion service and read API
#[derive(Parser, Debug)]
#[command(name = "repcheck", version, about, long_about = None)]
pub struct Args {
    /// Log formatter to use
    #[arg(long, value_enum, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the web server and the scheduler (default)
    Serve,
    /// Run one ingestion task now and exit
    Run {
        #[arg(value_enum)]
        task: TaskName,
        /// Rewrite cached datasets even when unchanged
        #[arg(long)]
        force: bool,
    },
    /// Clear the processed flag on members missing detail or memberships
    Sweep,
    /// Create any missing sessions up to the current one
    SeedSessions,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable output for development
    Pretty,
    /// One JSON object per line
    Json,
}

/// Pretty in debug builds, JSON in release builds.
fn default_tracing_format() -> TracingFormat {
    if cfg!(debug_assertions) {
        TracingFormat::Pretty
    } else {
        TracingFormat::Json
    }
}
