//! Command line interface built on clap.
//!
//! Defines [`Cli`] with the [`Command`] subcommands (run, validate, lookup, demo)
//! and the global flags (--config, --targets, --verbose).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Observatory state machine runner.
#[derive(Debug, Parser)]
#[command(name = "observatory-fsm", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file (default: ./observatory.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Number of targets the simulated observatory observes.
    #[arg(long, global = true)]
    pub targets: Option<u32>,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Which state table to use.
#[derive(Debug, Clone, Args)]
pub struct TableArgs {
    /// Table name, resolved under `<root>/resources/state_table/`.
    #[arg(long, conflicts_with = "file")]
    pub table: Option<String>,

    /// Explicit path to a state table file.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a state table against the simulated observatory.
    Run {
        #[command(flatten)]
        table: TableArgs,

        /// Report the weather as unsafe.
        #[arg(long, default_value_t = false)]
        unsafe_weather: bool,
    },

    /// Check a state table's structure without running it. Conditions the
    /// simulator does not implement are listed, not rejected.
    Validate {
        #[command(flatten)]
        table: TableArgs,
    },

    /// Print the trigger that moves SOURCE to DEST.
    Lookup {
        #[command(flatten)]
        table: TableArgs,

        source: String,
        dest: String,
    },

    /// Run the built-in simple state table.
    Demo,
}
