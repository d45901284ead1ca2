//! Command-line argument parsing for graphfuse

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// graphfuse - Pattern-driven operator fusion for inference graphs
#[derive(Parser, Debug)]
#[command(name = "graphfuse")]
#[command(author, version, about = "graphfuse - Pattern-driven operator fusion for inference graphs", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to config file (TOML format)
    ///
    /// If not specified, ./graphfuse.toml is used when present.
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print graph or optimization statistics
    #[arg(long, global = true)]
    pub stats: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Apply a single fusion rule
    Apply {
        /// Rule name (see `graphfuse rules`)
        #[arg(short, long)]
        rule: String,

        /// Input graph document (JSON)
        input: PathBuf,

        /// Output graph document (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the rule catalog until nothing changes
    Optimize {
        /// Input graph document (JSON)
        input: PathBuf,

        /// Output graph document (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum catalog passes (overrides config)
        #[arg(long)]
        max_passes: Option<usize>,
    },

    /// List the registered fusion rules
    Rules,

    /// Show statistics for a graph document
    Info {
        /// Input graph document (JSON)
        input: PathBuf,
    },

    /// Render a graph document as Graphviz DOT
    Dot {
        /// Input graph document (JSON)
        input: PathBuf,
    },

    /// Import a framework graph into a graph document
    Import {
        /// Framework graph (JSON)
        input: PathBuf,

        /// Output graph document (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        use tracing_subscriber::{fmt, EnvFilter};

        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}
