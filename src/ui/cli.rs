use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// kita - Local file and application search
#[derive(Parser, Debug)]
#[command(name = "kita")]
#[command(about = "Index local documents and search them by name, meaning, or application", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Custom base directory (default: ~/.kita)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the kita data directories
    Init,
    /// Index files and directories
    Index {
        /// Files or directories to index
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Concurrent extraction workers (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Search files, contents and applications
    Search {
        /// Search query (empty lists recent files)
        #[arg(default_value = "")]
        query: String,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// List installed applications
    Apps {
        /// Only show applications whose name contains this text
        filter: Option<String>,
    },
    /// Launch an application, or bring it forward if it is running
    Launch {
        /// Application name (case-insensitive)
        name: String,
    },
    /// Record that a file was opened from the results list
    Open {
        /// Path of the opened file
        path: PathBuf,
    },
    /// Remove index entries for files that no longer exist
    Reconcile,
    /// Watch directories and keep the index up to date
    Watch {
        /// Directories to watch
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Quiet period before changes are indexed, in milliseconds
        #[arg(long, default_value_t = 2000)]
        debounce_ms: u64,
    },
}


