pub mod commands;
pub mod context;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// One workflow for backup engines: save, mount, restore, sync and recover.
#[derive(Parser, Debug)]
#[command(name = "loft", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the config file
    #[arg(long, global = true, env = "LOFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root for application data (encrypted view configurations)
    #[arg(long, global = true, env = "LOFT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Repository to operate on. Repeat for several; default is all
    #[arg(short, long, global = true)]
    pub repository: Vec<String>,

    /// Verbose output: commands run and their output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode: only show errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the repository storage
    Init,

    /// Back up every source
    Save,

    /// Verify the repository, repairing what can be repaired
    Check,

    /// Mount the latest backup of every source
    Mount {
        /// Mount directory (default: the repository's temp_dir)
        #[arg(long)]
        target: Option<PathBuf>,
    },

    /// Unmount a mounted repository and clean up the mount directory
    Unmount {
        /// Mount directory (default: the repository's temp_dir)
        #[arg(long)]
        target: Option<PathBuf>,
    },

    /// Restore the latest backup of every source into a directory
    Restore {
        /// Destination; each source lands in <destination>/<source>
        destination: PathBuf,
    },

    /// List snapshots per source
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Copy repository storage to a remote
    Sync {
        /// Folder path, disk label or cloud alias (default: every configured remote)
        remote: Option<String>,
    },

    /// Rebuild repository storage from a remote
    Recover {
        /// Folder path, disk label or cloud alias synced to earlier
        remote: String,
        /// Where to rebuild the repository storage
        destination: PathBuf,
    },

    /// Show repositories, remotes and mount state
    Status,
}
