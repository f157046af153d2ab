//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// epicsync - mirror an Azure DevOps Epic tree into SQLite and query it
#[derive(Parser, Debug)]
#[command(name = "epicsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.epicsync/data/epicsync.db)
    #[arg(long, global = true, env = "EPICSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to listen on (default: 127.0.0.1:8080)
        #[arg(long)]
        bind: Option<String>,

        /// Sync every config once after startup
        #[arg(long)]
        sync_on_start: bool,
    },

    /// Run or inspect syncs
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },

    /// Manage sync configs
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// List mirrored work items
    Items(ItemsArgs),

    /// Ask a free-text question or filter query
    Ask {
        /// Query text, e.g. "bugs assigned to Alice"
        query: String,

        /// Sync config ID (default: lowest)
        #[arg(long)]
        config: Option<i64>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Reconcile one config against the remote tracker (Ctrl-C cancels)
    Run {
        /// Sync config ID
        id: i64,
    },

    /// Show recent runs, newest first
    History {
        /// Sync config ID
        id: i64,

        /// Maximum runs to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// List sync configs
    List,

    /// Show one sync config with its item counts
    Show {
        /// Sync config ID
        id: i64,
    },

    /// Create a sync config
    Create {
        /// Display name
        #[arg(long)]
        name: String,

        /// Root epic work item ID
        #[arg(long)]
        epic_id: i64,

        /// Azure DevOps organization (default: AZURE_DEVOPS_ORGANIZATION)
        #[arg(long)]
        organization: Option<String>,

        /// Azure DevOps project (default: AZURE_DEVOPS_PROJECT)
        #[arg(long)]
        project: Option<String>,
    },

    /// Delete a sync config and its mirror
    Delete {
        /// Sync config ID
        id: i64,
    },
}

#[derive(Args, Debug, Default)]
pub struct ItemsArgs {
    /// Work item type (exact match)
    #[arg(long = "type")]
    pub work_item_type: Option<String>,

    /// State (exact match)
    #[arg(long)]
    pub state: Option<String>,

    /// Assignee display name (exact match)
    #[arg(long)]
    pub assigned_to: Option<String>,

    /// Iteration path (exact match)
    #[arg(long)]
    pub iteration: Option<String>,

    /// Title substring, or an exact ID
    #[arg(long)]
    pub q: Option<String>,

    /// Sort column (id, title, type, state, assignedTo, priority, changed, created, iterationPath, lastActivity)
    #[arg(long)]
    pub sort_by: Option<String>,

    /// Sort direction (asc, desc)
    #[arg(long)]
    pub sort_dir: Option<String>,

    /// Maximum items to return
    #[arg(long)]
    pub limit: Option<u32>,

    /// Items to skip
    #[arg(long)]
    pub offset: Option<u32>,

    /// Sync config ID (default: lowest)
    #[arg(long)]
    pub config: Option<i64>,
}
