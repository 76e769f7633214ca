//! CLI argument parsing for the vault-ops binary.
//!
//! Flags given here override the config file and `VAULT_*` environment.

use clap::{Parser, Subcommand};

/// Obsidian vault tool
///
/// Create, read, update and delete notes, ask questions answered from the
/// vault's content, and keep the vault tidy.
#[derive(Parser, Debug)]
#[command(name = "vault-ops")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/vault-ops/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Vault root directory (overrides vault_path and OBSIDIAN_VAULT)
    #[arg(long, global = true)]
    pub vault: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Vault commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create a new note
    Create {
        /// Vault-relative note path ('.md' is added when missing)
        path: String,

        /// Note content
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,

        /// Read note content from a file
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Print a note
    Read {
        /// Vault-relative note path
        path: String,
    },

    /// Replace the content of an existing note
    Update {
        /// Vault-relative note path
        path: String,

        /// New content
        #[arg(short, long, conflicts_with = "file", required_unless_present = "file")]
        text: Option<String>,

        /// Read new content from a file
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Delete a note
    Delete {
        /// Vault-relative note path
        path: String,
    },

    /// Ask a question answered from the vault
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Number of paragraphs to retrieve
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Run maintenance tasks (default: empty, dangling, orphans, stale)
    Maintenance {
        /// Tasks to run: empty, dangling, orphans, stale, reindex
        #[arg(value_delimiter = ',')]
        tasks: Vec<String>,

        /// Report what would change without touching anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show vault and index statistics
    Status,

    /// Print the tool definition (name, description, JSON Schema)
    Schema,

    /// Run one tool call given as JSON
    Tool {
        /// JSON arguments; read from stdin when omitted
        #[arg(short, long)]
        input: Option<String>,
    },
}
