//! vault-ops command-line front end.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations built on the `vault_ops` tool

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    build_embedder, execute, execute_schema, init_logging, load_settings, open_tool, run,
    show_status,
};
