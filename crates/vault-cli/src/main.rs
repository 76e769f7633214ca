//! vault-ops
//!
//! An Obsidian-style note vault as a command-line tool.
//!
//! # Usage
//!
//! ```bash
//! vault-ops create projects/plan --text "Ship in May"
//! vault-ops ask "When do we ship?"
//! vault-ops maintenance empty,dangling --dry-run
//! vault-ops tool --input '{"action": "read", "path": "projects/plan"}'
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults (`OBSIDIAN_VAULT` sets the default vault)
//! 2. Config file (~/.config/vault-ops/config.toml)
//! 3. Environment variables (VAULT_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use vault_cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    run(Cli::parse()).await
}
