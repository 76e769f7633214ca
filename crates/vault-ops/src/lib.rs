//! # vault-ops
//!
//! An Obsidian-style note vault exposed as one tool for agent frameworks.
//!
//! The `vault_ops` tool routes an action string to:
//! - `create` / `read` / `update` / `delete`: note files inside the vault
//! - `ask`: retrieval over embedded paragraphs, answered by an [`Answerer`]
//! - `maintenance`: empty notes, dangling links, orphan attachments, index sync
//!
//! ```no_run
//! # async fn demo(tool: vault_ops::VaultOpsTool) {
//! let reply = tool
//!     .run_json(r#"{"action": "ask", "text": "What did we decide about caching?"}"#)
//!     .await;
//! println!("{reply}");
//! # }
//! ```

pub mod answer;
pub mod ask;
pub mod chunk;
pub mod error;
pub mod indexer;
pub mod links;
pub mod maintenance;
pub mod tool;
pub mod vault;

pub use answer::{answerer_from_settings, Answerer, AnswerError, ContextAnswerer, RetrievedChunk};
pub use error::OpsError;
pub use indexer::{SyncOutcome, SyncPlan, VaultIndexer};
pub use maintenance::{run_maintenance, MaintenanceOptions, MaintenanceReport};
pub use tool::{ToolDefinition, VaultAction, VaultOpsInput, VaultOpsTool, TOOL_NAME};
pub use vault::{NotePath, Vault};
