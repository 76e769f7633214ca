//! The `vault_ops` agent tool.
//!
//! One entry point with an `action` parameter: create, read, update, delete,
//! ask, maintenance. Replies are always plain text so the calling agent can
//! read them directly; failures come back as `Error: ...`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use vault_embeddings::EmbeddingModel;
use vault_types::{Settings, VaultError};

use crate::answer::{answerer_from_settings, Answerer};
use crate::ask::{ask, MAX_TOP_K};
use crate::error::OpsError;
use crate::indexer::VaultIndexer;
use crate::maintenance::{run_maintenance, MaintenanceOptions};
use crate::vault::{NotePath, Vault};

/// Name agents call the tool by.
pub const TOOL_NAME: &str = "vault_ops";

const TOOL_DESCRIPTION: &str = "Work with the Obsidian note vault. \
Actions: create, read, update or delete a Markdown note by vault-relative path; \
ask a question answered from the most relevant note paragraphs; \
maintenance to remove empty notes, report dangling [[links]], delete orphan \
attachments and resync the search index.";

/// Reply for an action the tool does not know.
pub const UNKNOWN_ACTION_REPLY: &str = "Unknown action.";

/// Supported tool actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultAction {
    Create,
    Read,
    Update,
    Delete,
    Ask,
    Maintenance,
}

impl VaultAction {
    pub const ALL: &'static [VaultAction] = &[
        VaultAction::Create,
        VaultAction::Read,
        VaultAction::Update,
        VaultAction::Delete,
        VaultAction::Ask,
        VaultAction::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VaultAction::Create => "create",
            VaultAction::Read => "read",
            VaultAction::Update => "update",
            VaultAction::Delete => "delete",
            VaultAction::Ask => "ask",
            VaultAction::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for VaultAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VaultAction {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        VaultAction::ALL
            .iter()
            .copied()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| VaultError::InvalidInput(format!("Unknown action: {}", s)))
    }
}

/// Maintenance task names given either as a list or as one comma-separated
/// string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TaskNames {
    List(Vec<String>),
    Csv(String),
}

fn deserialize_tasks<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<TaskNames>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(TaskNames::List(list)) => list,
        Some(TaskNames::Csv(csv)) => csv
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    })
}

/// Arguments of one tool call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VaultOpsInput {
    pub action: String,

    /// Vault-relative note path (create, read, update, delete)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Note body (create, update) or the question (ask)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Tasks for maintenance; empty runs the default set
    #[serde(
        default,
        deserialize_with = "deserialize_tasks",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub maintenance_tasks: Vec<String>,

    /// Paragraphs to retrieve for ask
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,

    /// Maintenance reports without changing anything
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

impl VaultOpsInput {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_tasks(mut self, tasks: Vec<String>) -> Self {
        self.maintenance_tasks = tasks;
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = Some(dry_run);
        self
    }
}

/// What an agent framework needs to register the tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// The vault tool: note files, retrieval answers and maintenance.
///
/// File, index and model work runs on tokio's blocking pool; only the
/// answerer call stays on the async path.
pub struct VaultOpsTool {
    indexer: Arc<VaultIndexer>,
    answerer: Arc<dyn Answerer>,
    top_k: usize,
    maintenance: MaintenanceOptions,
}

impl VaultOpsTool {
    pub fn new(indexer: VaultIndexer, answerer: Arc<dyn Answerer>) -> Self {
        Self {
            indexer: Arc::new(indexer),
            answerer,
            top_k: 5,
            maintenance: MaintenanceOptions::default(),
        }
    }

    /// Open the vault and index named by `settings`.
    pub fn open(settings: &Settings, embedder: Arc<dyn EmbeddingModel>) -> Result<Self, OpsError> {
        let vault = Vault::open(settings.expanded_vault_path())?;
        let indexer = VaultIndexer::open(vault, embedder, settings.expanded_index_path())?;
        let answerer = answerer_from_settings(&settings.answer)?;

        info!(
            vault = ?indexer.vault().root(),
            answer = ?settings.answer.provider,
            "Vault tool ready"
        );

        Ok(Self::new(indexer, answerer)
            .with_top_k(settings.top_k)
            .with_maintenance_options(MaintenanceOptions::from_settings(settings)))
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_maintenance_options(mut self, options: MaintenanceOptions) -> Self {
        self.maintenance = options;
        self
    }

    pub fn vault(&self) -> &Vault {
        self.indexer.vault()
    }

    pub fn indexer(&self) -> &VaultIndexer {
        &self.indexer
    }

    /// Name, description and JSON Schema of the tool input.
    pub fn definition() -> ToolDefinition {
        let actions: Vec<&str> = VaultAction::ALL.iter().map(|a| a.as_str()).collect();
        ToolDefinition {
            name: TOOL_NAME.to_string(),
            description: TOOL_DESCRIPTION.to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": actions,
                        "description": "Operation to perform."
                    },
                    "path": {
                        "type": "string",
                        "description": "Vault-relative note path for create/read/update/delete, e.g. 'projects/plan.md'. '.md' is added when missing."
                    },
                    "text": {
                        "type": "string",
                        "description": "Note content for create/update, or the question for ask."
                    },
                    "maintenance_tasks": {
                        "type": "array",
                        "items": {
                            "type": "string",
                            "enum": ["empty", "dangling", "orphans", "stale", "reindex"]
                        },
                        "description": "Maintenance tasks to run. Default: empty, dangling, orphans, stale."
                    },
                    "k": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_TOP_K,
                        "description": "Number of paragraphs to retrieve for ask (default 5)."
                    },
                    "dry_run": {
                        "type": "boolean",
                        "description": "For maintenance: report without deleting anything."
                    }
                },
                "required": ["action"]
            }),
        }
    }

    /// Run a call, rendering failures as `Error: ...` text.
    pub async fn run(&self, input: &VaultOpsInput) -> String {
        match self.try_run(input).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(action = %input.action, error = %e, "Tool call failed");
                format!("Error: {}", e)
            }
        }
    }

    /// Run a call given as JSON arguments.
    pub async fn run_json(&self, arguments: &str) -> String {
        match serde_json::from_str::<VaultOpsInput>(arguments) {
            Ok(input) => self.run(&input).await,
            Err(e) => format!("Error: invalid tool input: {}", e),
        }
    }

    /// Run a call, keeping the typed error.
    pub async fn try_run(&self, input: &VaultOpsInput) -> Result<String, OpsError> {
        let action = match input.action.parse::<VaultAction>() {
            Ok(action) => action,
            Err(e) => {
                debug!(error = %e, "Unknown action");
                return Ok(UNKNOWN_ACTION_REPLY.to_string());
            }
        };
        debug!(%action, path = ?input.path, "Tool call");

        match action {
            VaultAction::Create => {
                let input = input.clone();
                self.blocking(move |indexer| create_note(indexer, &input)).await
            }
            VaultAction::Read => {
                let input = input.clone();
                self.blocking(move |indexer| read_note(indexer, &input)).await
            }
            VaultAction::Update => {
                let input = input.clone();
                self.blocking(move |indexer| update_note(indexer, &input)).await
            }
            VaultAction::Delete => {
                let input = input.clone();
                self.blocking(move |indexer| delete_note(indexer, &input)).await
            }
            VaultAction::Ask => {
                let question = input.text.as_deref().unwrap_or_default();
                let k = input.k.unwrap_or(self.top_k);
                ask(Arc::clone(&self.indexer), self.answerer.as_ref(), question, k).await
            }
            VaultAction::Maintenance => {
                let tasks = input.maintenance_tasks.clone();
                let options = self
                    .maintenance
                    .clone()
                    .with_dry_run(input.dry_run.unwrap_or(false));
                self.blocking(move |indexer| {
                    run_maintenance(indexer, &tasks, &options).map(|report| report.to_string())
                })
                .await
            }
        }
    }

    /// Run synchronous vault and index work off the async executor.
    async fn blocking<T, F>(&self, work: F) -> Result<T, OpsError>
    where
        T: Send + 'static,
        F: FnOnce(&VaultIndexer) -> Result<T, OpsError> + Send + 'static,
    {
        let indexer = Arc::clone(&self.indexer);
        tokio::task::spawn_blocking(move || work(&indexer)).await?
    }
}

fn note_path(
    indexer: &VaultIndexer,
    input: &VaultOpsInput,
    action: VaultAction,
) -> Result<NotePath, OpsError> {
    let path = input
        .path
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| OpsError::InvalidInput(format!("path is required for {}", action)))?;
    Ok(indexer.vault().resolve(path)?)
}

/// File changes stand even when indexing fails; `stale` maintenance
/// catches the index up later.
fn reindex(indexer: &VaultIndexer, note: &NotePath, text: &str) {
    if let Err(e) = indexer.refresh_note(note, text) {
        warn!(note = %note.rel, error = %e, "Failed to index note");
    }
}

fn create_note(indexer: &VaultIndexer, input: &VaultOpsInput) -> Result<String, OpsError> {
    let note = note_path(indexer, input, VaultAction::Create)?;
    let vault = indexer.vault();
    if vault.exists(&note) {
        return Ok(format!("File {} already exists.", note.rel));
    }
    let text = input.text.as_deref().unwrap_or_default();
    vault.write(&note, text)?;
    reindex(indexer, &note, text);
    info!(note = %note.rel, "Created note");
    Ok(format!("Created {}.", note.rel))
}

fn read_note(indexer: &VaultIndexer, input: &VaultOpsInput) -> Result<String, OpsError> {
    let note = note_path(indexer, input, VaultAction::Read)?;
    let vault = indexer.vault();
    if !vault.exists(&note) {
        return Ok(format!("File {} not found.", note.rel));
    }
    Ok(vault.read(&note)?)
}

fn update_note(indexer: &VaultIndexer, input: &VaultOpsInput) -> Result<String, OpsError> {
    let note = note_path(indexer, input, VaultAction::Update)?;
    let vault = indexer.vault();
    if !vault.exists(&note) {
        return Ok(format!("File {} not found.", note.rel));
    }
    let text = input
        .text
        .as_deref()
        .ok_or_else(|| OpsError::InvalidInput("text is required for update".to_string()))?;
    vault.write(&note, text)?;
    reindex(indexer, &note, text);
    info!(note = %note.rel, "Updated note");
    Ok(format!("Updated {}.", note.rel))
}

fn delete_note(indexer: &VaultIndexer, input: &VaultOpsInput) -> Result<String, OpsError> {
    let note = note_path(indexer, input, VaultAction::Delete)?;
    let vault = indexer.vault();
    if !vault.exists(&note) {
        return Ok(format!("{} does not exist.", note.rel));
    }
    vault.remove(&note)?;
    if let Err(e) = indexer.remove_note(&note.rel) {
        warn!(note = %note.rel, error = %e, "Failed to drop note from index");
    }
    info!(note = %note.rel, "Deleted note");
    Ok(format!("Deleted {}.", note.rel))
}
