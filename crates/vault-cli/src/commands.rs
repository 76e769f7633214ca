//! Command implementations.
//!
//! Note commands are translated into `vault_ops` tool calls so the CLI and an
//! agent see exactly the same behavior.

use std::fs;
use std::io::Read;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use vault_embeddings::{EmbeddingModel, HashEmbedder, LazyCandleEmbedder, ModelCache};
use vault_ops::{VaultOpsInput, VaultOpsTool};
use vault_types::{EmbedderProvider, Settings};

use crate::cli::{Cli, Commands};

/// Load settings and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    vault_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(vault) = vault_override {
        settings.vault_path = vault.to_string();
    }
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    Ok(settings)
}

/// Install the tracing subscriber. Logs go to stderr; stdout carries replies.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Embedder selected by `embedder.provider`.
///
/// The Candle model is loaded on first use, so commands that never embed do
/// not download or load it.
pub fn build_embedder(settings: &Settings) -> Result<Arc<dyn EmbeddingModel>> {
    match settings.embedder.provider {
        EmbedderProvider::Candle => {
            let repo = settings.embedder.model_repo.clone();
            let cache = match settings.model_cache_dir() {
                Some(dir) => ModelCache::new(dir, repo),
                None => ModelCache::for_repo(repo),
            };
            debug!(repo = %cache.repo_id, dir = ?cache.model_dir(), "Using Candle embedder");
            Ok(Arc::new(LazyCandleEmbedder::new(cache)))
        }
        EmbedderProvider::Hash => {
            let dim = settings.embedder.hash_dimension;
            if dim == 0 {
                bail!("embedder.hash_dimension must be greater than zero");
            }
            debug!(dim, "Using hash embedder");
            Ok(Arc::new(HashEmbedder::new(dim)))
        }
    }
}

/// Open the vault tool described by `settings`.
pub fn open_tool(settings: &Settings) -> Result<VaultOpsTool> {
    let embedder = build_embedder(settings)?;
    VaultOpsTool::open(settings, embedder).context("Failed to open vault")
}

fn note_content(text: Option<String>, file: Option<String>) -> Result<Option<String>> {
    match (text, file) {
        (Some(text), _) => Ok(Some(text)),
        (None, Some(path)) => {
            let content =
                fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path))?;
            Ok(Some(content))
        }
        (None, None) => Ok(None),
    }
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("Failed to read tool input from stdin")?;
    Ok(buf)
}

/// Vault and index statistics.
pub fn show_status(tool: &VaultOpsTool, settings: &Settings) -> Result<String> {
    let indexer = tool.indexer();
    let notes = tool.vault().list_notes()?.len();
    let indexed_notes = indexer.indexed_notes()?.len();
    let chunks = indexer.chunk_count()?;
    let stats = indexer.stats()?;

    Ok(format!(
        "Vault: {}\nNotes: {}\nIndexed notes: {}\nIndexed chunks: {}\n\
         Index: {} ({} bytes)\nEmbedder: {:?}, {} dimensions\nAnswers: {:?}",
        tool.vault().root().display(),
        notes,
        indexed_notes,
        chunks,
        settings.expanded_index_path().display(),
        stats.size_bytes,
        settings.embedder.provider,
        stats.dimension,
        settings.answer.provider,
    ))
}

/// Run one command and return what should be printed.
pub async fn execute(
    tool: &VaultOpsTool,
    settings: &Settings,
    command: Commands,
) -> Result<String> {
    let input = match command {
        Commands::Create { path, text, file } => {
            let text = note_content(text, file)?.unwrap_or_default();
            VaultOpsInput::new("create").with_path(path).with_text(text)
        }
        Commands::Read { path } => VaultOpsInput::new("read").with_path(path),
        Commands::Update { path, text, file } => {
            let Some(text) = note_content(text, file)? else {
                bail!("update needs --text or --file");
            };
            VaultOpsInput::new("update").with_path(path).with_text(text)
        }
        Commands::Delete { path } => VaultOpsInput::new("delete").with_path(path),
        Commands::Ask { question, k } => {
            let mut input = VaultOpsInput::new("ask").with_text(question.join(" "));
            input.k = k;
            input
        }
        Commands::Maintenance { tasks, dry_run } => VaultOpsInput::new("maintenance")
            .with_tasks(tasks)
            .with_dry_run(dry_run),
        Commands::Status => return show_status(tool, settings),
        Commands::Schema => return execute_schema(),
        Commands::Tool { input } => {
            let raw = match input {
                Some(raw) => raw,
                None => read_stdin()?,
            };
            return Ok(tool.run_json(&raw).await);
        }
    };

    // try_run so failures exit non-zero
    Ok(tool.try_run(&input).await?)
}

/// Run a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(
        cli.config.as_deref(),
        cli.vault.as_deref(),
        cli.log_level.as_deref(),
    )?;
    init_logging(&settings.log_level)?;

    if matches!(cli.command, Commands::Schema) {
        println!("{}", execute_schema()?);
        return Ok(());
    }

    info!(vault = %settings.vault_path, "Opening vault");
    let tool = open_tool(&settings)?;
    let output = execute(&tool, &settings, cli.command).await?;
    println!("{}", output);
    Ok(())
}

/// Tool definition as pretty JSON; needs no vault.
pub fn execute_schema() -> Result<String> {
    serde_json::to_string_pretty(&VaultOpsTool::definition())
        .context("Failed to serialize tool definition")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_content_prefers_text() {
        let content = note_content(Some("inline".to_string()), None).unwrap();
        assert_eq!(content.as_deref(), Some("inline"));
        assert!(note_content(None, None).unwrap().is_none());
    }

    #[test]
    fn test_note_content_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("draft.md");
        fs::write(&path, "from disk").unwrap();

        let content = note_content(None, Some(path.to_string_lossy().into_owned())).unwrap();
        assert_eq!(content.as_deref(), Some("from disk"));
        assert!(note_content(None, Some("/no/such/draft.md".to_string())).is_err());
    }

    #[test]
    fn test_build_hash_embedder() {
        let mut settings = Settings::default();
        settings.embedder.provider = EmbedderProvider::Hash;
        settings.embedder.hash_dimension = 32;
        assert_eq!(build_embedder(&settings).unwrap().info().dimension, 32);

        settings.embedder.hash_dimension = 0;
        assert!(build_embedder(&settings).is_err());
    }

    #[test]
    fn test_build_candle_embedder_is_lazy() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.embedder.cache_dir = Some(temp.path().to_string_lossy().into_owned());
        let embedder = build_embedder(&settings).unwrap();
        assert_eq!(embedder.info().dimension, vault_embeddings::EMBEDDING_DIM);
        // nothing downloaded
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_schema_is_json() {
        let schema: serde_json::Value = serde_json::from_str(&execute_schema().unwrap()).unwrap();
        assert_eq!(schema["name"], "vault_ops");
    }
}
