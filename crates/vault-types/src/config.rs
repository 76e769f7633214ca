//! Configuration loading for vault-ops.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `<config_dir>/vault-ops/config.toml`.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::VaultError;

/// Name of the index directory created inside the vault by default.
pub const DEFAULT_INDEX_DIR: &str = ".vault-index";

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderProvider {
    /// all-MiniLM-L6-v2 through Candle (default)
    #[default]
    Candle,
    /// Deterministic feature hashing, no model download
    Hash,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderSettings {
    #[serde(default)]
    pub provider: EmbedderProvider,

    /// HuggingFace repository for the Candle model
    #[serde(default = "default_model_repo")]
    pub model_repo: String,

    /// Override for the model cache directory
    #[serde(default)]
    pub cache_dir: Option<String>,

    /// Vector size for the hash embedder
    #[serde(default = "default_hash_dimension")]
    pub hash_dimension: usize,
}

fn default_model_repo() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_hash_dimension() -> usize {
    384
}

impl Default for EmbedderSettings {
    fn default() -> Self {
        Self {
            provider: EmbedderProvider::default(),
            model_repo: default_model_repo(),
            cache_dir: None,
            hash_dimension: default_hash_dimension(),
        }
    }
}

/// Which answer backend to use for `ask`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerProvider {
    /// Return the retrieved context with a simulated answer (default)
    #[default]
    Context,
    /// OpenAI-compatible chat completions endpoint
    #[serde(alias = "openai")]
    OpenAi,
    /// Anthropic messages endpoint
    Anthropic,
}

/// Answer generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSettings {
    #[serde(default)]
    pub provider: AnswerProvider,

    /// Model name (e.g., "gpt-4o-mini", "claude-3-haiku-20240307")
    #[serde(default = "default_answer_model")]
    pub model: String,

    /// API key (usually supplied through the environment)
    #[serde(default)]
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    #[serde(default)]
    pub api_base_url: Option<String>,
}

fn default_answer_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            provider: AnswerProvider::default(),
            model: default_answer_model(),
            api_key: None,
            api_base_url: None,
        }
    }
}

impl AnswerSettings {
    /// API key from config, falling back to the provider's usual env var.
    pub fn resolved_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            return Some(key.clone());
        }
        let var = match self.provider {
            AnswerProvider::Context => return None,
            AnswerProvider::OpenAi => "OPENAI_API_KEY",
            AnswerProvider::Anthropic => "ANTHROPIC_API_KEY",
        };
        std::env::var(var).ok().filter(|k| !k.is_empty())
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root directory of the note vault
    #[serde(default = "default_vault_path")]
    pub vault_path: String,

    /// Directory holding the vector index and chunk metadata.
    /// Defaults to `<vault_path>/.vault-index`.
    #[serde(default)]
    pub index_path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Number of chunks retrieved for `ask`
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Notes smaller than this many bytes count as empty
    #[serde(default = "default_empty_note_bytes")]
    pub empty_note_bytes: u64,

    /// File extensions treated as attachments by the orphan scan
    #[serde(default = "default_attachment_extensions")]
    pub attachment_extensions: Vec<String>,

    #[serde(default)]
    pub embedder: EmbedderSettings,

    #[serde(default)]
    pub answer: AnswerSettings,
}

fn default_vault_path() -> String {
    std::env::var("OBSIDIAN_VAULT").unwrap_or_else(|_| "./vault".to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_empty_note_bytes() -> u64 {
    5
}

fn default_attachment_extensions() -> Vec<String> {
    vec!["png".to_string(), "jpg".to_string(), "pdf".to_string()]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_path: default_vault_path(),
            index_path: None,
            log_level: default_log_level(),
            top_k: default_top_k(),
            empty_note_bytes: default_empty_note_bytes(),
            attachment_extensions: default_attachment_extensions(),
            embedder: EmbedderSettings::default(),
            answer: AnswerSettings::default(),
        }
    }
}

fn config_err(e: config::ConfigError) -> VaultError {
    VaultError::Config(e.to_string())
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults (`OBSIDIAN_VAULT` seeds the vault path)
    /// 2. Config file (`<config_dir>/vault-ops/config.toml`)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (`VAULT_*`, `__` between nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, VaultError> {
        let config_dir = ProjectDirs::from("", "", "vault-ops")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("vault_path", default_vault_path())
            .map_err(config_err)?
            .set_default("log_level", default_log_level())
            .map_err(config_err)?
            .set_default("top_k", default_top_k() as i64)
            .map_err(config_err)?
            .set_default("empty_note_bytes", default_empty_note_bytes() as i64)
            .map_err(config_err)?
            .set_default("attachment_extensions", default_attachment_extensions())
            .map_err(config_err)?
            .set_default("embedder.model_repo", default_model_repo())
            .map_err(config_err)?
            .set_default("answer.model", default_answer_model())
            .map_err(config_err)?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // VAULT_VAULT_PATH, VAULT_TOP_K, VAULT_ANSWER__PROVIDER, ...
        builder = builder.add_source(
            Environment::with_prefix("VAULT")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("attachment_extensions")
                .try_parsing(true),
        );

        let config = builder.build().map_err(config_err)?;

        config.try_deserialize().map_err(config_err)
    }

    /// Vault root with `~` expanded.
    pub fn expanded_vault_path(&self) -> PathBuf {
        expand_path(&self.vault_path)
    }

    /// Index directory with `~` expanded.
    pub fn expanded_index_path(&self) -> PathBuf {
        match &self.index_path {
            Some(path) => expand_path(path),
            None => self.expanded_vault_path().join(DEFAULT_INDEX_DIR),
        }
    }

    /// Model cache directory override, if any.
    pub fn model_cache_dir(&self) -> Option<PathBuf> {
        self.embedder.cache_dir.as_deref().map(expand_path)
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.top_k, 5);
        assert_eq!(settings.empty_note_bytes, 5);
        assert_eq!(settings.attachment_extensions, vec!["png", "jpg", "pdf"]);
        assert_eq!(settings.embedder.provider, EmbedderProvider::Candle);
        assert_eq!(settings.answer.provider, AnswerProvider::Context);
    }

    #[test]
    fn test_load_with_defaults() {
        let settings = Settings::load(None).unwrap();
        assert!(settings.top_k > 0);
        assert!(!settings.vault_path.is_empty());
    }

    #[test]
    fn test_index_path_defaults_inside_vault() {
        let settings = Settings {
            vault_path: "/notes/work".to_string(),
            ..Default::default()
        };
        assert_eq!(
            settings.expanded_index_path(),
            PathBuf::from("/notes/work").join(DEFAULT_INDEX_DIR)
        );
    }

    #[test]
    fn test_explicit_index_path() {
        let settings = Settings {
            index_path: Some("/var/lib/vault-index".to_string()),
            ..Default::default()
        };
        assert_eq!(
            settings.expanded_index_path(),
            PathBuf::from("/var/lib/vault-index")
        );
    }

    #[test]
    fn test_tilde_expansion() {
        let settings = Settings {
            vault_path: "~/vault".to_string(),
            ..Default::default()
        };
        assert!(!settings.expanded_vault_path().starts_with("~"));
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("vault-ops.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
vault_path = "/srv/vault"
top_k = 8

[embedder]
provider = "hash"
hash_dimension = 64

[answer]
provider = "anthropic"
model = "claude-3-haiku-20240307"
"#
        )
        .unwrap();

        let settings = Settings::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(settings.vault_path, "/srv/vault");
        assert_eq!(settings.top_k, 8);
        assert_eq!(settings.embedder.provider, EmbedderProvider::Hash);
        assert_eq!(settings.embedder.hash_dimension, 64);
        assert_eq!(settings.answer.provider, AnswerProvider::Anthropic);
        assert_eq!(settings.answer.model, "claude-3-haiku-20240307");
    }

    #[test]
    fn test_missing_cli_config_is_error() {
        let result = Settings::load(Some("/definitely/not/here/vault-ops.toml"));
        assert!(matches!(result, Err(VaultError::Config(_))));
    }

    #[test]
    fn test_context_provider_has_no_key() {
        let answer = AnswerSettings::default();
        assert!(answer.resolved_api_key().is_none());
    }

    #[test]
    fn test_configured_key_wins() {
        let answer = AnswerSettings {
            provider: AnswerProvider::OpenAi,
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        assert_eq!(answer.resolved_api_key().as_deref(), Some("sk-test"));
    }
}
