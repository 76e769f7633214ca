//! Integration tests for the vault-ops CLI commands.
//!
//! Commands run against a temp vault with the hash embedder, exactly as
//! `main` would dispatch them after parsing.

use std::fs;

use clap::Parser;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use vault_cli::{execute, open_tool, Cli};
use vault_types::{EmbedderProvider, Settings};

struct TestHarness {
    _temp_dir: TempDir,
    settings: Settings,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut settings = Settings::default();
        settings.vault_path = temp_dir.path().join("vault").to_string_lossy().into_owned();
        settings.embedder.provider = EmbedderProvider::Hash;
        settings.embedder.hash_dimension = 96;

        Self {
            _temp_dir: temp_dir,
            settings,
        }
    }

    /// Parse `args` like the binary would and run the command.
    async fn run(&self, args: &[&str]) -> anyhow::Result<String> {
        let cli = Cli::try_parse_from(std::iter::once("vault-ops").chain(args.iter().copied()))?;
        let tool = open_tool(&self.settings)?;
        execute(&tool, &self.settings, cli.command).await
    }
}

#[tokio::test]
async fn test_note_lifecycle() {
    let h = TestHarness::new();

    assert_eq!(
        h.run(&["create", "journal/monday", "--text", "Met with the design team."])
            .await
            .unwrap(),
        "Created journal/monday.md."
    );
    assert_eq!(
        h.run(&["read", "journal/monday"]).await.unwrap(),
        "Met with the design team."
    );
    assert_eq!(
        h.run(&["update", "journal/monday.md", "-t", "Design review moved."])
            .await
            .unwrap(),
        "Updated journal/monday.md."
    );
    assert_eq!(
        h.run(&["delete", "journal/monday"]).await.unwrap(),
        "Deleted journal/monday.md."
    );
    assert_eq!(
        h.run(&["read", "journal/monday"]).await.unwrap(),
        "File journal/monday.md not found."
    );
}

#[tokio::test]
async fn test_create_from_file() {
    let h = TestHarness::new();
    let draft = h._temp_dir.path().join("draft.txt");
    fs::write(&draft, "Drafted offline").unwrap();

    let reply = h
        .run(&["create", "imported", "--file", draft.to_str().unwrap()])
        .await
        .unwrap();
    assert_eq!(reply, "Created imported.md.");
    assert_eq!(h.run(&["read", "imported"]).await.unwrap(), "Drafted offline");
}

#[tokio::test]
async fn test_path_escape_is_an_error() {
    let h = TestHarness::new();
    let err = h
        .run(&["create", "../../etc/evil", "--text", "x"])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Path escapes vault"), "got: {}", err);
}

#[tokio::test]
async fn test_ask_and_status() {
    let h = TestHarness::new();
    h.run(&["create", "pets", "--text", "The cat sleeps on the sofa.\n\nThe dog guards the door."])
        .await
        .unwrap();

    let answer = h.run(&["ask", "where", "does", "the", "cat", "sleep?", "-k", "1"]).await.unwrap();
    assert!(answer.contains("[pets.md] The cat sleeps on the sofa."), "got: {}", answer);

    let status = h.run(&["status"]).await.unwrap();
    assert!(status.contains("Notes: 1"), "got: {}", status);
    assert!(status.contains("Indexed notes: 1"), "got: {}", status);
    assert!(status.contains("Indexed chunks: 2"), "got: {}", status);
}

#[tokio::test]
async fn test_maintenance_dry_run() {
    let h = TestHarness::new();
    h.run(&["create", "blank", "--text", ""]).await.unwrap();

    let report = h.run(&["maintenance", "empty", "--dry-run"]).await.unwrap();
    assert_eq!(report, "Would remove 1 empty notes.\n  - blank.md");

    let report = h.run(&["maintenance", "empty"]).await.unwrap();
    assert_eq!(report, "Removed 1 empty notes.\n  - blank.md");
}

#[tokio::test]
async fn test_tool_json_and_schema() {
    let h = TestHarness::new();

    let reply = h
        .run(&["tool", "--input", r#"{"action":"create","path":"x","text":"hello"}"#])
        .await
        .unwrap();
    assert_eq!(reply, "Created x.md.");

    let reply = h.run(&["tool", "--input", r#"{"action":"dance"}"#]).await.unwrap();
    assert_eq!(reply, "Unknown action.");

    let schema: serde_json::Value =
        serde_json::from_str(&h.run(&["schema"]).await.unwrap()).unwrap();
    assert_eq!(schema["name"], "vault_ops");
    assert_eq!(schema["input_schema"]["required"][0], "action");
}
