//! Vault housekeeping: empty notes, dangling links, orphan attachments and
//! index drift.
//!
//! Tasks always run in a fixed order (empty, dangling, orphans, stale,
//! reindex) whatever order the caller lists them in, so that a note removed
//! as empty is already gone when links and the index are checked.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use tracing::{info, warn};
use vault_types::{MaintenanceTask, Settings};

use crate::error::OpsError;
use crate::indexer::VaultIndexer;
use crate::links::{markdown_embeds, wikilinks};
use crate::vault::{is_note_file, NotePath, Vault};

/// Knobs for a maintenance run.
#[derive(Debug, Clone)]
pub struct MaintenanceOptions {
    /// Notes smaller than this many bytes are removed by `empty`
    pub empty_note_bytes: u64,
    /// Extensions (without the dot) treated as attachments by `orphans`
    pub attachment_extensions: Vec<String>,
    /// Report what would change without touching files or the index
    pub dry_run: bool,
}

impl Default for MaintenanceOptions {
    fn default() -> Self {
        Self {
            empty_note_bytes: 5,
            attachment_extensions: vec!["png".to_string(), "jpg".to_string(), "pdf".to_string()],
            dry_run: false,
        }
    }
}

impl MaintenanceOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            empty_note_bytes: settings.empty_note_bytes,
            attachment_extensions: settings.attachment_extensions.clone(),
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn is_attachment(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.attachment_extensions
            .iter()
            .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Report lines in task order; renders as newline-joined text.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub lines: Vec<String>,
}

impl MaintenanceReport {
    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }
}

impl fmt::Display for MaintenanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}

/// Resolve task names: none means the default set, duplicates collapse and
/// unknown names are returned separately.
fn plan_tasks(names: &[String]) -> (BTreeSet<MaintenanceTask>, Vec<String>) {
    if names.iter().all(|n| n.trim().is_empty()) {
        return (MaintenanceTask::DEFAULT.iter().copied().collect(), Vec::new());
    }

    let mut tasks = BTreeSet::new();
    let mut unknown = Vec::new();
    for name in names.iter().filter(|n| !n.trim().is_empty()) {
        match name.parse::<MaintenanceTask>() {
            Ok(task) => {
                tasks.insert(task);
            }
            Err(_) => unknown.push(name.trim().to_string()),
        }
    }
    (tasks, unknown)
}

/// Run the named maintenance tasks against the vault and its index.
pub fn run_maintenance(
    indexer: &VaultIndexer,
    task_names: &[String],
    options: &MaintenanceOptions,
) -> Result<MaintenanceReport, OpsError> {
    let (tasks, unknown) = plan_tasks(task_names);
    let mut report = MaintenanceReport::default();

    info!(tasks = ?tasks, dry_run = options.dry_run, "Running maintenance");

    for task in &tasks {
        match task {
            MaintenanceTask::Empty => remove_empty_notes(indexer, options, &mut report)?,
            MaintenanceTask::Dangling => report_dangling_links(indexer.vault(), &mut report)?,
            MaintenanceTask::Orphans => delete_orphans(indexer.vault(), options, &mut report)?,
            MaintenanceTask::Stale => sync_index(indexer, options, &mut report)?,
            MaintenanceTask::Reindex => rebuild_index(indexer, options, &mut report)?,
        }
    }

    for name in unknown {
        warn!(task = %name, "Unknown maintenance task");
        report.push(format!("Unknown maintenance task: {}.", name));
    }

    Ok(report)
}

fn remove_empty_notes(
    indexer: &VaultIndexer,
    options: &MaintenanceOptions,
    report: &mut MaintenanceReport,
) -> Result<(), OpsError> {
    let vault = indexer.vault();
    let mut empties: Vec<NotePath> = Vec::new();
    for note in vault.list_notes()? {
        if fs::metadata(&note.abs)?.len() < options.empty_note_bytes {
            empties.push(note);
        }
    }

    if options.dry_run {
        report.push(format!("Would remove {} empty notes.", empties.len()));
    } else {
        for note in &empties {
            vault.remove(note)?;
            indexer.remove_note(&note.rel)?;
        }
        info!(count = empties.len(), "Removed empty notes");
        report.push(format!("Removed {} empty notes.", empties.len()));
    }
    for note in &empties {
        report.push(format!("  - {}", note.rel));
    }
    Ok(())
}

/// Join a link target onto the directory of the linking note, resolving `.`
/// and `..`. `None` when the result would leave the vault.
fn join_relative(base_dir: &str, target: &str) -> Option<String> {
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for part in target.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn parent_dir(rel: &str) -> &str {
    rel.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn file_name(rel: &str) -> &str {
    rel.rsplit_once('/').map(|(_, name)| name).unwrap_or(rel)
}

/// Lowercased lookup tables over every file in the vault.
struct FileCatalog {
    paths: HashSet<String>,
    names: HashSet<String>,
    note_stems: HashSet<String>,
}

impl FileCatalog {
    fn build(vault: &Vault) -> Result<Self, OpsError> {
        let mut catalog = FileCatalog {
            paths: HashSet::new(),
            names: HashSet::new(),
            note_stems: HashSet::new(),
        };
        for abs in vault.list_files()? {
            let Some(rel) = vault.relative(&abs) else {
                continue;
            };
            let rel = rel.to_lowercase();
            let name = file_name(&rel).to_string();
            if is_note_file(&abs) {
                if let Some((stem, _)) = name.rsplit_once('.') {
                    catalog.note_stems.insert(stem.to_string());
                }
            }
            catalog.names.insert(name);
            catalog.paths.insert(rel);
        }
        Ok(catalog)
    }

    /// Whether `[[target]]` written in `source` points at an existing file.
    fn resolves(&self, source: &str, target: &str) -> bool {
        let target = target.trim_start_matches('/').to_lowercase();
        // "v1.2 draft" is a note name, "chart.png" is a file
        let has_other_ext = Path::new(&target)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                !e.eq_ignore_ascii_case("md")
                    && e.chars().all(|c| c.is_ascii_alphanumeric())
                    && e.chars().any(|c| c.is_ascii_alphabetic())
            })
            .unwrap_or(false);

        if has_other_ext {
            return self.paths.contains(&target)
                || self.names.contains(file_name(&target))
                || join_relative(parent_dir(source), &target)
                    .map(|p| self.paths.contains(&p))
                    .unwrap_or(false);
        }

        let with_ext = if target.ends_with(".md") {
            target.clone()
        } else {
            format!("{}.md", target)
        };
        if self.paths.contains(&with_ext) {
            return true;
        }
        if let Some(p) = join_relative(parent_dir(source), &with_ext) {
            if self.paths.contains(&p) {
                return true;
            }
        }
        let stem = file_name(&with_ext).trim_end_matches(".md");
        // a bare name matches a note with that name in any folder
        !target.contains('/') && self.note_stems.contains(stem)
    }
}

fn report_dangling_links(vault: &Vault, report: &mut MaintenanceReport) -> Result<(), OpsError> {
    let catalog = FileCatalog::build(vault)?;
    let mut dangling: Vec<(String, String)> = Vec::new();

    for note in vault.list_notes()? {
        let text = match vault.read(&note) {
            Ok(text) => text,
            Err(e) => {
                warn!(note = %note.rel, error = %e, "Skipping unreadable note");
                continue;
            }
        };
        let source_lower = note.rel.to_lowercase();
        for link in wikilinks(&text) {
            if !catalog.resolves(&source_lower, &link.target) {
                dangling.push((note.rel.clone(), link.target));
            }
        }
    }

    report.push(format!("Found {} dangling links.", dangling.len()));
    for (source, target) in dangling {
        report.push(format!("  - {} -> [[{}]]", source, target));
    }
    Ok(())
}

/// Every attachment path (lowercased) some note points at, plus bare file
/// names from wikilinks, which Obsidian resolves anywhere in the vault.
fn referenced_attachments(vault: &Vault) -> Result<(HashSet<String>, HashSet<String>), OpsError> {
    let mut paths = HashSet::new();
    let mut names = HashSet::new();

    for note in vault.list_notes()? {
        let text = match vault.read(&note) {
            Ok(text) => text,
            Err(e) => {
                warn!(note = %note.rel, error = %e, "Skipping unreadable note");
                continue;
            }
        };
        let dir = parent_dir(&note.rel).to_lowercase();

        for target in markdown_embeds(&text) {
            let target = target.to_lowercase();
            if let Some(p) = join_relative("", &target) {
                paths.insert(p);
            }
            if let Some(p) = join_relative(&dir, &target) {
                paths.insert(p);
            }
        }
        for link in wikilinks(&text) {
            let target = link.target.to_lowercase();
            if let Some(p) = join_relative("", &target) {
                paths.insert(p);
            }
            if let Some(p) = join_relative(&dir, &target) {
                paths.insert(p);
            }
            names.insert(file_name(&target).to_string());
        }
    }
    Ok((paths, names))
}

fn delete_orphans(
    vault: &Vault,
    options: &MaintenanceOptions,
    report: &mut MaintenanceReport,
) -> Result<(), OpsError> {
    let (paths, names) = referenced_attachments(vault)?;
    let mut orphans: Vec<(String, std::path::PathBuf)> = Vec::new();

    for abs in vault.list_files()? {
        if !options.is_attachment(&abs) {
            continue;
        }
        let Some(rel) = vault.relative(&abs) else {
            continue;
        };
        let lower = rel.to_lowercase();
        if !paths.contains(&lower) && !names.contains(file_name(&lower)) {
            orphans.push((rel, abs));
        }
    }

    if options.dry_run {
        report.push(format!("Would delete {} orphan attachments.", orphans.len()));
    } else {
        for (_, abs) in &orphans {
            fs::remove_file(abs)?;
        }
        info!(count = orphans.len(), "Deleted orphan attachments");
        report.push(format!("Deleted {} orphan attachments.", orphans.len()));
    }
    for (rel, _) in &orphans {
        report.push(format!("  - {}", rel));
    }
    Ok(())
}

fn sync_index(
    indexer: &VaultIndexer,
    options: &MaintenanceOptions,
    report: &mut MaintenanceReport,
) -> Result<(), OpsError> {
    let plan = indexer.sync_plan()?;
    if options.dry_run {
        report.push(format!(
            "Would sync index: remove {} stale notes, index {} notes.",
            plan.stale.len(),
            plan.missing.len()
        ));
        return Ok(());
    }

    let outcome = indexer.apply_sync(&plan)?;
    report.push(format!(
        "Synced index: removed {} stale notes, indexed {} notes.",
        outcome.removed, outcome.indexed
    ));
    Ok(())
}

fn rebuild_index(
    indexer: &VaultIndexer,
    options: &MaintenanceOptions,
    report: &mut MaintenanceReport,
) -> Result<(), OpsError> {
    if options.dry_run {
        let notes = indexer.vault().list_notes()?.len();
        report.push(format!("Would rebuild index from {} notes.", notes));
        return Ok(());
    }

    let stats = indexer.rebuild()?;
    report.push(format!(
        "Rebuilt index: {} chunks from {} notes.",
        stats.chunks_added, stats.notes_processed
    ));
    Ok(())
}
