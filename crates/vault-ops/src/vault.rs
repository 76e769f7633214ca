//! Note file access confined to the vault root.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use vault_types::VaultError;
use walkdir::{DirEntry, WalkDir};

/// Extension every note carries.
pub const NOTE_EXTENSION: &str = "md";

/// A note location: the vault-relative path and the absolute file path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NotePath {
    /// `/`-separated path relative to the vault root, e.g. `projects/idea.md`
    pub rel: String,
    pub abs: PathBuf,
}

impl std::fmt::Display for NotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.rel)
    }
}

/// A directory tree of Markdown notes.
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    /// Open a vault, creating the root directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, VaultError> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let root = root.canonicalize()?;
        debug!(root = ?root, "Opened vault");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Clean a caller-supplied relative path.
    ///
    /// Rejects absolute paths, `..` that climbs above the root, hidden
    /// components and non-Markdown extensions. A missing extension becomes
    /// `.md`.
    pub fn normalize(rel: &str) -> Result<String, VaultError> {
        let trimmed = rel.trim();
        if trimmed.is_empty() {
            return Err(VaultError::InvalidPath("path is empty".to_string()));
        }

        let mut parts: Vec<String> = Vec::new();
        for component in Path::new(trimmed).components() {
            match component {
                Component::Prefix(_) | Component::RootDir => {
                    return Err(VaultError::InvalidPath(format!(
                        "absolute paths are not allowed: {}",
                        trimmed
                    )));
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(VaultError::InvalidPath("Path escapes vault".to_string()));
                    }
                }
                Component::Normal(part) => {
                    let part = part.to_str().ok_or_else(|| {
                        VaultError::InvalidPath(format!("path is not valid UTF-8: {}", trimmed))
                    })?;
                    if part.starts_with('.') {
                        return Err(VaultError::InvalidPath(format!(
                            "hidden paths are reserved: {}",
                            trimmed
                        )));
                    }
                    parts.push(part.to_string());
                }
            }
        }

        let Some(last) = parts.last_mut() else {
            return Err(VaultError::InvalidPath(format!("no file name in {}", trimmed)));
        };
        match Path::new(last.as_str()).extension().and_then(|e| e.to_str()) {
            None => {
                last.push('.');
                last.push_str(NOTE_EXTENSION);
            }
            Some(ext) if ext.eq_ignore_ascii_case(NOTE_EXTENSION) => {}
            Some(ext) => {
                return Err(VaultError::InvalidPath(format!(
                    "notes must be .{} files, got .{}",
                    NOTE_EXTENSION, ext
                )));
            }
        }

        Ok(parts.join("/"))
    }

    /// Resolve a relative note path to a location inside the vault.
    pub fn resolve(&self, rel: &str) -> Result<NotePath, VaultError> {
        let rel = Self::normalize(rel)?;
        let abs = self.root.join(&rel);
        self.ensure_inside(&abs)?;
        Ok(NotePath { rel, abs })
    }

    /// Symlinks can point outside the root even when the path is clean, so
    /// check the nearest existing ancestor after resolving links.
    fn ensure_inside(&self, abs: &Path) -> Result<(), VaultError> {
        let mut ancestor = abs;
        loop {
            if ancestor.exists() {
                let real = ancestor.canonicalize()?;
                if !real.starts_with(&self.root) {
                    return Err(VaultError::InvalidPath("Path escapes vault".to_string()));
                }
                return Ok(());
            }
            match ancestor.parent() {
                Some(parent) => ancestor = parent,
                None => return Ok(()),
            }
        }
    }

    pub fn exists(&self, note: &NotePath) -> bool {
        note.abs.is_file()
    }

    pub fn read(&self, note: &NotePath) -> Result<String, VaultError> {
        match fs::read_to_string(&note.abs) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(VaultError::NotFound(note.rel.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write a note, creating parent directories as needed.
    pub fn write(&self, note: &NotePath, content: &str) -> Result<(), VaultError> {
        if let Some(parent) = note.abs.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&note.abs, content)?;
        debug!(note = %note.rel, bytes = content.len(), "Wrote note");
        Ok(())
    }

    pub fn remove(&self, note: &NotePath) -> Result<(), VaultError> {
        fs::remove_file(&note.abs)?;
        debug!(note = %note.rel, "Removed note");
        Ok(())
    }

    /// Vault-relative `/`-separated form of an absolute path under the root.
    pub fn relative(&self, abs: &Path) -> Option<String> {
        let rel = abs.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    /// Every visible file in the vault, sorted by path.
    pub fn list_files(&self) -> Result<Vec<PathBuf>, VaultError> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Every `.md` note in the vault, sorted by path.
    pub fn list_notes(&self) -> Result<Vec<NotePath>, VaultError> {
        Ok(self
            .list_files()?
            .into_iter()
            .filter(|p| is_note_file(p))
            .filter_map(|abs| self.relative(&abs).map(|rel| NotePath { rel, abs }))
            .collect())
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Whether a path names a Markdown note.
pub fn is_note_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(NOTE_EXTENSION))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_adds_extension() {
        assert_eq!(Vault::normalize("ideas/caching").unwrap(), "ideas/caching.md");
        assert_eq!(Vault::normalize("daily/2024-01-15.md").unwrap(), "daily/2024-01-15.md");
        assert_eq!(Vault::normalize("./a/../b/Note.MD").unwrap(), "b/Note.MD");
    }

    #[test]
    fn test_normalize_rejects_escapes() {
        assert!(matches!(
            Vault::normalize("../outside.md"),
            Err(VaultError::InvalidPath(msg)) if msg == "Path escapes vault"
        ));
        assert!(Vault::normalize("a/../../b.md").is_err());
        assert!(Vault::normalize("/etc/passwd").is_err());
        assert!(Vault::normalize("").is_err());
        assert!(Vault::normalize(".").is_err());
    }

    #[test]
    fn test_normalize_rejects_hidden_and_attachments() {
        assert!(Vault::normalize(".obsidian/workspace.md").is_err());
        assert!(Vault::normalize(".vault-index/x").is_err());
        assert!(Vault::normalize("images/cat.png").is_err());
    }

    #[test]
    fn test_write_read_remove() {
        let temp = TempDir::new().unwrap();
        let vault = Vault::open(temp.path()).unwrap();

        let note = vault.resolve("projects/alpha").unwrap();
        assert!(!vault.exists(&note));

        vault.write(&note, "# Alpha\n\nFirst draft").unwrap();
        assert!(vault.exists(&note));
        assert_eq!(vault.read(&note).unwrap(), "# Alpha\n\nFirst draft");

        vault.remove(&note).unwrap();
        assert!(matches!(vault.read(&note), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_list_notes_skips_hidden() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("b.md"), "b").unwrap();
        fs::write(root.join("a.md"), "a").unwrap();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/c.md"), "c").unwrap();
        fs::write(root.join("sub/pic.png"), "png").unwrap();
        fs::create_dir_all(root.join(".obsidian")).unwrap();
        fs::write(root.join(".obsidian/config.md"), "hidden").unwrap();

        let vault = Vault::open(root).unwrap();
        let notes: Vec<String> = vault.list_notes().unwrap().into_iter().map(|n| n.rel).collect();
        assert_eq!(notes, vec!["a.md", "b.md", "sub/c.md"]);
        assert_eq!(vault.list_files().unwrap().len(), 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let outside = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();

        let vault = Vault::open(temp.path()).unwrap();
        assert!(vault.resolve("link/secret.md").is_err());
    }
}
