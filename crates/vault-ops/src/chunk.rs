//! Splitting notes into embeddable paragraphs.

use gray_matter::engine::YAML;
use gray_matter::Matter;
use sha2::{Digest, Sha256};
use tracing::debug;
use vault_vector::NoteChunks;

/// Note body without its YAML frontmatter.
///
/// Unparseable frontmatter leaves the text untouched.
pub fn strip_frontmatter(text: &str) -> String {
    let matter = Matter::<YAML>::new();
    match matter.parse::<serde_json::Value>(text) {
        Ok(parsed) => parsed.content,
        Err(e) => {
            debug!(error = %e, "Frontmatter did not parse, keeping raw text");
            text.to_string()
        }
    }
}

/// Paragraphs separated by blank lines, trimmed.
///
/// Paragraphs with no letters or digits (rules, lone punctuation) carry
/// nothing to embed and are dropped.
pub fn split_paragraphs(body: &str) -> Vec<String> {
    let normalized = body.replace("\r\n", "\n");
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in normalized.lines() {
        if line.trim().is_empty() {
            flush(&mut current, &mut paragraphs);
        } else {
            current.push(line);
        }
    }
    flush(&mut current, &mut paragraphs);
    paragraphs
}

fn flush(lines: &mut Vec<&str>, out: &mut Vec<String>) {
    if lines.is_empty() {
        return;
    }
    let paragraph = lines.join("\n").trim().to_string();
    lines.clear();
    if paragraph.chars().any(char::is_alphanumeric) {
        out.push(paragraph);
    }
}

/// Hex SHA-256 of the note content.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Everything the index needs to store a note.
pub fn note_chunks(note_path: &str, text: &str) -> NoteChunks {
    NoteChunks {
        note_path: note_path.to_string(),
        content_hash: content_hash(text),
        chunks: split_paragraphs(&strip_frontmatter(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_paragraphs() {
        let body = "# Title\n\nFirst paragraph\nstill first.\n\n\n  Second  \n\n---\n\nThird";
        assert_eq!(
            split_paragraphs(body),
            vec!["# Title", "First paragraph\nstill first.", "Second", "Third"]
        );
    }

    #[test]
    fn test_split_handles_crlf_and_whitespace_lines() {
        let body = "one\r\n\r\ntwo\n   \nthree";
        assert_eq!(split_paragraphs(body), vec!["one", "two", "three"]);
        assert!(split_paragraphs("   \n\n").is_empty());
    }

    #[test]
    fn test_strip_frontmatter() {
        let text = "---\ntags: [rust]\n---\nBody text\n\nMore";
        let body = strip_frontmatter(text);
        assert!(!body.contains("tags"));
        assert_eq!(split_paragraphs(&body), vec!["Body text", "More"]);
    }

    #[test]
    fn test_no_frontmatter_unchanged() {
        assert_eq!(split_paragraphs(&strip_frontmatter("plain note")), vec!["plain note"]);
    }

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_ne!(content_hash("a"), content_hash("b"));
    }

    #[test]
    fn test_note_chunks() {
        let chunks = note_chunks("ideas/x.md", "alpha\n\nbeta");
        assert_eq!(chunks.note_path, "ideas/x.md");
        assert_eq!(chunks.chunks, vec!["alpha", "beta"]);
        assert_eq!(chunks.content_hash, content_hash("alpha\n\nbeta"));
    }
}
