//! Wikilink and Markdown embed extraction.

use std::sync::LazyLock;

use regex::Regex;

static WIKILINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(!)?\[\[([^\]]+)\]\]").unwrap_or_else(|e| panic!("invalid wikilink regex: {e}"))
});

static MARKDOWN_EMBED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[[^\]]*\]\(([^)]+)\)").unwrap_or_else(|e| panic!("invalid embed regex: {e}"))
});

/// One `[[target]]` or `![[target]]` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wikilink {
    /// Link target with any `|alias` and `#heading` removed
    pub target: String,
    /// Written as `![[...]]`
    pub embed: bool,
}

/// Wikilinks in document order. Links with an empty target (`[[#heading]]`,
/// a link to the same note) are skipped.
pub fn wikilinks(text: &str) -> Vec<Wikilink> {
    WIKILINK_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let raw = caps.get(2)?.as_str();
            let target = link_target(raw);
            if target.is_empty() {
                return None;
            }
            Some(Wikilink {
                target: target.to_string(),
                embed: caps.get(1).is_some(),
            })
        })
        .collect()
}

fn link_target(raw: &str) -> &str {
    let without_alias = raw.split('|').next().unwrap_or(raw);
    let without_heading = without_alias.split('#').next().unwrap_or(without_alias);
    without_heading.trim()
}

/// Targets of `![alt](path)` embeds. Remote URLs are skipped and `<...>`
/// wrappers and titles (`path "title"`) are removed.
pub fn markdown_embeds(text: &str) -> Vec<String> {
    MARKDOWN_EMBED_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let raw = caps.get(1)?.as_str().trim();
            let raw = raw
                .strip_prefix('<')
                .and_then(|r| r.strip_suffix('>'))
                .unwrap_or_else(|| raw.split_whitespace().next().unwrap_or(raw));
            if raw.is_empty() || raw.contains("://") || raw.starts_with("data:") {
                return None;
            }
            Some(raw.replace("%20", " "))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wikilinks_strip_alias_and_heading() {
        let text = "See [[Project Plan|the plan]], [[notes/idea#Scope]] and ![[diagram.png]].";
        assert_eq!(
            wikilinks(text),
            vec![
                Wikilink {
                    target: "Project Plan".to_string(),
                    embed: false,
                },
                Wikilink {
                    target: "notes/idea".to_string(),
                    embed: false,
                },
                Wikilink {
                    target: "diagram.png".to_string(),
                    embed: true,
                },
            ]
        );
    }

    #[test]
    fn test_wikilinks_skip_self_heading() {
        assert!(wikilinks("jump to [[#Summary]]").is_empty());
        assert!(wikilinks("no links here [not one]").is_empty());
    }

    #[test]
    fn test_markdown_embeds() {
        let text = "![cat](images/cat.png)\n\
                    ![](<my file.pdf>)\n\
                    ![remote](https://x.io/a.png)\n\
                    ![t](a.jpg \"title\")\n\
                    [link](not-embed.png)";
        assert_eq!(markdown_embeds(text), vec!["images/cat.png", "my file.pdf", "a.jpg"]);
    }

    #[test]
    fn test_markdown_embeds_decode_spaces() {
        assert_eq!(markdown_embeds("![x](my%20scan.pdf)"), vec!["my scan.pdf"]);
    }
}
