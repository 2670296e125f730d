//! Markdown note parser.
//!
//! Extracts the structure the graph needs from raw note text: front-matter
//! as a typed field map, ATX headings with section bounds, wikilinks, inline
//! tags, the detected line ending, and a content hash. Parsing is pure and
//! infallible; malformed front-matter degrades to an empty map with the
//! `parse_error` flag set so a single bad file never breaks indexing.
//!
//! Line numbers are 1-based and file-absolute (front-matter lines included),
//! which is what the structural writer needs to edit sections in place.

mod frontmatter;
mod hash;
mod scanner;

pub use frontmatter::split_frontmatter;
pub use hash::content_hash;
pub use scanner::{extract_headings, Heading, InlineTag, Wikilink};

use flywheel_core::{FieldMap, FieldValue, LineEnding, Outlink};
use std::collections::BTreeSet;

/// Everything the indexer extracts from one note.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNote {
    pub front_matter: FieldMap,
    /// Note text after the front-matter block (fence lines excluded).
    pub body: String,
    pub line_ending: LineEnding,
    pub headings: Vec<Heading>,
    pub wikilinks: Vec<Wikilink>,
    pub inline_tags: Vec<InlineTag>,
    /// blake3 of the NFC- and LF-normalised body, hex-encoded.
    pub content_hash: String,
    /// Set when front-matter was present but malformed.
    pub parse_error: bool,
}

impl ParsedNote {
    /// Source-ordered outlinks with their line numbers.
    pub fn outlinks(&self) -> Vec<Outlink> {
        self.wikilinks
            .iter()
            .map(|w| Outlink {
                target: w.target.clone(),
                line: w.line,
            })
            .collect()
    }

    /// Union of front-matter tags and inline tags, empty strings dropped.
    pub fn tags(&self) -> BTreeSet<String> {
        let mut tags: BTreeSet<String> = self
            .frontmatter_tags()
            .into_iter()
            .filter(|t| !t.is_empty())
            .collect();
        tags.extend(
            self.inline_tags
                .iter()
                .map(|t| t.name.clone())
                .filter(|t| !t.is_empty()),
        );
        tags
    }

    /// Tags declared in front-matter (`tags:` scalar or sequence), with any
    /// stray `#` prefix stripped.
    pub fn frontmatter_tags(&self) -> Vec<String> {
        self.front_matter
            .get("tags")
            .map(|v| {
                v.as_string_list()
                    .into_iter()
                    .map(|t| t.trim_start_matches('#').trim().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Case-preserving aliases, deduplicated after case-folding.
    pub fn aliases(&self) -> Vec<String> {
        let raw = self
            .front_matter
            .get("aliases")
            .or_else(|| self.front_matter.get("alias"))
            .map(FieldValue::as_string_list)
            .unwrap_or_default();

        let mut seen = BTreeSet::new();
        raw.into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .filter(|a| seen.insert(flywheel_core::fold_entity_key(a)))
            .collect()
    }
}

/// Detect the dominant line ending by counting `\r\n` against lone `\n`.
///
/// Empty files resolve to LF.
pub fn detect_line_ending(raw: &str) -> LineEnding {
    let crlf = raw.matches("\r\n").count();
    let lf_total = raw.matches('\n').count();
    let lone_lf = lf_total - crlf;
    if crlf > lone_lf {
        LineEnding::Crlf
    } else {
        LineEnding::Lf
    }
}

/// Parse raw note text.
pub fn parse_markdown(raw: &str) -> ParsedNote {
    let line_ending = detect_line_ending(raw);
    let split = frontmatter::split_frontmatter(raw);

    let scan = scanner::scan(raw, split.body_start_line);
    let content_hash = hash::content_hash(&split.body);

    ParsedNote {
        front_matter: split.fields,
        body: split.body,
        line_ending,
        headings: scan.headings,
        wikilinks: scan.wikilinks,
        inline_tags: scan.inline_tags,
        content_hash,
        parse_error: split.parse_error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flywheel_core::LineEnding;

    #[test]
    fn empty_file_is_lf() {
        assert_eq!(detect_line_ending(""), LineEnding::Lf);
    }

    #[test]
    fn crlf_majority_wins() {
        assert_eq!(detect_line_ending("a\r\nb\r\nc\n"), LineEnding::Crlf);
        assert_eq!(detect_line_ending("a\nb\nc\r\n"), LineEnding::Lf);
    }

    #[test]
    fn parse_is_deterministic() {
        let content = "---\ntags: [a]\n---\n# H\nBody [[X]] #t\n";
        assert_eq!(parse_markdown(content), parse_markdown(content));
    }

    #[test]
    fn unchanged_body_keeps_hash_across_line_endings() {
        let lf = parse_markdown("# H\nline one\nline two\n");
        let crlf = parse_markdown("# H\r\nline one\r\nline two\r\n");
        assert_eq!(lf.content_hash, crlf.content_hash);
    }
}
