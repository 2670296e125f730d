//! Fence-aware line scanner for headings, wikilinks, and inline tags.

use regex::Regex;
use std::sync::OnceLock;

/// An ATX heading with its computed section bounds.
///
/// `end_line` is the line before the next heading of equal-or-lower level,
/// or the last line of the file. All line numbers are 1-based and
/// file-absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    pub line: u32,
    /// 1–6.
    pub level: u8,
    /// Heading text with the marker and any trailing `#` run stripped.
    pub text: String,
    pub start_line: u32,
    pub content_start_line: u32,
    pub end_line: u32,
}

/// One `[[target]]` or `[[target|display]]` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wikilink {
    /// Trimmed raw target before any `|`, `#`/`^` suffixes retained.
    pub target: String,
    pub display: Option<String>,
    pub line: u32,
    /// `![[...]]` transclusion.
    pub embed: bool,
}

/// One inline `#tag` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineTag {
    pub name: String,
    pub line: u32,
}

#[derive(Debug, Default)]
pub(crate) struct ScanResult {
    pub headings: Vec<Heading>,
    pub wikilinks: Vec<Wikilink>,
    pub inline_tags: Vec<InlineTag>,
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s{0,3}(```|~~~)").expect("static regex"))
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})(?:\s+(.*))?$").expect("static regex"))
}

fn wikilink_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(!?)\[\[([^\[\]\n]+?)\]\]").expect("static regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // No lookbehind in the regex crate; the leading group rejects word
    // characters and `#` so `foo#bar` and `##` never match.
    RE.get_or_init(|| {
        Regex::new(r"(^|[^\w#])#([A-Za-z_][A-Za-z0-9_-]*(?:/[A-Za-z0-9_-]+)*)")
            .expect("static regex")
    })
}

fn inline_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`[^`]*`").expect("static regex"))
}

/// Scan for headings, wikilinks, and inline tags.
///
/// Lines before `body_start_line` (the front-matter region) are skipped.
/// Heading and tag matches are suppressed inside fenced blocks and 4-space
/// indented code; wikilinks are suppressed inside fences.
pub(crate) fn scan(raw: &str, body_start_line: u32) -> ScanResult {
    let mut result = ScanResult::default();
    let mut in_fence = false;

    let segments: Vec<&str> = raw.split('\n').collect();
    // A trailing newline produces one empty final segment that is not a line.
    let total_lines = match segments.last() {
        Some(last) if last.is_empty() && segments.len() > 1 => (segments.len() - 1) as u32,
        Some(_) if raw.is_empty() => 0,
        Some(_) => segments.len() as u32,
        None => 0,
    };

    for (idx, segment) in segments.iter().enumerate() {
        let line_no = (idx + 1) as u32;
        let text = segment.strip_suffix('\r').unwrap_or(segment);
        if line_no < body_start_line {
            continue;
        }

        if fence_re().is_match(text) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        let indented_code = text.starts_with("    ") || text.starts_with('\t');

        if !indented_code {
            if let Some(caps) = heading_re().captures(text) {
                let level = caps[1].len() as u8;
                let raw_text = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                result.headings.push(Heading {
                    line: line_no,
                    level,
                    text: strip_closing_hashes(raw_text),
                    start_line: line_no,
                    content_start_line: line_no + 1,
                    end_line: 0,
                });
                continue;
            }
        }

        for caps in wikilink_re().captures_iter(text) {
            let inner = &caps[2];
            let (target, display) = match inner.find('|') {
                Some(pos) => (
                    inner[..pos].trim().to_string(),
                    Some(inner[pos + 1..].trim().to_string()),
                ),
                None => (inner.trim().to_string(), None),
            };
            if target.is_empty() {
                continue;
            }
            result.wikilinks.push(Wikilink {
                target,
                display,
                line: line_no,
                embed: !caps[1].is_empty(),
            });
        }

        if !indented_code {
            let masked = mask_tag_exclusions(text);
            for caps in tag_re().captures_iter(&masked) {
                result.inline_tags.push(InlineTag {
                    name: caps[2].to_string(),
                    line: line_no,
                });
            }
        }
    }

    compute_section_bounds(&mut result.headings, total_lines);
    result
}

/// Code-fence-aware heading extraction over full note text.
///
/// Same contract as the indexing scan; front-matter is skipped so YAML
/// comments are never read as headings.
pub fn extract_headings(content: &str) -> Vec<Heading> {
    let split = crate::frontmatter::split_frontmatter(content);
    scan(content, split.body_start_line).headings
}

/// Replace inline code spans and wikilink spans with spaces so the tag
/// regex cannot match inside them. Lengths are preserved, keeping match
/// offsets meaningful.
fn mask_tag_exclusions(line: &str) -> String {
    let mut masked = line.to_string();
    for re in [inline_code_re(), wikilink_re()] {
        masked = re
            .replace_all(&masked, |caps: &regex::Captures<'_>| {
                " ".repeat(caps[0].len())
            })
            .into_owned();
    }
    masked
}

fn strip_closing_hashes(text: &str) -> String {
    let trimmed = text.trim();
    let without = trimmed.trim_end_matches('#');
    if without.len() < trimmed.len() && (without.is_empty() || without.ends_with(' ')) {
        without.trim_end().to_string()
    } else {
        trimmed.to_string()
    }
}

fn compute_section_bounds(headings: &mut [Heading], total_lines: u32) {
    let snapshot: Vec<(u32, u8)> = headings.iter().map(|h| (h.line, h.level)).collect();
    for (idx, heading) in headings.iter_mut().enumerate() {
        let next = snapshot
            .iter()
            .skip(idx + 1)
            .find(|(_, level)| *level <= heading.level);
        heading.end_line = match next {
            Some((line, _)) => line.saturating_sub(1),
            None => total_lines,
        };
    }
}
