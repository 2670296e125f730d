//! Text masking and occurrence finding.
//!
//! Masking replaces unlinkable regions (fenced blocks, inline code,
//! existing wikilinks) with NUL bytes of the same length, so byte offsets
//! found in the masked text apply directly to the original.

use flywheel_core::{fold_entity_key, link_resolution_key};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// One candidate occurrence, as byte offsets into the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub start: usize,
    pub end: usize,
    /// The surface form matched the entity name's exact case.
    pub exact_case: bool,
}

fn inline_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`[^`\n]*`").expect("static regex"))
}

fn wikilink_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\[\]\n]+?)\]\]").expect("static regex"))
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s{0,3}(```|~~~)").expect("static regex"))
}

/// Blank out fenced blocks, inline code, and existing wikilink spans.
pub fn mask_unlinkable(text: &str) -> String {
    let mut bytes = text.as_bytes().to_vec();

    // Fenced blocks, fence lines included.
    let mut in_fence = false;
    let mut offset = 0;
    for segment in text.split_inclusive('\n') {
        let line = segment.trim_end_matches(['\n', '\r']);
        let is_fence_line = fence_re().is_match(line);
        if is_fence_line || in_fence {
            bytes[offset..offset + segment.len()].fill(0);
        }
        if is_fence_line {
            in_fence = !in_fence;
        }
        offset += segment.len();
    }

    // Filled regions are whole regex matches, so char boundaries are
    // respected and the bytes stay valid UTF-8.
    for re in [inline_code_re(), wikilink_re()] {
        let text_view = String::from_utf8_lossy(&bytes).into_owned();
        for found in re.find_iter(&text_view) {
            bytes[found.start()..found.end()].fill(0);
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Folded targets and display texts of wikilinks already present.
pub fn linked_targets(text: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for caps in wikilink_re().captures_iter(text) {
        let inner = &caps[1];
        match inner.find('|') {
            Some(pos) => {
                out.insert(link_resolution_key(inner[..pos].trim()));
                out.insert(fold_entity_key(inner[pos + 1..].trim()));
            }
            None => {
                out.insert(link_resolution_key(inner.trim()));
            }
        }
    }
    out
}

/// Case-insensitive, word-boundary occurrences of `name` in the masked
/// text, reported as offsets into the original.
pub fn find_occurrences(masked: &str, original: &str, name: &str) -> Vec<Occurrence> {
    let mut out = Vec::new();
    if name.is_empty() {
        return out;
    }
    let mut pos = 0;
    while pos < masked.len() {
        if !masked.is_char_boundary(pos) {
            pos += 1;
            continue;
        }
        match match_at(masked, pos, name) {
            Some(end) => {
                let left_ok = masked[..pos]
                    .chars()
                    .next_back()
                    .map(|c| !c.is_alphanumeric())
                    .unwrap_or(true);
                let right_ok = masked[end..]
                    .chars()
                    .next()
                    .map(|c| !c.is_alphanumeric())
                    .unwrap_or(true);
                if left_ok && right_ok {
                    out.push(Occurrence {
                        start: pos,
                        end,
                        exact_case: &original[pos..end] == name,
                    });
                    pos = end;
                } else {
                    pos += 1;
                }
            }
            None => pos += 1,
        }
    }
    out
}

/// Case-insensitive match of `name` at byte offset `pos`; returns the end
/// offset on success.
fn match_at(haystack: &str, pos: usize, name: &str) -> Option<usize> {
    let mut hay = haystack[pos..].char_indices();
    let mut needle = name.chars();
    let mut end = pos;
    loop {
        let Some(n) = needle.next() else {
            return Some(end);
        };
        let (idx, h) = hay.next()?;
        if !h.to_lowercase().eq(n.to_lowercase()) {
            return None;
        }
        end = pos + idx + h.len_utf8();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_preserves_length() {
        let text = "before `code` [[Link]] after\n```\nfence body\n```\ntail";
        let masked = mask_unlinkable(text);
        assert_eq!(masked.len(), text.len());
        assert!(!masked.contains("code"));
        assert!(!masked.contains("Link"));
        assert!(!masked.contains("fence body"));
        assert!(masked.contains("before"));
        assert!(masked.contains("tail"));
    }

    #[test]
    fn linked_targets_include_display_text() {
        let targets = linked_targets("See [[Note#Frag|The Display]] here");
        assert!(targets.contains("note"));
        assert!(targets.contains("the display"));
    }

    #[test]
    fn occurrences_are_word_bounded() {
        let text = "Ada and armada and ada.";
        let occs = find_occurrences(text, text, "Ada");
        assert_eq!(occs.len(), 2);
        assert!(occs[0].exact_case);
        assert!(!occs[1].exact_case);
        assert_eq!(&text[occs[1].start..occs[1].end], "ada");
    }

    #[test]
    fn multibyte_names_match_case_insensitively() {
        let text = "Visited the CAFÉ yesterday.";
        let occs = find_occurrences(text, text, "Café");
        assert_eq!(occs.len(), 1);
        assert_eq!(&text[occs[0].start..occs[0].end], "CAFÉ");
    }
}
