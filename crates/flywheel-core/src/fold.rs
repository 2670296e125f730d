//! Entity-key folding.
//!
//! Titles, aliases, and wikilink targets are all compared through one
//! folded form: NFC-normalised, lowercased, whitespace-trimmed. Folding is
//! Unicode simple case mapping with no locale tailoring (Turkish dotted-I
//! and German ß fold the standard way).

use unicode_normalization::UnicodeNormalization;

/// Fold a title or alias into its entity-map key.
pub fn fold_entity_key(name: &str) -> String {
    name.trim().nfc().collect::<String>().to_lowercase()
}

/// Fold a raw wikilink target for resolution.
///
/// Strips the `#heading` fragment and `^block` suffix first; the raw form is
/// what the note's outlinks record, this is only the lookup key.
pub fn link_resolution_key(raw_target: &str) -> String {
    let base = match raw_target.find(['#', '^']) {
        Some(idx) => &raw_target[..idx],
        None => raw_target,
    };
    fold_entity_key(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folding_is_case_insensitive_and_trimmed() {
        assert_eq!(fold_entity_key("  Project X "), "project x");
        assert_eq!(fold_entity_key("CAFÉ"), "café");
    }

    #[test]
    fn folding_normalizes_to_nfc() {
        // "é" as combining sequence vs precomposed
        assert_eq!(fold_entity_key("Cafe\u{0301}"), fold_entity_key("Caf\u{00e9}"));
    }

    #[test]
    fn resolution_strips_fragments() {
        assert_eq!(link_resolution_key("Note#Section"), "note");
        assert_eq!(link_resolution_key("Note#^block-id"), "note");
        assert_eq!(link_resolution_key("Note^ref"), "note");
        assert_eq!(link_resolution_key("Plain"), "plain");
    }
}
