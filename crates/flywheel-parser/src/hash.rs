//! Content hashing.

use unicode_normalization::UnicodeNormalization;

/// blake3 digest of the NFC-normalised body with line endings normalised
/// to LF, hex-encoded. A changed hash is the trigger for re-indexing; the
/// normalisation means a CRLF⇄LF rewrite alone never re-indexes.
pub fn content_hash(body: &str) -> String {
    let normalised: String = body.replace("\r\n", "\n").nfc().collect();
    hex::encode(blake3::hash(normalised.as_bytes()).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_endings_do_not_change_hash() {
        assert_eq!(content_hash("a\r\nb\r\n"), content_hash("a\nb\n"));
    }

    #[test]
    fn nfc_equivalent_text_hashes_equal() {
        assert_eq!(content_hash("Cafe\u{0301}"), content_hash("Caf\u{00e9}"));
    }

    #[test]
    fn different_content_differs() {
        assert_ne!(content_hash("a"), content_hash("b"));
    }
}
