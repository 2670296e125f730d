//! Front-matter extraction.

use flywheel_core::{FieldMap, FieldValue};

/// Result of splitting a note into front-matter and body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrontmatterSplit {
    pub fields: FieldMap,
    /// Text after the front-matter terminator line (whole file when absent).
    pub body: String,
    /// 1-based file line where the body starts.
    pub body_start_line: u32,
    /// Front-matter was present but its YAML did not parse.
    pub parse_error: bool,
    /// Verbatim YAML between the delimiters, for writers that must not
    /// reformat untouched front-matter.
    pub raw: Option<String>,
}

/// Split raw note text into front-matter fields and body.
///
/// A front-matter block is a leading `---` line with a matching `---`
/// terminator; the enclosed YAML becomes the typed field map. A missing
/// terminator means the file simply starts with a horizontal rule, so the
/// whole text is body. Malformed YAML yields an empty mapping plus the
/// `parse_error` flag; it never fails the parse.
pub fn split_frontmatter(raw: &str) -> FrontmatterSplit {
    let mut lines: Vec<(&str, usize)> = Vec::new();
    let mut offset = 0;
    for segment in raw.split('\n') {
        lines.push((segment.strip_suffix('\r').unwrap_or(segment), offset));
        offset += segment.len() + 1;
    }

    let opens = lines.first().map(|(text, _)| *text == "---").unwrap_or(false);
    if !opens {
        return FrontmatterSplit {
            body: raw.to_string(),
            body_start_line: 1,
            ..Default::default()
        };
    }

    let terminator = lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, (text, _))| *text == "---")
        .map(|(idx, _)| idx);

    let Some(end_idx) = terminator else {
        return FrontmatterSplit {
            body: raw.to_string(),
            body_start_line: 1,
            ..Default::default()
        };
    };

    let yaml_start = lines[1].1;
    let yaml_end = lines[end_idx].1;
    let yaml = &raw[yaml_start..yaml_end];

    let body_offset = lines
        .get(end_idx + 1)
        .map(|(_, off)| *off)
        .unwrap_or(raw.len());
    let body = raw.get(body_offset..).unwrap_or("").to_string();
    let body_start_line = (end_idx + 2) as u32;

    let (fields, parse_error) = parse_yaml_fields(yaml);
    FrontmatterSplit {
        fields,
        body,
        body_start_line,
        parse_error,
        raw: Some(yaml.to_string()),
    }
}

fn parse_yaml_fields(yaml: &str) -> (FieldMap, bool) {
    if yaml.trim().is_empty() {
        return (FieldMap::new(), false);
    }
    match serde_yaml::from_str::<serde_yaml::Value>(yaml) {
        Ok(value @ serde_yaml::Value::Mapping(_)) => match FieldValue::from_yaml(&value) {
            FieldValue::Map(map) => (map, false),
            _ => (FieldMap::new(), true),
        },
        Ok(serde_yaml::Value::Null) => (FieldMap::new(), false),
        Ok(_) => (FieldMap::new(), true),
        Err(_) => (FieldMap::new(), true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_basic_frontmatter() {
        let raw = "---\ntitle: Test\n---\n# Body\n";
        let split = split_frontmatter(raw);
        assert_eq!(
            split.fields.get("title").and_then(|v| v.as_str()),
            Some("Test")
        );
        assert_eq!(split.body, "# Body\n");
        assert_eq!(split.body_start_line, 4);
        assert!(!split.parse_error);
    }

    #[test]
    fn respects_crlf_delimiters() {
        let raw = "---\r\ntype: daily\r\n---\r\n# H\r\n";
        let split = split_frontmatter(raw);
        assert_eq!(
            split.fields.get("type").and_then(|v| v.as_str()),
            Some("daily")
        );
        assert_eq!(split.body, "# H\r\n");
    }

    #[test]
    fn missing_terminator_is_all_body() {
        let raw = "---\nnot yaml, just a rule\n";
        let split = split_frontmatter(raw);
        assert!(split.fields.is_empty());
        assert_eq!(split.body, raw);
        assert_eq!(split.body_start_line, 1);
        assert!(!split.parse_error);
    }

    #[test]
    fn malformed_yaml_sets_flag() {
        let raw = "---\ntitle: [unterminated\n---\nbody\n";
        let split = split_frontmatter(raw);
        assert!(split.fields.is_empty());
        assert!(split.parse_error);
        assert_eq!(split.body, "body\n");
    }

    #[test]
    fn empty_block_is_not_an_error() {
        let raw = "---\n---\nbody\n";
        let split = split_frontmatter(raw);
        assert!(split.fields.is_empty());
        assert!(!split.parse_error);
    }

    #[test]
    fn no_frontmatter() {
        let split = split_frontmatter("just text\n");
        assert!(split.fields.is_empty());
        assert_eq!(split.body_start_line, 1);
    }
}
