//! Whole-note parsing tests: tag union, alias handling, outlink order,
//! and parse-error degradation.

use flywheel_parser::parse_markdown;
use pretty_assertions::assert_eq;

#[test]
fn tags_are_union_of_frontmatter_and_inline() {
    let content = r#"---
tags: [project, project/active]
---
Working on #project today, also #review.
"#;
    let parsed = parse_markdown(content);
    let tag_set = parsed.tags();
    let tags: Vec<&str> = tag_set.iter().map(String::as_str).collect();
    assert_eq!(tags, vec!["project", "project/active", "review"]);
}

#[test]
fn scalar_tag_and_hash_prefix_accepted() {
    let content = "---\ntags: \"#inbox\"\n---\nbody\n";
    let parsed = parse_markdown(content);
    assert!(parsed.tags().contains("inbox"));
}

#[test]
fn tags_never_contain_empty_strings() {
    let content = "---\ntags: [\"\", real]\n---\n";
    let parsed = parse_markdown(content);
    assert!(!parsed.tags().contains(""));
    assert!(parsed.tags().contains("real"));
}

#[test]
fn aliases_dedupe_case_folded_preserving_first() {
    let content = "---\naliases: [Ada, ADA, \"Countess of Lovelace\"]\n---\n";
    let parsed = parse_markdown(content);
    assert_eq!(parsed.aliases(), vec!["Ada", "Countess of Lovelace"]);
}

#[test]
fn singular_alias_key_accepted() {
    let content = "---\nalias: Shortname\n---\n";
    let parsed = parse_markdown(content);
    assert_eq!(parsed.aliases(), vec!["Shortname"]);
}

#[test]
fn outlinks_preserve_source_order_and_lines() {
    let content = "---\ntitle: t\n---\nFirst [[B]] then [[A]].\n\nLater [[B|again]].\n";
    let parsed = parse_markdown(content);
    let outlinks = parsed.outlinks();
    assert_eq!(outlinks.len(), 3);
    assert_eq!(outlinks[0].target, "B");
    assert_eq!(outlinks[0].line, 4);
    assert_eq!(outlinks[1].target, "A");
    assert_eq!(outlinks[2].target, "B");
    assert_eq!(outlinks[2].line, 6);
}

#[test]
fn malformed_frontmatter_degrades_to_flagged_note() {
    let content = "---\ntitle: [broken\n---\nStill [[linked]] and #tagged.\n";
    let parsed = parse_markdown(content);
    assert!(parsed.parse_error);
    assert!(parsed.front_matter.is_empty());
    // Body constructs still parse so the graph stays consistent.
    assert_eq!(parsed.wikilinks.len(), 1);
    assert_eq!(parsed.inline_tags.len(), 1);
}

#[test]
fn body_excludes_frontmatter_fence_lines() {
    let content = "---\ntitle: x\n---\nbody line\n";
    let parsed = parse_markdown(content);
    assert_eq!(parsed.body, "body line\n");
}

#[test]
fn heading_lines_are_file_absolute() {
    let content = "---\ntitle: x\n---\n# First\n\n## Log\n- a\n";
    let parsed = parse_markdown(content);
    assert_eq!(parsed.headings[0].line, 4);
    assert_eq!(parsed.headings[1].line, 6);
    assert_eq!(parsed.headings[1].end_line, 7);
}

#[test]
fn crlf_note_parses_identically_to_lf() {
    let lf = "---\ntags: [a]\n---\n# H\n[[X]] #t\n";
    let crlf = lf.replace('\n', "\r\n");
    let a = parse_markdown(lf);
    let b = parse_markdown(&crlf);
    assert_eq!(a.tags(), b.tags());
    assert_eq!(a.outlinks(), b.outlinks());
    assert_eq!(a.content_hash, b.content_hash);
    assert_ne!(a.line_ending, b.line_ending);
}
