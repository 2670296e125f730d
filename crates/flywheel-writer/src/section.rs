//! Section-scoped edit primitives.
//!
//! All functions take the LF-normalised body and 1-based [`Heading`]
//! bounds from [`flywheel_parser::extract_headings`]. Surrounding lines are
//! carried verbatim, which is what keeps tables, fences, and deep list
//! nesting intact.

use chrono::NaiveTime;
use flywheel_parser::{extract_headings, Heading};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Append,
    Prepend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertOptions {
    /// When prepending into an indented list, match the indentation of the
    /// first existing list item.
    pub preserve_list_nesting: bool,
}

/// Payload formatting styles for section mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStyle {
    Plain,
    Bullet,
    Task,
    /// `- **HH:MM** payload`; the timestamp is supplied by the caller so
    /// formatting stays pure.
    TimestampBullet(NaiveTime),
}

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*)([-*+])\s").expect("static regex"))
}

fn checkbox_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*[-*+]\s\[)([ xX])(\]\s)(.*)$").expect("static regex"))
}

/// First heading whose text matches exactly (case-sensitive).
pub fn find_section(body: &str, heading_name: &str) -> Option<Heading> {
    extract_headings(body)
        .into_iter()
        .find(|h| h.text == heading_name)
}

/// All section names, for actionable "not found" messages.
pub fn section_names(body: &str) -> Vec<String> {
    extract_headings(body).into_iter().map(|h| h.text).collect()
}

/// Insert payload lines into a section.
///
/// Append lands after the last non-blank line of the section (before the
/// next heading); prepend lands directly under the heading line. Bullet
/// markers in the payload are rewritten to match the marker style already
/// used in the section.
pub fn insert_in_section(
    body: &str,
    section: &Heading,
    payload: &str,
    position: Position,
    options: &InsertOptions,
) -> String {
    let mut lines = body_lines(body);
    let content_start = (section.content_start_line as usize).saturating_sub(1);
    let section_end = (section.end_line as usize).min(lines.len());

    let marker = section_marker(&lines, content_start, section_end);
    let mut payload_lines: Vec<String> = payload
        .trim_end_matches('\n')
        .split('\n')
        .map(|l| adapt_marker(l, marker))
        .collect();

    let insert_at = match position {
        Position::Append => {
            let last_content = lines[..section_end]
                .iter()
                .enumerate()
                .skip(content_start)
                .rev()
                .find(|(_, l)| !l.trim().is_empty())
                .map(|(i, _)| i + 1);
            last_content.unwrap_or(content_start)
        }
        Position::Prepend => {
            if options.preserve_list_nesting {
                if let Some(indent) = first_item_indent(&lines, content_start, section_end) {
                    payload_lines = payload_lines
                        .iter()
                        .map(|l| {
                            if l.trim().is_empty() {
                                l.clone()
                            } else {
                                format!("{indent}{l}")
                            }
                        })
                        .collect();
                }
            }
            content_start
        }
    };

    for (offset, line) in payload_lines.into_iter().enumerate() {
        lines.insert(insert_at + offset, line);
    }
    join_lines(lines)
}

/// Remove lines inside the section that contain `needle`. Returns the new
/// body and the number of removed lines.
pub fn remove_from_section(body: &str, section: &Heading, needle: &str) -> (String, usize) {
    let lines = body_lines(body);
    let content_start = (section.content_start_line as usize).saturating_sub(1);
    let section_end = (section.end_line as usize).min(lines.len());

    let mut kept = Vec::with_capacity(lines.len());
    let mut removed = 0;
    for (idx, line) in lines.into_iter().enumerate() {
        let in_section = idx >= content_start && idx < section_end;
        if in_section && line.contains(needle) {
            removed += 1;
            continue;
        }
        kept.push(line);
    }
    (join_lines(kept), removed)
}

/// Replace occurrences of `from` with `to` inside the section. Returns the
/// new body and the replacement count.
pub fn replace_in_section(
    body: &str,
    section: &Heading,
    from: &str,
    to: &str,
) -> (String, usize) {
    let mut lines = body_lines(body);
    let content_start = (section.content_start_line as usize).saturating_sub(1);
    let section_end = (section.end_line as usize).min(lines.len());

    let mut replaced = 0;
    for line in lines[content_start..section_end].iter_mut() {
        let hits = line.matches(from).count();
        if hits > 0 {
            *line = line.replace(from, to);
            replaced += hits;
        }
    }
    (join_lines(lines), replaced)
}

/// Format a payload per the requested style.
pub fn format_payload(payload: &str, style: PayloadStyle) -> String {
    let lines = payload.trim_end_matches('\n').split('\n');
    match style {
        PayloadStyle::Plain => payload.trim_end_matches('\n').to_string(),
        PayloadStyle::Bullet => lines
            .map(|l| format!("- {l}"))
            .collect::<Vec<_>>()
            .join("\n"),
        PayloadStyle::Task => lines
            .map(|l| format!("- [ ] {l}"))
            .collect::<Vec<_>>()
            .join("\n"),
        PayloadStyle::TimestampBullet(time) => {
            let stamp = time.format("%H:%M");
            lines
                .map(|l| format!("- **{stamp}** {l}"))
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

/// Toggle the first task checkbox whose text contains `task_text`.
///
/// Returns the new body and the task's new checked state, or `None` when
/// no matching task exists. Only the matched line is rewritten, so the
/// casing of every other checkbox is untouched.
pub fn toggle_task(body: &str, task_text: &str) -> Option<(String, bool)> {
    let mut lines = body_lines(body);
    let mut toggled: Option<bool> = None;

    for line in lines.iter_mut() {
        if toggled.is_some() {
            break;
        }
        if let Some(caps) = checkbox_re().captures(line) {
            if caps[4].contains(task_text) {
                let now_checked = &caps[2] == " ";
                let mark = if now_checked { "x" } else { " " };
                *line = format!("{}{}{}{}", &caps[1], mark, &caps[3], &caps[4]);
                toggled = Some(now_checked);
            }
        }
    }
    toggled.map(|state| (join_lines(lines), state))
}

fn body_lines(body: &str) -> Vec<String> {
    let mut lines: Vec<String> = body.split('\n').map(str::to_string).collect();
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

fn join_lines(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Marker character of the first list item in the section, if any.
fn section_marker(lines: &[String], start: usize, end: usize) -> Option<char> {
    lines[start..end.min(lines.len())]
        .iter()
        .find_map(|l| list_item_re().captures(l).map(|c| c[2].chars().next().unwrap_or('-')))
}

fn first_item_indent(lines: &[String], start: usize, end: usize) -> Option<String> {
    lines[start..end.min(lines.len())]
        .iter()
        .find_map(|l| list_item_re().captures(l).map(|c| c[1].to_string()))
}

/// Rewrite a leading `-` bullet to the section's marker style.
fn adapt_marker(line: &str, marker: Option<char>) -> String {
    let Some(marker) = marker else {
        return line.to_string();
    };
    if marker == '-' {
        return line.to_string();
    }
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix("- ") {
        let indent = &line[..line.len() - trimmed.len()];
        format!("{indent}{marker} {rest}")
    } else {
        line.to_string()
    }
}
