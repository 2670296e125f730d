//! Data model: notes, outlinks, typed front-matter values.

use chrono::{DateTime, NaiveDate, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;

/// Detected line-ending convention of a file.
///
/// Writers must restore this on save; see the structural writer's
/// round-trip contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Lf,
    Crlf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Crlf => "\r\n",
        }
    }
}

/// A typed front-matter value.
///
/// Front-matter is arbitrary YAML; it is modelled as a tagged tree rather
/// than raw `serde_yaml::Value` so that dates are first-class and mapping
/// key order survives a read/write round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    String(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    List(Vec<FieldValue>),
    Map(FieldMap),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Flatten a scalar-or-list value into owned strings.
    ///
    /// `tags: project` and `tags: [project, active]` both come out as a
    /// vector; non-string scalars are rendered through their display form.
    pub fn as_string_list(&self) -> Vec<String> {
        match self {
            Self::List(items) => items.iter().filter_map(|v| v.to_display_string()).collect(),
            other => other.to_display_string().into_iter().collect(),
        }
    }

    fn to_display_string(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Bool(b) => Some(b.to_string()),
            Self::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Self::List(_) | Self::Map(_) => None,
        }
    }

    /// Convert a parsed YAML value, typing `YYYY-MM-DD` scalars as dates.
    pub fn from_yaml(value: &serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => Self::String(String::new()),
            serde_yaml::Value::Bool(b) => Self::Bool(*b),
            serde_yaml::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(0.0)),
            serde_yaml::Value::String(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                Ok(date) if looks_like_date(s) => Self::Date(date),
                _ => Self::String(s.clone()),
            },
            serde_yaml::Value::Sequence(items) => {
                Self::List(items.iter().map(Self::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(mapping) => {
                let mut map = FieldMap::new();
                for (k, v) in mapping {
                    let key = match k {
                        serde_yaml::Value::String(s) => s.clone(),
                        other => serde_yaml::to_string(other)
                            .map(|s| s.trim_end().to_string())
                            .unwrap_or_default(),
                    };
                    map.insert(key, Self::from_yaml(v));
                }
                Self::Map(map)
            }
            serde_yaml::Value::Tagged(tagged) => Self::from_yaml(&tagged.value),
        }
    }

    /// Convert back to YAML for serialisation by the structural writer.
    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            Self::String(s) => serde_yaml::Value::String(s.clone()),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    serde_yaml::Value::Number(serde_yaml::Number::from(*n as i64))
                } else {
                    serde_yaml::Value::Number(serde_yaml::Number::from(*n))
                }
            }
            Self::Bool(b) => serde_yaml::Value::Bool(*b),
            Self::Date(d) => serde_yaml::Value::String(d.format("%Y-%m-%d").to_string()),
            Self::List(items) => {
                serde_yaml::Value::Sequence(items.iter().map(Self::to_yaml).collect())
            }
            Self::Map(map) => {
                let mut mapping = serde_yaml::Mapping::new();
                for (k, v) in map.iter() {
                    mapping.insert(serde_yaml::Value::String(k.clone()), v.to_yaml());
                }
                serde_yaml::Value::Mapping(mapping)
            }
        }
    }

    /// Convert a JSON value supplied by a tool caller.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::String(String::new()),
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                Ok(date) if looks_like_date(s) => Self::Date(date),
                _ => Self::String(s.clone()),
            },
            serde_json::Value::Array(items) => {
                Self::List(items.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(obj) => {
                let mut map = FieldMap::new();
                for (k, v) in obj {
                    map.insert(k.clone(), Self::from_json(v));
                }
                Self::Map(map)
            }
        }
    }
}

fn looks_like_date(s: &str) -> bool {
    s.len() == 10 && s.as_bytes()[4] == b'-' && s.as_bytes()[7] == b'-'
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

/// Ordered string-keyed mapping of front-matter fields.
///
/// Backed by a vector so key order is preserved through read/write round
/// trips; lookups are linear, which is fine at front-matter sizes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldMap(Vec<(String, FieldValue)>);

impl FieldMap {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Insert or replace in place; a replaced key keeps its position.
    pub fn insert(&mut self, key: String, value: FieldValue) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        let idx = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(idx).1)
    }

    /// Rename a key, keeping its value and position.
    pub fn rename_key(&mut self, old: &str, new: &str) -> bool {
        match self.0.iter_mut().find(|(k, _)| k == old) {
            Some(entry) => {
                entry.0 = new.to_string();
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, FieldValue)> {
        self.0.iter()
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut FieldValue> {
        self.0.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

impl FromIterator<(String, FieldValue)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            out.serialize_entry(k, v)?;
        }
        out.end()
    }
}

/// One wikilink occurrence in a note body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outlink {
    /// Raw link text before any `|` alias, `#` fragment retained.
    pub target: String,
    /// 1-based source line.
    pub line: u32,
}

/// The authoritative record for one Markdown file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    /// Forward-slash path relative to the vault root, original case.
    pub path: String,
    /// File stem.
    pub title: String,
    /// Case-preserving aliases from front-matter, deduplicated case-folded.
    pub aliases: Vec<String>,
    pub front_matter: FieldMap,
    /// Union of front-matter tags and inline `#tag` occurrences.
    pub tags: BTreeSet<String>,
    /// Source-ordered wikilinks with line numbers.
    pub outlinks: Vec<Outlink>,
    pub modified: DateTime<Utc>,
    /// Digest of normalised content; unchanged hash short-circuits re-indexing.
    pub content_hash: String,
    /// Set when the file failed to parse and was indexed with empty
    /// outlinks/tags to keep the graph consistent.
    pub parse_error: bool,
}

/// Category of a persistent entity row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityCategory {
    People,
    Projects,
    Technologies,
    Acronyms,
    Organisations,
    Locations,
    Concepts,
    #[default]
    Other,
}

impl EntityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::People => "people",
            Self::Projects => "projects",
            Self::Technologies => "technologies",
            Self::Acronyms => "acronyms",
            Self::Organisations => "organisations",
            Self::Locations => "locations",
            Self::Concepts => "concepts",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "people" | "person" => Self::People,
            "projects" | "project" => Self::Projects,
            "technologies" | "technology" | "tech" => Self::Technologies,
            "acronyms" | "acronym" => Self::Acronyms,
            "organisations" | "organizations" | "org" => Self::Organisations,
            "locations" | "location" | "place" => Self::Locations,
            "concepts" | "concept" => Self::Concepts,
            _ => Self::Other,
        }
    }
}
