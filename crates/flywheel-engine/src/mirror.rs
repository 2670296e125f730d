//! Projection of parsed notes into persistent-store rows.

use flywheel_core::{EntityCategory, Note};
use flywheel_store::{flatten_front_matter, EntityRow, FullTextRow};

pub fn full_text_row(note: &Note, body: &str) -> FullTextRow {
    FullTextRow {
        path: note.path.clone(),
        title: note.title.clone(),
        front_matter: flatten_front_matter(&note.front_matter),
        body: body.to_string(),
        modified: note.modified,
    }
}

/// One catalogue row per note: the title entity, with the note's aliases
/// attached. Category comes from the `category` (or `type`) front-matter
/// field, falling back to the top-level folder name.
pub fn entity_row(note: &Note) -> EntityRow {
    EntityRow {
        folded_name: flywheel_core::fold_entity_key(&note.title),
        display_name: note.title.clone(),
        owning_path: note.path.clone(),
        category: category_of(note),
        aliases: note.aliases.clone(),
        relevance_score: 0.0,
        embedding: None,
    }
}

fn category_of(note: &Note) -> EntityCategory {
    let declared = note
        .front_matter
        .get("category")
        .or_else(|| note.front_matter.get("type"))
        .and_then(|v| v.as_str())
        .map(EntityCategory::parse);
    match declared {
        Some(category) if category != EntityCategory::Other => category,
        _ => note
            .path
            .split('/')
            .next()
            .map(EntityCategory::parse)
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use flywheel_core::{FieldMap, FieldValue};

    fn note(path: &str, fm: FieldMap) -> Note {
        Note {
            path: path.to_string(),
            title: flywheel_core::note_title(path),
            aliases: vec!["Alt".to_string()],
            front_matter: fm,
            tags: Default::default(),
            outlinks: Vec::new(),
            modified: DateTime::UNIX_EPOCH,
            content_hash: String::new(),
            parse_error: false,
        }
    }

    #[test]
    fn category_prefers_frontmatter_over_folder() {
        let mut fm = FieldMap::new();
        fm.insert("category".into(), FieldValue::String("person".into()));
        let row = entity_row(&note("misc/Ada.md", fm));
        assert_eq!(row.category, EntityCategory::People);
    }

    #[test]
    fn category_falls_back_to_folder() {
        let row = entity_row(&note("projects/Engine.md", FieldMap::new()));
        assert_eq!(row.category, EntityCategory::Projects);
        assert_eq!(row.aliases, vec!["Alt".to_string()]);
    }

    #[test]
    fn unknown_folder_is_other() {
        let row = entity_row(&note("daily/2025-01-01.md", FieldMap::new()));
        assert_eq!(row.category, EntityCategory::Other);
    }
}
