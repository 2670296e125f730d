//! Auto-wikilink resolver.
//!
//! Scores entity mentions in free text against the entity catalogue and
//! rewrites the first qualifying occurrence per entity into a `[[...]]`
//! link. The resolver is a pure function of `(text, source_path,
//! catalogue, config)`; identical inputs always produce identical outputs,
//! which the tests pin down.

mod mask;
mod score;

pub use mask::{find_occurrences, linked_targets, mask_unlinkable, Occurrence};
pub use score::score_entity;

use flywheel_core::{fold_entity_key, AutolinkConfig, EntityCategory};
use flywheel_store::EntityRow;
use serde::Serialize;
use std::collections::BTreeSet;

/// A near-miss entity worth surfacing to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub name: String,
    pub path: String,
    pub score: f64,
    /// Ready-to-append form, e.g. `[[Project X]]`.
    pub formatted: Option<String>,
}

/// A short form found in the text that could become a new alias.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct AliasProposal {
    pub entity: String,
    pub proposed_alias: String,
}

/// Result of one resolver pass.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct AutolinkOutcome {
    pub modified_text: String,
    pub links_added: usize,
    pub linked_entities: Vec<String>,
    pub suggestions: Vec<Suggestion>,
    pub alias_proposals: Vec<AliasProposal>,
}

/// Rewrite `text`, linking the first qualifying occurrence of each entity.
pub fn resolve(
    text: &str,
    source_path: Option<&str>,
    catalogue: &[EntityRow],
    config: &AutolinkConfig,
) -> AutolinkOutcome {
    let masked = mask::mask_unlinkable(text);
    let already_linked = mask::linked_targets(text);

    // Longest names first so "Project X" claims its span before "Project"
    // could; the folded name breaks ties deterministically.
    let mut ordered: Vec<&EntityRow> = catalogue.iter().collect();
    ordered.sort_by(|a, b| {
        b.display_name
            .len()
            .cmp(&a.display_name.len())
            .then_with(|| a.folded_name.cmp(&b.folded_name))
    });

    let mut outcome = AutolinkOutcome::default();
    let mut claimed: Vec<(usize, usize)> = Vec::new();
    let mut replacements: Vec<(usize, usize, String)> = Vec::new();

    for entity in ordered {
        // Aliases count as mentions of the entity and are linkable via
        // `[[Name|surface]]`.
        let mut occurrences = mask::find_occurrences(&masked, text, &entity.display_name);
        for alias in &entity.aliases {
            occurrences.extend(mask::find_occurrences(&masked, text, alias));
        }
        occurrences.sort_by_key(|occ| occ.start);
        if occurrences.is_empty() {
            continue;
        }
        let score = score::score_entity(entity, &occurrences, source_path, config);
        let is_linked = already_linked.contains(&entity.folded_name);

        if score >= config.link_threshold && !is_linked {
            let free = occurrences
                .iter()
                .find(|occ| !overlaps(&claimed, occ.start, occ.end));
            if let Some(occ) = free {
                let surface = &text[occ.start..occ.end];
                let link = if surface == entity.display_name {
                    format!("[[{}]]", entity.display_name)
                } else {
                    format!("[[{}|{}]]", entity.display_name, surface)
                };
                claimed.push((occ.start, occ.end));
                replacements.push((occ.start, occ.end, link));
                outcome.linked_entities.push(entity.display_name.clone());
                continue;
            }
        }

        if score >= config.suggest_threshold {
            outcome.suggestions.push(Suggestion {
                name: entity.display_name.clone(),
                path: entity.owning_path.clone(),
                score,
                formatted: Some(format!("[[{}]]", entity.display_name)),
            });
        }
    }

    // Apply back-to-front so earlier offsets stay valid.
    replacements.sort_by(|a, b| b.0.cmp(&a.0));
    let mut modified = text.to_string();
    for (start, end, link) in &replacements {
        modified.replace_range(*start..*end, link);
    }
    outcome.links_added = replacements.len();
    outcome.modified_text = modified;
    outcome
        .suggestions
        .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name)));
    outcome.alias_proposals = propose_aliases(text, &masked, catalogue);
    outcome
}

fn overlaps(claimed: &[(usize, usize)], start: usize, end: usize) -> bool {
    claimed.iter().any(|(s, e)| start < *e && *s < end)
}

/// Propose acronyms of multi-word entities that appear in the text but are
/// not yet registered anywhere in the catalogue.
fn propose_aliases(text: &str, masked: &str, catalogue: &[EntityRow]) -> Vec<AliasProposal> {
    let registered: BTreeSet<String> = catalogue
        .iter()
        .flat_map(|e| {
            std::iter::once(e.folded_name.clone())
                .chain(e.aliases.iter().map(|a| fold_entity_key(a)))
        })
        .collect();

    let mut proposals = Vec::new();
    for entity in catalogue {
        let words: Vec<&str> = entity.display_name.split_whitespace().collect();
        if words.len() < 2 {
            continue;
        }
        let acronym: String = words
            .iter()
            .filter_map(|w| w.chars().next())
            .collect::<String>()
            .to_uppercase();
        if acronym.chars().count() < 2 {
            continue;
        }
        if registered.contains(&fold_entity_key(&acronym)) {
            continue;
        }
        // The acronym must literally occur in the (unmasked-linkable) text.
        let present = mask::find_occurrences(masked, text, &acronym)
            .iter()
            .any(|occ| &text[occ.start..occ.end] == acronym);
        if present {
            proposals.push(AliasProposal {
                entity: entity.display_name.clone(),
                proposed_alias: acronym,
            });
        }
    }
    proposals.sort();
    proposals.dedup();
    proposals
}

/// Convenience constructor for catalogue rows in tests and callers.
pub fn entity(name: &str, path: &str, category: EntityCategory) -> EntityRow {
    EntityRow::new(name, path).with_category(category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flywheel_core::EntityCategory;

    fn config() -> AutolinkConfig {
        AutolinkConfig::default()
    }

    fn catalogue() -> Vec<EntityRow> {
        vec![
            entity("Alice", "people/Alice.md", EntityCategory::People),
            entity("Project X", "projects/Project X.md", EntityCategory::Projects),
        ]
    }

    #[test]
    fn links_first_occurrence_only() {
        let text = "Met with Alice about Project X and project x. Alice agreed.";
        let outcome = resolve(text, None, &catalogue(), &config());

        assert!(outcome.linked_entities.contains(&"Alice".to_string()));
        assert!(outcome.linked_entities.contains(&"Project X".to_string()));
        assert_eq!(outcome.modified_text.matches("[[Alice]]").count(), 1);
        // The later occurrences stay as-is.
        assert!(outcome.modified_text.contains("Alice agreed."));
        assert!(!outcome.modified_text.contains("[[["));
    }

    #[test]
    fn case_variant_surface_becomes_display_alias() {
        let text = "Heard about project x yesterday.";
        let outcome = resolve(text, None, &catalogue(), &config());
        assert!(outcome.modified_text.contains("[[Project X|project x]]"));
    }

    #[test]
    fn already_linked_entity_is_not_relinked() {
        let text = "See [[Alice]] and Alice again.";
        let outcome = resolve(text, None, &catalogue(), &config());
        assert_eq!(outcome.links_added, 0);
        assert_eq!(outcome.modified_text, text);
    }

    #[test]
    fn code_spans_are_never_linked() {
        let text = "`Alice` in code and\n```\nAlice in a fence\n```\n";
        let outcome = resolve(text, None, &catalogue(), &config());
        assert_eq!(outcome.links_added, 0);
        assert_eq!(outcome.modified_text, text);
    }

    #[test]
    fn resolver_is_deterministic() {
        let text = "Alice and Project X and PX everywhere: Alice, Project X.";
        let a = resolve(text, Some("daily/x.md"), &catalogue(), &config());
        let b = resolve(text, Some("daily/x.md"), &catalogue(), &config());
        assert_eq!(a, b);
    }

    #[test]
    fn short_names_need_acronym_registration() {
        let mut cat = vec![entity("Go", "tech/Go.md", EntityCategory::Technologies)];
        let text = "Learning Go this week. Go is fun. Go go go.";
        let outcome = resolve(text, None, &cat, &config());
        assert_eq!(outcome.links_added, 0);

        cat[0].category = EntityCategory::Acronyms;
        let outcome = resolve(text, None, &cat, &config());
        assert_eq!(outcome.links_added, 1);
    }

    #[test]
    fn acronym_alias_proposed_for_multiword_entity() {
        let text = "Kickoff for PX went well.";
        let outcome = resolve(text, None, &catalogue(), &config());
        assert_eq!(
            outcome.alias_proposals,
            vec![AliasProposal {
                entity: "Project X".to_string(),
                proposed_alias: "PX".to_string(),
            }]
        );
    }

    #[test]
    fn colliding_acronym_is_not_proposed() {
        let mut cat = catalogue();
        cat.push(entity("PX", "other/PX.md", EntityCategory::Acronyms));
        let outcome = resolve("PX kickoff.", None, &cat, &config());
        assert!(outcome.alias_proposals.is_empty());
    }

    #[test]
    fn alias_occurrence_links_with_display_form() {
        let cat = vec![flywheel_store::EntityRow::new("Ada Lovelace", "people/Ada Lovelace.md")
            .with_category(EntityCategory::People)
            .with_aliases(vec!["Countess".to_string()])];
        let outcome = resolve("Spoke with Countess today.", None, &cat, &config());
        assert_eq!(outcome.links_added, 1);
        assert!(outcome
            .modified_text
            .contains("[[Ada Lovelace|Countess]]"));
    }

    #[test]
    fn near_miss_becomes_suggestion() {
        // One occurrence of a low-weight category scores under the link
        // threshold but over the suggestion threshold.
        let cat = vec![entity("Emergence", "concepts/Emergence.md", EntityCategory::Concepts)];
        let outcome = resolve("Thinking about emergence.", None, &cat, &config());
        assert_eq!(outcome.links_added, 0);
        assert_eq!(outcome.suggestions.len(), 1);
        assert_eq!(outcome.suggestions[0].name, "Emergence");
        assert_eq!(
            outcome.suggestions[0].formatted.as_deref(),
            Some("[[Emergence]]")
        );
    }
}
