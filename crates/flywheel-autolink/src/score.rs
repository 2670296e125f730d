//! Entity match scoring.

use crate::mask::Occurrence;
use flywheel_core::{AutolinkConfig, CategoryWeights, EntityCategory};
use flywheel_store::EntityRow;

/// Score an entity's presence in a text.
///
/// Combines the category base weight, a capped per-occurrence bonus, a
/// boundary reward scaled by how many occurrences match the display case,
/// a folder-affinity boost, and the short-name penalty for names below the
/// configured length that are not registered acronyms.
pub fn score_entity(
    entity: &EntityRow,
    occurrences: &[Occurrence],
    source_path: Option<&str>,
    config: &AutolinkConfig,
) -> f64 {
    if occurrences.is_empty() {
        return 0.0;
    }

    let mut score = category_weight(entity.category, &config.category_weights);

    let extra = (occurrences.len() - 1) as f64 * config.occurrence_weight;
    score += extra.min(config.max_occurrence_bonus);

    let exact = occurrences.iter().filter(|o| o.exact_case).count() as f64;
    let strength = (exact / occurrences.len() as f64).max(0.5);
    score += config.boundary_weight * strength;

    if let Some(path) = source_path {
        let folder = path.split('/').next().unwrap_or("");
        if entity.category != EntityCategory::Other
            && EntityCategory::parse(folder) == entity.category
        {
            score += config.folder_affinity_boost;
        }
    }

    if entity.display_name.chars().count() < config.min_name_len
        && entity.category != EntityCategory::Acronyms
    {
        score -= config.short_name_penalty;
    }

    score
}

fn category_weight(category: EntityCategory, weights: &CategoryWeights) -> f64 {
    match category {
        EntityCategory::People => weights.people,
        EntityCategory::Projects => weights.projects,
        EntityCategory::Technologies => weights.technologies,
        EntityCategory::Acronyms => weights.acronyms,
        EntityCategory::Organisations => weights.organisations,
        EntityCategory::Locations => weights.locations,
        EntityCategory::Concepts => weights.concepts,
        EntityCategory::Other => weights.other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occ(exact: bool) -> Occurrence {
        Occurrence {
            start: 0,
            end: 1,
            exact_case: exact,
        }
    }

    #[test]
    fn more_occurrences_score_higher_up_to_cap() {
        let config = AutolinkConfig::default();
        let e = EntityRow::new("Alice", "people/Alice.md");
        let one = score_entity(&e, &[occ(true)], None, &config);
        let two = score_entity(&e, &[occ(true), occ(true)], None, &config);
        let many = score_entity(&e, &vec![occ(true); 10], None, &config);
        assert!(two > one);
        assert!((many - two).abs() < config.occurrence_weight + f64::EPSILON);
    }

    #[test]
    fn folder_affinity_boosts_matching_category() {
        let config = AutolinkConfig::default();
        let e = EntityRow::new("Alice", "people/Alice.md")
            .with_category(EntityCategory::People);
        let neutral = score_entity(&e, &[occ(true)], Some("daily/x.md"), &config);
        let boosted = score_entity(&e, &[occ(true)], Some("people/y.md"), &config);
        assert!((boosted - neutral - config.folder_affinity_boost).abs() < 1e-9);
    }

    #[test]
    fn short_non_acronym_is_penalised() {
        let config = AutolinkConfig::default();
        let tech = EntityRow::new("Go", "t/Go.md").with_category(EntityCategory::Technologies);
        let acro = EntityRow::new("Go", "t/Go.md").with_category(EntityCategory::Acronyms);
        let tech_score = score_entity(&tech, &[occ(true)], None, &config);
        let acro_score = score_entity(&acro, &[occ(true)], None, &config);
        assert!(acro_score > tech_score);
    }
}
