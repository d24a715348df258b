use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

pub const SCORE_MATCHED_REQUIRED: i32 = 2;
pub const SCORE_MATCHED_OPTIONAL: i32 = 1;
pub const SCORE_MISSING_REQUIRED: i32 = -2;

/// How many required ingredients a caller may be missing and still see the
/// recipe in the "almost" bucket.
pub const ALMOST_MISSING_MAX: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngredientRole {
    #[default]
    Required,
    Optional,
    Garnish,
}

/// One recipe as the matcher sees it: a display name for tie-breaking,
/// ingredient names with roles, and an opaque payload handed back untouched.
#[derive(Debug, Clone)]
pub struct MatchCandidate<R> {
    pub name: String,
    pub ingredients: Vec<(String, IngredientRole)>,
    pub payload: R,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchEntry<R> {
    pub recipe: R,
    pub score: i32,
    pub match_pct: f64,
    pub have: Vec<String>,
    pub missing: Vec<String>,
    pub can_make_now: bool,
    pub almost: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchReport<R> {
    pub can_make_now: Vec<MatchEntry<R>>,
    pub almost: Vec<MatchEntry<R>>,
}

/// Lowercases and collapses internal whitespace so "Jordbær  Sirup " and
/// "jordbær sirup" join.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Scores every candidate against the pantry snapshot and buckets the
/// results. Pure over its inputs; the caller reads both snapshots fresh on
/// every request.
pub fn find_matches<R>(
    candidates: Vec<MatchCandidate<R>>,
    pantry_names: &[String],
) -> MatchReport<R> {
    let pantry: HashSet<String> = pantry_names.iter().map(|n| normalize_name(n)).collect();

    let mut can_make_now = Vec::new();
    let mut almost = Vec::new();

    for candidate in candidates {
        let mut score = 0i32;
        let mut have = Vec::new();
        let mut missing = Vec::new();
        let mut total_required = 0usize;
        let mut matched_required = 0usize;

        for (name, role) in &candidate.ingredients {
            if *role == IngredientRole::Garnish {
                continue;
            }
            let owned = pantry.contains(&normalize_name(name));
            match role {
                IngredientRole::Required => {
                    total_required += 1;
                    if owned {
                        matched_required += 1;
                        score += SCORE_MATCHED_REQUIRED;
                        have.push(name.clone());
                    } else {
                        score += SCORE_MISSING_REQUIRED;
                        missing.push(name.clone());
                    }
                }
                IngredientRole::Optional => {
                    if owned {
                        score += SCORE_MATCHED_OPTIONAL;
                        have.push(name.clone());
                    }
                }
                IngredientRole::Garnish => unreachable!(),
            }
        }

        let match_pct = if total_required == 0 {
            0.0
        } else {
            round1(matched_required as f64 / total_required as f64 * 100.0)
        };

        let makeable = missing.is_empty() && score > 0;
        let nearly = !missing.is_empty() && missing.len() <= ALMOST_MISSING_MAX;
        if !makeable && !nearly {
            continue;
        }

        let entry = MatchEntry {
            recipe: candidate.payload,
            score,
            match_pct,
            have,
            missing,
            can_make_now: makeable,
            almost: nearly,
        };
        let name = candidate.name;
        if makeable {
            can_make_now.push((entry, name));
        } else {
            almost.push((entry, name));
        }
    }

    let rank = |a: &(MatchEntry<R>, String), b: &(MatchEntry<R>, String)| {
        b.0.score
            .cmp(&a.0.score)
            .then_with(|| {
                b.0.match_pct
                    .partial_cmp(&a.0.match_pct)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.1.cmp(&b.1))
    };
    can_make_now.sort_by(rank);
    almost.sort_by(rank);

    MatchReport {
        can_make_now: can_make_now.into_iter().map(|(e, _)| e).collect(),
        almost: almost.into_iter().map(|(e, _)| e).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, ingredients: &[(&str, IngredientRole)]) -> MatchCandidate<String> {
        MatchCandidate {
            name: name.to_string(),
            ingredients: ingredients
                .iter()
                .map(|(n, r)| (n.to_string(), *r))
                .collect(),
            payload: name.to_string(),
        }
    }

    use IngredientRole::{Garnish, Optional, Required};

    #[test]
    fn normalization_joins_case_and_whitespace() {
        assert_eq!(normalize_name("  Jordbær   Sirup "), "jordbær sirup");
    }

    #[test]
    fn full_pantry_puts_recipe_in_can_make_now() {
        let recipes = vec![candidate(
            "Jordbær Klassisk",
            &[("Jordbær sirup", Required), ("Vand", Required), ("Citron saft", Required)],
        )];
        let pantry = vec!["jordbær  sirup".into(), "VAND".into(), "Citron saft".into()];
        let report = find_matches(recipes, &pantry);
        assert_eq!(report.can_make_now.len(), 1);
        let entry = &report.can_make_now[0];
        assert!(entry.missing.is_empty());
        assert!(entry.score > 0);
        assert_eq!(entry.match_pct, 100.0);
    }

    #[test]
    fn missing_one_required_lands_in_almost() {
        let recipes = vec![candidate(
            "Jordbær Klassisk",
            &[("Jordbær sirup", Required), ("Vand", Required)],
        )];
        let pantry = vec!["Jordbær sirup".into()];
        let report = find_matches(recipes, &pantry);
        assert!(report.can_make_now.is_empty());
        assert_eq!(report.almost.len(), 1);
        assert_eq!(report.almost[0].missing, vec!["Vand".to_string()]);
        assert_eq!(report.almost[0].score, 0);
        assert_eq!(report.almost[0].match_pct, 50.0);
    }

    #[test]
    fn missing_three_required_is_dropped() {
        let recipes = vec![candidate(
            "Blå Hawaii",
            &[
                ("Blå curacao sirup", Required),
                ("Vand", Required),
                ("Lime saft", Required),
            ],
        )];
        let report = find_matches(recipes, &[]);
        assert!(report.can_make_now.is_empty());
        assert!(report.almost.is_empty());
    }

    #[test]
    fn removing_pantry_item_removes_recipe() {
        let recipes = || {
            vec![
                candidate(
                    "Jordbær Klassisk",
                    &[("Jordbær sirup", Required), ("Vand", Required), ("Citron saft", Required)],
                ),
                candidate("Citron Slush", &[("Citron saft", Required), ("Vand", Required)]),
            ]
        };
        let full: Vec<String> =
            vec!["Jordbær sirup".into(), "Vand".into(), "Citron saft".into()];
        let report = find_matches(recipes(), &full);
        assert_eq!(report.can_make_now.len(), 2);

        let without: Vec<String> = vec!["Vand".into(), "Citron saft".into()];
        let report = find_matches(recipes(), &without);
        let names: Vec<_> = report.can_make_now.iter().map(|e| e.recipe.clone()).collect();
        assert_eq!(names, vec!["Citron Slush".to_string()]);
    }

    #[test]
    fn optional_matches_add_one_point_and_never_miss() {
        let recipes = vec![candidate(
            "Mix",
            &[("Vand", Required), ("Mynte", Optional), ("Ingefær", Optional)],
        )];
        let pantry = vec!["Vand".into(), "Mynte".into()];
        let report = find_matches(recipes, &pantry);
        let entry = &report.can_make_now[0];
        assert_eq!(entry.score, 3);
        assert!(entry.missing.is_empty());
    }

    #[test]
    fn garnish_is_ignored() {
        let recipes = vec![candidate(
            "Pynt",
            &[("Vand", Required), ("Paraply", Garnish)],
        )];
        let pantry = vec!["Vand".into()];
        let report = find_matches(recipes, &pantry);
        assert_eq!(report.can_make_now.len(), 1);
        assert_eq!(report.can_make_now[0].score, 2);
    }

    #[test]
    fn no_required_ingredients_gives_zero_pct() {
        let recipes = vec![candidate("Tom", &[("Mynte", Optional)])];
        let pantry = vec!["Mynte".into()];
        let report = find_matches(recipes, &pantry);
        assert_eq!(report.can_make_now[0].match_pct, 0.0);
    }

    #[test]
    fn buckets_rank_by_score_then_pct_then_name() {
        let recipes = vec![
            candidate("B-opskrift", &[("Vand", Required)]),
            candidate("A-opskrift", &[("Vand", Required)]),
            candidate("Stor", &[("Vand", Required), ("Citron saft", Required)]),
        ];
        let pantry = vec!["Vand".into(), "Citron saft".into()];
        let report = find_matches(recipes, &pantry);
        let names: Vec<_> = report.can_make_now.iter().map(|e| e.recipe.clone()).collect();
        // "Stor" scores 4, then the two single-ingredient recipes tie and
        // fall back to name order.
        assert_eq!(names, vec!["Stor", "A-opskrift", "B-opskrift"]);
    }

    #[test]
    fn empty_pantry_is_not_an_error() {
        let report = find_matches(Vec::<MatchCandidate<()>>::new(), &[]);
        assert!(report.can_make_now.is_empty());
        assert!(report.almost.is_empty());
    }
}
