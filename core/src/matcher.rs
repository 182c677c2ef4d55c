//! Ranks catalog entries as substitutes for a food item.
//!
//! Candidates must sit within a calorie tolerance band around the target's
//! effective per-100g calories and are scored on calorie distance, macro
//! distance and name overlap. Without a usable calorie basis the matcher
//! falls back to name-only matching within the category.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::catalog::Catalog;
use crate::models::{CatalogEntry, Category, FoodItem, MacroValues, Per100g};
use crate::units::{Unit, to_grams};

const TOLERANCE_RATIO: f64 = 0.35;
const MIN_TOLERANCE_KCAL: f64 = 20.0;
const WIDENED_TOLERANCE_FACTOR: f64 = 1.5;
const PROTEIN_WEIGHT: f64 = 0.3;
const CARBS_WEIGHT: f64 = 0.2;
const FAT_WEIGHT: f64 = 0.2;
const NAME_WEIGHT: f64 = 0.2;
const MIN_MACRO_BASIS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatcherConfig {
    pub initial: usize,
    pub increment: usize,
    /// Hard cap on candidates ever returned.
    pub cap: usize,
    /// Also consider other categories, at a wider tolerance.
    pub widen: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            initial: 6,
            increment: 6,
            cap: 24,
            widen: false,
        }
    }
}

/// What the matcher searches substitutes for.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchTarget {
    pub name: String,
    pub category: Option<Category>,
    pub per_100g: Option<Per100g>,
    pub quantity: Option<f64>,
    pub unit: Unit,
    pub current: MacroValues,
}

impl MatchTarget {
    #[must_use]
    pub fn from_item(item: &FoodItem) -> Self {
        let per_100g = item.provenance.snapshot().copied();
        Self {
            name: item.food_name.clone(),
            category: per_100g.and_then(|p| p.category),
            per_100g,
            quantity: Some(item.quantity),
            unit: item.unit,
            current: item.macros,
        }
    }

    /// A catalog food with no serving attached.
    #[must_use]
    pub fn from_entry(entry: &CatalogEntry) -> Self {
        Self {
            name: entry.name.clone(),
            category: Some(entry.category),
            per_100g: Some(entry.per_100g()),
            quantity: None,
            unit: Unit::G,
            current: MacroValues::default(),
        }
    }

    /// Only a name, optionally narrowed to a category.
    #[must_use]
    pub fn from_name(name: &str, category: Option<Category>) -> Self {
        Self {
            name: name.trim().to_string(),
            category,
            per_100g: None,
            quantity: None,
            unit: Unit::G,
            current: MacroValues::default(),
        }
    }

    /// Per-100g values to compare candidates against.
    ///
    /// Current values are back-calculated to 100 g when the item has a positive
    /// quantity and calorie value; otherwise the catalog snapshot is used.
    #[must_use]
    pub fn effective_per_100g(&self) -> Per100g {
        let snapshot = self.per_100g.unwrap_or_default();
        let grams = self.quantity.map(|q| to_grams(q, self.unit));
        match (grams, self.current.calories) {
            (Some(grams), Some(cal)) if grams > 0.0 && cal > 0.0 => {
                let back = |current: Option<f64>, fallback: Option<f64>| {
                    current.map(|v| v * 100.0 / grams).or(fallback)
                };
                Per100g {
                    category: self.category,
                    calories: back(self.current.calories, snapshot.calories),
                    protein: back(self.current.protein, snapshot.protein),
                    carbs: back(self.current.carbs, snapshot.carbs),
                    fat: back(self.current.fat, snapshot.fat),
                }
            }
            _ => Per100g {
                category: self.category,
                ..snapshot
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub macro_similarity: f64,
    /// Word overlap before weighting, in `0..=1`.
    pub name_similarity: f64,
    pub calories_score: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alternative {
    pub entry: CatalogEntry,
    pub score: ScoreBreakdown,
    /// Grams of this entry matching the target's current calories.
    pub suggested_grams: Option<f64>,
    pub cross_category: bool,
}

/// Ranked candidates with incremental reveal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alternatives {
    candidates: Vec<Alternative>,
    shown: usize,
    increment: usize,
    pub name_only: bool,
}

impl Alternatives {
    #[must_use]
    pub fn visible(&self) -> &[Alternative] {
        &self.candidates[..self.shown.min(self.candidates.len())]
    }

    /// Reveal the next page and return only the newly visible candidates.
    pub fn load_more(&mut self) -> &[Alternative] {
        let start = self.shown.min(self.candidates.len());
        self.shown = (self.shown + self.increment).min(self.candidates.len());
        &self.candidates[start..self.shown]
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.shown < self.candidates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.candidates.len()
    }
}

fn words(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_lowercase).collect()
}

/// Target words also present in the candidate, over the larger word count.
#[must_use]
pub fn name_similarity(target: &str, candidate: &str) -> f64 {
    let target_words = words(target);
    let candidate_words = words(candidate);
    let longest = target_words.len().max(candidate_words.len());
    if longest == 0 {
        return 0.0;
    }
    let candidate_set: HashSet<&str> = candidate_words.iter().map(String::as_str).collect();
    let common = target_words
        .iter()
        .filter(|w| candidate_set.contains(w.as_str()))
        .count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = common as f64 / longest as f64;
    ratio
}

#[must_use]
pub fn tolerance(target_calories: f64) -> f64 {
    (target_calories * TOLERANCE_RATIO).max(MIN_TOLERANCE_KCAL)
}

fn macro_term(weight: f64, target: Option<f64>, candidate: f64) -> f64 {
    match target {
        Some(t) => weight * (1.0 - (candidate - t).abs() / t.max(MIN_MACRO_BASIS)).max(0.0),
        None => 0.0,
    }
}

/// Score one candidate against an effective profile with `calories > 0`.
#[must_use]
pub fn score(profile: &Per100g, target_calories: f64, target_name: &str, entry: &CatalogEntry) -> ScoreBreakdown {
    let delta = (entry.calories_per_100g - target_calories).abs();
    let half = target_calories * 0.5;
    let basis = if half > 0.0 { half } else { 1.0 };

    let macro_similarity = (1.0 - delta / basis).max(0.0)
        + macro_term(PROTEIN_WEIGHT, profile.protein, entry.protein_per_100g)
        + macro_term(CARBS_WEIGHT, profile.carbs, entry.carbs_per_100g)
        + macro_term(FAT_WEIGHT, profile.fat, entry.fat_per_100g);
    let name_similarity = name_similarity(target_name, &entry.name);
    let calories_score = 1.0 - delta / basis;

    ScoreBreakdown {
        macro_similarity,
        name_similarity,
        calories_score,
        total: macro_similarity + name_similarity * NAME_WEIGHT + calories_score,
    }
}

fn suggested_grams(target: &MatchTarget, entry: &CatalogEntry) -> Option<f64> {
    let current = target.current.calories.filter(|c| *c > 0.0)?;
    if entry.calories_per_100g <= 0.0 {
        return None;
    }
    Some((current / entry.calories_per_100g * 100.0).round())
}

fn by_score_then_name(a: &Alternative, b: &Alternative) -> std::cmp::Ordering {
    b.score
        .total
        .total_cmp(&a.score.total)
        .then_with(|| a.entry.name.cmp(&b.entry.name))
}

/// Rank catalog substitutes for `target`. An empty result is a normal outcome.
#[must_use]
pub fn find_alternatives(catalog: &Catalog, target: &MatchTarget, config: &MatcherConfig) -> Alternatives {
    let own_name = target.name.trim().to_lowercase();
    let not_self = |e: &&CatalogEntry| e.name.trim().to_lowercase() != own_name;
    let same_category = |e: &CatalogEntry| target.category.is_none_or(|c| c == e.category);

    let profile = target.effective_per_100g();
    let basis = profile.calories.filter(|c| c.is_finite() && *c > 0.0);

    let (mut candidates, name_only) = match basis {
        None => {
            debug!(target = %target.name, "no calorie basis; matching by name only");
            let found: Vec<Alternative> = catalog
                .entries()
                .iter()
                .filter(not_self)
                .filter(|e| same_category(e))
                .filter_map(|e| {
                    let similarity = name_similarity(&target.name, &e.name);
                    (similarity > 0.0).then(|| Alternative {
                        entry: e.clone(),
                        score: ScoreBreakdown {
                            name_similarity: similarity,
                            total: similarity * NAME_WEIGHT,
                            ..ScoreBreakdown::default()
                        },
                        suggested_grams: suggested_grams(target, e),
                        cross_category: false,
                    })
                })
                .collect();
            (found, true)
        }
        Some(target_calories) => {
            let tol = tolerance(target_calories);
            let found: Vec<Alternative> = catalog
                .entries()
                .iter()
                .filter(not_self)
                .filter_map(|e| {
                    let cross_category = !same_category(e);
                    let allowed = if cross_category {
                        if !config.widen {
                            return None;
                        }
                        tol * WIDENED_TOLERANCE_FACTOR
                    } else {
                        tol
                    };
                    if (e.calories_per_100g - target_calories).abs() > allowed {
                        return None;
                    }
                    Some(Alternative {
                        entry: e.clone(),
                        score: score(&profile, target_calories, &target.name, e),
                        suggested_grams: suggested_grams(target, e),
                        cross_category,
                    })
                })
                .collect();
            debug!(
                target = %target.name,
                target_calories,
                tolerance = tol,
                candidates = found.len(),
                "matched alternatives"
            );
            (found, false)
        }
    };

    candidates.sort_by(by_score_then_name);
    candidates.truncate(config.cap);

    Alternatives {
        shown: config.initial.min(candidates.len()),
        candidates,
        increment: config.increment.max(1),
        name_only,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Provenance;

    fn entry(id: i64, name: &str, category: Category, cal: f64, p: f64, c: f64, f: f64) -> CatalogEntry {
        CatalogEntry {
            id,
            name: name.to_string(),
            brand: None,
            category,
            calories_per_100g: cal,
            protein_per_100g: p,
            carbs_per_100g: c,
            fat_per_100g: f,
            protein_enriched: false,
        }
    }

    fn carb_catalog() -> Catalog {
        Catalog::new(vec![
            entry(1, "Plain rice", Category::Carb, 100.0, 2.0, 22.0, 0.5),
            entry(2, "Brown rice", Category::Carb, 105.0, 2.5, 21.0, 0.9),
            entry(3, "Pasta", Category::Carb, 130.0, 5.0, 25.0, 1.1),
            entry(4, "Bread", Category::Carb, 140.0, 9.0, 40.0, 3.0),
            entry(5, "Oats", Category::Carb, 389.0, 16.9, 66.3, 6.9),
            entry(6, "Chicken", Category::Protein, 110.0, 23.0, 0.0, 1.5),
            entry(7, "Potato", Category::Carb, 87.0, 1.9, 20.1, 0.1),
        ])
        .unwrap()
    }

    fn names(alts: &[Alternative]) -> Vec<&str> {
        alts.iter().map(|a| a.entry.name.as_str()).collect()
    }

    #[test]
    fn test_tolerance_floor() {
        assert_eq!(tolerance(100.0), 35.0);
        assert_eq!(tolerance(40.0), 20.0);
    }

    #[test]
    fn test_closer_calories_score_higher() {
        let catalog = carb_catalog();
        let target = MatchTarget::from_entry(&catalog.entries()[0]);
        let result = find_alternatives(&catalog, &target, &MatcherConfig::default());
        let by_name = |n: &str| {
            result
                .visible()
                .iter()
                .find(|a| a.entry.name == n)
                .map(|a| a.score.total)
        };
        let near = by_name("Brown rice").unwrap();
        let far = by_name("Pasta").unwrap();
        assert!(near >= far);
        assert_eq!(result.visible()[0].entry.name, "Brown rice");
    }

    #[test]
    fn test_out_of_band_and_self_excluded() {
        let catalog = carb_catalog();
        let target = MatchTarget::from_entry(&catalog.entries()[0]);
        let result = find_alternatives(&catalog, &target, &MatcherConfig::default());
        let found = names(result.visible());
        // |140 - 100| > 35 and |389 - 100| > 35
        assert!(!found.contains(&"Bread"));
        assert!(!found.contains(&"Oats"));
        assert!(!found.contains(&"Plain rice"));
        // Other categories only when widened.
        assert!(!found.contains(&"Chicken"));
        for alt in result.visible() {
            assert!((alt.entry.calories_per_100g - 100.0).abs() <= 35.0);
        }
    }

    #[test]
    fn test_widen_includes_other_categories() {
        let catalog = carb_catalog();
        let target = MatchTarget::from_entry(&catalog.entries()[0]);
        let config = MatcherConfig {
            widen: true,
            ..MatcherConfig::default()
        };
        let result = find_alternatives(&catalog, &target, &config);
        let chicken = result
            .visible()
            .iter()
            .find(|a| a.entry.name == "Chicken")
            .unwrap();
        assert!(chicken.cross_category);
    }

    #[test]
    fn test_widened_band_only_loosens_other_categories() {
        let catalog = Catalog::new(vec![
            entry(1, "Plain rice", Category::Carb, 100.0, 2.0, 22.0, 0.5),
            entry(2, "Tofu", Category::Protein, 145.0, 15.0, 3.0, 8.0),
            entry(3, "Avocado", Category::Fat, 55.0, 1.0, 4.0, 5.0),
            entry(4, "Cheddar", Category::Protein, 160.0, 25.0, 1.0, 6.0),
            entry(5, "Bagel", Category::Carb, 145.0, 6.0, 30.0, 1.0),
        ])
        .unwrap();
        let target = MatchTarget::from_entry(&catalog.entries()[0]);
        let config = MatcherConfig {
            widen: true,
            ..MatcherConfig::default()
        };
        let result = find_alternatives(&catalog, &target, &config);
        let found = names(result.visible());

        // Base band is 35 kcal; other categories get 52.5.
        assert!(found.contains(&"Tofu"));
        assert!(found.contains(&"Avocado"));
        assert!(!found.contains(&"Cheddar"));
        assert!(!found.contains(&"Bagel"));
        assert!(result.visible().iter().all(|a| a.cross_category));

        let narrow = find_alternatives(&catalog, &target, &MatcherConfig::default());
        assert!(narrow.visible().is_empty());
    }

    #[test]
    fn test_back_calculates_from_current_values() {
        let catalog = carb_catalog();
        let item = FoodItem {
            id: 1,
            meal_id: 1,
            food_name: "Leftover rice".to_string(),
            quantity: 200.0,
            unit: Unit::G,
            macros: MacroValues {
                calories: Some(260.0),
                protein: Some(10.0),
                carbs: Some(50.0),
                fat: Some(2.0),
            },
            provenance: Provenance::Manual,
        };
        let target = MatchTarget::from_item(&item);
        let profile = target.effective_per_100g();
        assert_eq!(profile.calories, Some(130.0));
        assert_eq!(profile.carbs, Some(25.0));

        let result = find_alternatives(&catalog, &target, &MatcherConfig::default());
        assert_eq!(result.visible()[0].entry.name, "Pasta");
        // 260 kcal of pasta at 130 kcal/100g
        assert_eq!(result.visible()[0].suggested_grams, Some(200.0));
    }

    #[test]
    fn test_name_only_fallback() {
        let catalog = carb_catalog();
        let target = MatchTarget::from_name("wild rice", Some(Category::Carb));
        let result = find_alternatives(&catalog, &target, &MatcherConfig::default());
        assert!(result.name_only);
        assert_eq!(names(result.visible()), vec!["Brown rice", "Plain rice"]);
        assert!(result.visible().iter().all(|a| a.suggested_grams.is_none()));
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let catalog = carb_catalog();
        let target = MatchTarget::from_name("Tempeh", None);
        let result = find_alternatives(&catalog, &target, &MatcherConfig::default());
        assert!(result.is_empty());
        assert!(!result.has_more());
        assert!(result.visible().is_empty());
    }

    #[test]
    fn test_pagination() {
        let entries: Vec<CatalogEntry> = (1..=30)
            .map(|i| entry(i, &format!("Grain {i}"), Category::Carb, 100.0 + (i % 10) as f64, 3.0, 20.0, 1.0))
            .collect();
        let catalog = Catalog::new(entries).unwrap();
        let mut target = MatchTarget::from_name("Grain", Some(Category::Carb));
        target.per_100g = Some(Per100g {
            calories: Some(100.0),
            ..Per100g::default()
        });

        let mut result = find_alternatives(&catalog, &target, &MatcherConfig::default());
        assert_eq!(result.total(), 24);
        assert_eq!(result.visible().len(), 6);
        assert_eq!(result.load_more().len(), 6);
        assert_eq!(result.visible().len(), 12);
        result.load_more();
        assert_eq!(result.load_more().len(), 6);
        assert!(!result.has_more());
        assert!(result.load_more().is_empty());
    }

    #[test]
    fn test_name_similarity() {
        assert_eq!(name_similarity("brown rice", "Brown Rice"), 1.0);
        assert_eq!(name_similarity("rice", "brown rice"), 0.5);
        assert_eq!(name_similarity("", "rice"), 0.0);
        assert_eq!(name_similarity("oats", "bread"), 0.0);
    }
}
