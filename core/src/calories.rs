//! Biometric calorie calculators: BMR, TDEE, goal calories, macro split, water.
//!
//! Inputs are not validated here. Callers must reject non-physiological
//! values (zero weight, negative age) before calling.

use std::fmt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::models::PlanTargets;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            _ => bail!("Unknown gender '{s}'. Use: male, female"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 5] = [
        ActivityLevel::Sedentary,
        ActivityLevel::Light,
        ActivityLevel::Moderate,
        ActivityLevel::Active,
        ActivityLevel::VeryActive,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::Light => "light",
            ActivityLevel::Moderate => "moderate",
            ActivityLevel::Active => "active",
            ActivityLevel::VeryActive => "very_active",
        }
    }

    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }

    /// Extra daily water in ml on top of the weight-based baseline.
    #[must_use]
    pub fn water_bonus_ml(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 0.0,
            ActivityLevel::Light => 250.0,
            ActivityLevel::Moderate => 500.0,
            ActivityLevel::Active => 750.0,
            ActivityLevel::VeryActive => 1000.0,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match ActivityLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == normalized)
        {
            Some(level) => Ok(level),
            None => bail!(
                "Unknown activity level '{s}'. Use: sedentary, light, moderate, active, very_active"
            ),
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    Cutting,
    Maintenance,
    Bulking,
}

impl Goal {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Goal::Cutting => "cutting",
            Goal::Maintenance => "maintenance",
            Goal::Bulking => "bulking",
        }
    }

    /// Protein target in grams per kg of body weight.
    #[must_use]
    pub fn protein_per_kg(self) -> f64 {
        match self {
            Goal::Cutting => 2.2,
            Goal::Maintenance | Goal::Bulking => 2.0,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cutting" | "cut" => Ok(Goal::Cutting),
            "maintenance" | "maintain" => Ok(Goal::Maintenance),
            "bulking" | "bulk" => Ok(Goal::Bulking),
            _ => bail!("Unknown goal '{s}'. Use: cutting, maintenance, bulking"),
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mifflin-St Jeor basal metabolic rate in kcal/day.
#[must_use]
pub fn bmr(weight_kg: f64, height_cm: f64, age_years: f64, gender: Gender) -> f64 {
    let offset = match gender {
        Gender::Male => 5.0,
        Gender::Female => -161.0,
    };
    10.0 * weight_kg + 6.25 * height_cm - 5.0 * age_years + offset
}

#[must_use]
pub fn tdee(bmr: f64, activity: ActivityLevel) -> f64 {
    (bmr * activity.multiplier()).round()
}

#[must_use]
pub fn calories_by_goal(tdee: f64, goal: Goal) -> f64 {
    match goal {
        Goal::Cutting => (tdee * 0.8).round(),
        Goal::Maintenance => tdee,
        Goal::Bulking => (tdee * 1.1).round(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MacroSplit {
    pub protein_g: f64,
    pub protein_kcal: f64,
    pub carbs_g: f64,
    pub carbs_kcal: f64,
    pub fat_g: f64,
    pub fat_kcal: f64,
}

/// Protein from body weight, fat at 25% of calories, carbs take the rest.
///
/// Carbs are not clamped: very high protein against a low calorie total
/// yields negative carbs.
#[must_use]
pub fn macro_split(total_calories: f64, weight_kg: f64, goal: Goal) -> MacroSplit {
    let protein_g = (weight_kg * goal.protein_per_kg()).round();
    let protein_kcal = protein_g * 4.0;
    let fat_kcal = (total_calories * 0.25).round();
    let fat_g = (fat_kcal / 9.0).round();
    let carbs_kcal = total_calories - protein_kcal - fat_kcal;
    let carbs_g = (carbs_kcal / 4.0).round();
    MacroSplit {
        protein_g,
        protein_kcal,
        carbs_g,
        carbs_kcal,
        fat_g,
        fat_kcal,
    }
}

#[must_use]
pub fn water_intake(weight_kg: f64, activity: ActivityLevel) -> f64 {
    (weight_kg * 33.0 + activity.water_bonus_ml()).round()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Biometrics {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub age_years: f64,
    pub gender: Gender,
    pub activity: ActivityLevel,
    pub goal: Goal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedTargets {
    pub bmr: f64,
    pub tdee: f64,
    pub calories: f64,
    pub macros: MacroSplit,
    pub water_ml: f64,
}

#[must_use]
pub fn derive_targets(bio: &Biometrics) -> DerivedTargets {
    let bmr = bmr(bio.weight_kg, bio.height_cm, bio.age_years, bio.gender);
    let tdee = tdee(bmr, bio.activity);
    let calories = calories_by_goal(tdee, bio.goal);
    DerivedTargets {
        bmr,
        tdee,
        calories,
        macros: macro_split(calories, bio.weight_kg, bio.goal),
        water_ml: water_intake(bio.weight_kg, bio.activity),
    }
}

impl From<DerivedTargets> for PlanTargets {
    fn from(t: DerivedTargets) -> Self {
        PlanTargets {
            daily_calories: Some(t.calories),
            protein_grams: Some(t.macros.protein_g),
            carbs_grams: Some(t.macros.carbs_g),
            fat_grams: Some(t.macros.fat_g),
            daily_water_ml: Some(t.water_ml),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bmr_male() {
        assert!((bmr(80.0, 180.0, 30.0, Gender::Male) - 1780.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bmr_female() {
        // 600 + 1031.25 - 125 - 161
        assert!((bmr(60.0, 165.0, 25.0, Gender::Female) - 1345.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tdee() {
        assert_eq!(tdee(1500.0, ActivityLevel::Moderate), 2325.0);
        assert_eq!(tdee(1500.0, ActivityLevel::Sedentary), 1800.0);
        assert_eq!(tdee(1780.0, ActivityLevel::VeryActive), 3382.0);
    }

    #[test]
    fn test_calories_by_goal() {
        assert_eq!(calories_by_goal(2000.0, Goal::Cutting), 1600.0);
        assert_eq!(calories_by_goal(2000.0, Goal::Maintenance), 2000.0);
        assert_eq!(calories_by_goal(2000.0, Goal::Bulking), 2200.0);
    }

    #[test]
    fn test_macro_split_cutting() {
        let split = macro_split(2000.0, 80.0, Goal::Cutting);
        assert_eq!(split.protein_g, 176.0);
        assert_eq!(split.protein_kcal, 704.0);
        assert_eq!(split.fat_kcal, 500.0);
        assert_eq!(split.fat_g, 56.0);
        assert_eq!(split.carbs_kcal, 796.0);
        assert_eq!(split.carbs_g, 199.0);
    }

    #[test]
    fn test_macro_split_allows_negative_carbs() {
        let split = macro_split(800.0, 150.0, Goal::Cutting);
        assert!(split.carbs_kcal < 0.0);
        assert!(split.carbs_g < 0.0);
    }

    #[test]
    fn test_water_intake() {
        assert_eq!(water_intake(70.0, ActivityLevel::Moderate), 2810.0);
        assert_eq!(water_intake(70.0, ActivityLevel::Sedentary), 2310.0);
    }

    #[test]
    fn test_derive_targets() {
        let t = derive_targets(&Biometrics {
            weight_kg: 80.0,
            height_cm: 180.0,
            age_years: 30.0,
            gender: Gender::Male,
            activity: ActivityLevel::Moderate,
            goal: Goal::Maintenance,
        });
        assert_eq!(t.tdee, 2759.0);
        assert_eq!(t.calories, 2759.0);
        assert_eq!(t.macros.protein_g, 160.0);
        assert_eq!(t.water_ml, 3140.0);

        let targets = PlanTargets::from(t);
        assert_eq!(targets.daily_calories, Some(2759.0));
        assert_eq!(targets.daily_water_ml, Some(3140.0));
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!(Gender::parse("F").unwrap(), Gender::Female);
        assert_eq!(ActivityLevel::parse("very-active").unwrap(), ActivityLevel::VeryActive);
        assert_eq!(Goal::parse("bulk").unwrap(), Goal::Bulking);
        assert!(ActivityLevel::parse("couch").is_err());
        assert_eq!(
            serde_json::to_string(&ActivityLevel::VeryActive).unwrap(),
            "\"very_active\""
        );
    }
}
