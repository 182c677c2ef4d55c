use anyhow::{Result, bail};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::nutrition::{EditError, validate_macros, validate_quantity};
use crate::units::{Unit, to_grams};

/// Upper bound accepted for a manually entered calorie value.
pub const MAX_CALORIES: f64 = 20_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Protein,
    Fat,
    Carb,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Protein, Category::Fat, Category::Carb];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Protein => "protein",
            Category::Fat => "fat",
            Category::Carb => "carb",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "protein" | "proteins" => Ok(Category::Protein),
            "fat" | "fats" => Ok(Category::Fat),
            "carb" | "carbs" => Ok(Category::Carb),
            _ => bail!("Invalid category '{s}'. Must be one of: protein, fat, carb"),
        }
    }
}

/// A read-only food reference record. Loaded once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    pub category: Category,
    pub calories_per_100g: f64,
    pub protein_per_100g: f64,
    pub carbs_per_100g: f64,
    pub fat_per_100g: f64,
    #[serde(default)]
    pub protein_enriched: bool,
}

impl CatalogEntry {
    /// Snapshot of this entry's per-100g profile, as stored on a food item.
    #[must_use]
    pub fn per_100g(&self) -> Per100g {
        Per100g {
            category: Some(self.category),
            calories: Some(self.calories_per_100g),
            protein: Some(self.protein_per_100g),
            carbs: Some(self.carbs_per_100g),
            fat: Some(self.fat_per_100g),
        }
    }
}

/// Validate a catalog entry: name must not be empty, values must not be negative.
pub fn validate_catalog_entry(entry: &CatalogEntry) -> Result<()> {
    if entry.name.trim().is_empty() {
        bail!("Catalog entry {} has an empty name", entry.id);
    }
    let fields = [
        ("calories_per_100g", entry.calories_per_100g),
        ("protein_per_100g", entry.protein_per_100g),
        ("carbs_per_100g", entry.carbs_per_100g),
        ("fat_per_100g", entry.fat_per_100g),
    ];
    for (field, value) in fields {
        if !value.is_finite() || value < 0.0 {
            bail!("Catalog entry '{}': {field} must not be negative", entry.name);
        }
    }
    Ok(())
}

/// Nutritional profile normalised to 100 g.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Per100g {
    pub category: Option<Category>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

/// Where a food item's macro values come from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Catalog-derived: macros follow the per-100g snapshot.
    Derived(Per100g),
    /// Hand-entered or proportionally rescaled values.
    #[default]
    Manual,
}

impl Provenance {
    #[must_use]
    pub fn snapshot(&self) -> Option<&Per100g> {
        match self {
            Provenance::Derived(per_100g) => Some(per_100g),
            Provenance::Manual => None,
        }
    }

    #[must_use]
    pub fn is_derived(&self) -> bool {
        matches!(self, Provenance::Derived(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MacroValues {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

impl MacroValues {
    #[must_use]
    pub fn has_any(&self) -> bool {
        self.calories.is_some() || self.protein.is_some() || self.carbs.is_some() || self.fat.is_some()
    }
}

/// Aggregate of macro values where missing fields count as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MacroTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl MacroTotals {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a FoodItem>) -> Self {
        items.into_iter().fold(Self::default(), |mut acc, item| {
            acc.add(&item.macros);
            acc
        })
    }

    pub fn add(&mut self, values: &MacroValues) {
        self.calories += values.calories.unwrap_or(0.0);
        self.protein += values.protein.unwrap_or(0.0);
        self.carbs += values.carbs.unwrap_or(0.0);
        self.fat += values.fat.unwrap_or(0.0);
    }
}

impl std::ops::AddAssign for MacroTotals {
    fn add_assign(&mut self, rhs: Self) {
        self.calories += rhs.calories;
        self.protein += rhs.protein;
        self.carbs += rhs.carbs;
        self.fat += rhs.fat;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub id: i64,
    pub meal_id: i64,
    pub food_name: String,
    pub quantity: f64,
    pub unit: Unit,
    #[serde(flatten)]
    pub macros: MacroValues,
    #[serde(default)]
    pub provenance: Provenance,
}

impl FoodItem {
    #[must_use]
    pub fn grams_equivalent(&self) -> f64 {
        to_grams(self.quantity, self.unit)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFoodItem {
    pub food_name: String,
    pub quantity: f64,
    pub unit: Unit,
    pub macros: MacroValues,
    pub provenance: Provenance,
}

impl NewFoodItem {
    /// A catalog-derived item with macros computed from the entry's profile.
    pub fn from_catalog(entry: &CatalogEntry, quantity: f64, unit: Unit) -> Result<Self> {
        validate_quantity(quantity)?;
        let per_100g = entry.per_100g();
        let macros = crate::nutrition::recalculate(&per_100g, to_grams(quantity, unit));
        Ok(Self {
            food_name: entry.name.clone(),
            quantity,
            unit,
            macros,
            provenance: Provenance::Derived(per_100g),
        })
    }

    /// A hand-entered item with no catalog snapshot.
    pub fn manual(name: &str, quantity: f64, unit: Unit, macros: MacroValues) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EditError::EmptyName.into());
        }
        validate_quantity(quantity)?;
        validate_macros(&macros)?;
        Ok(Self {
            food_name: name.to_string(),
            quantity,
            unit,
            macros,
            provenance: Provenance::Manual,
        })
    }
}

/// Partial set of food item fields; `None` means "not touched".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[allow(clippy::option_option)]
pub struct FoodItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl FoodItemPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Set all four macro fields from `values`.
    pub fn set_macros(&mut self, values: &MacroValues) {
        self.calories = Some(values.calories);
        self.protein = Some(values.protein);
        self.carbs = Some(values.carbs);
        self.fat = Some(values.fat);
    }

    /// Fold a later patch into this one. Fields touched by `later` win.
    pub fn merge(&mut self, later: FoodItemPatch) {
        if later.food_name.is_some() {
            self.food_name = later.food_name;
        }
        if later.quantity.is_some() {
            self.quantity = later.quantity;
        }
        if later.unit.is_some() {
            self.unit = later.unit;
        }
        if later.calories.is_some() {
            self.calories = later.calories;
        }
        if later.protein.is_some() {
            self.protein = later.protein;
        }
        if later.carbs.is_some() {
            self.carbs = later.carbs;
        }
        if later.fat.is_some() {
            self.fat = later.fat;
        }
        if later.provenance.is_some() {
            self.provenance = later.provenance;
        }
    }

    pub fn apply_to(&self, item: &mut FoodItem) {
        if let Some(name) = &self.food_name {
            item.food_name.clone_from(name);
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(unit) = self.unit {
            item.unit = unit;
        }
        if let Some(calories) = self.calories {
            item.macros.calories = calories;
        }
        if let Some(protein) = self.protein {
            item.macros.protein = protein;
        }
        if let Some(carbs) = self.carbs {
            item.macros.carbs = carbs;
        }
        if let Some(fat) = self.fat {
            item.macros.fat = fat;
        }
        if let Some(provenance) = self.provenance {
            item.provenance = provenance;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealName {
    Breakfast,
    MorningSnack,
    Lunch,
    AfternoonSnack,
    Dinner,
    EveningSnack,
}

impl MealName {
    pub const ALL: [MealName; 6] = [
        MealName::Breakfast,
        MealName::MorningSnack,
        MealName::Lunch,
        MealName::AfternoonSnack,
        MealName::Dinner,
        MealName::EveningSnack,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MealName::Breakfast => "breakfast",
            MealName::MorningSnack => "morning_snack",
            MealName::Lunch => "lunch",
            MealName::AfternoonSnack => "afternoon_snack",
            MealName::Dinner => "dinner",
            MealName::EveningSnack => "evening_snack",
        }
    }

    #[must_use]
    pub fn default_time(self) -> NaiveTime {
        let (h, m) = match self {
            MealName::Breakfast => (8, 0),
            MealName::MorningSnack => (10, 30),
            MealName::Lunch => (13, 0),
            MealName::AfternoonSnack => (16, 0),
            MealName::Dinner => (19, 30),
            MealName::EveningSnack => (21, 30),
        };
        NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default()
    }

    pub fn parse(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match MealName::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
        {
            Some(meal) => Ok(meal),
            None => {
                let names: Vec<&str> = MealName::ALL.iter().map(|m| m.as_str()).collect();
                bail!("Invalid meal name '{s}'. Must be one of: {}", names.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub id: i64,
    pub plan_id: i64,
    pub time: NaiveTime,
    pub name: MealName,
    pub items: Vec<FoodItem>,
}

impl Meal {
    /// Always re-derived from the current items, never cached.
    #[must_use]
    pub fn totals(&self) -> MacroTotals {
        MacroTotals::from_items(&self.items)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanTargets {
    pub daily_calories: Option<f64>,
    pub protein_grams: Option<f64>,
    pub carbs_grams: Option<f64>,
    pub fat_grams: Option<f64>,
    pub daily_water_ml: Option<f64>,
}

impl PlanTargets {
    /// Gram targets from a calorie total and a percentage split (4/4/9 kcal per gram).
    pub fn from_percentages(calories: f64, protein_pct: i64, carbs_pct: i64, fat_pct: i64) -> Result<Self> {
        validate_macro_split(protein_pct, carbs_pct, fat_pct)?;
        #[allow(clippy::cast_precision_loss)]
        let grams = |pct: i64, kcal_per_g: f64| calories * pct as f64 / 100.0 / kcal_per_g;
        Ok(Self {
            daily_calories: Some(calories),
            protein_grams: Some(grams(protein_pct, 4.0)),
            carbs_grams: Some(grams(carbs_pct, 4.0)),
            fat_grams: Some(grams(fat_pct, 9.0)),
            daily_water_ml: None,
        })
    }

    /// Target minus eaten, for every target that is set.
    #[must_use]
    pub fn remaining(&self, totals: &MacroTotals) -> Remaining {
        Remaining {
            calories: self.daily_calories.map(|t| t - totals.calories),
            protein: self.protein_grams.map(|t| t - totals.protein),
            carbs: self.carbs_grams.map(|t| t - totals.carbs),
            fat: self.fat_grams.map(|t| t - totals.fat),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Remaining {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub targets: PlanTargets,
    pub created_at: String,
    pub updated_at: String,
}

/// A plan with its meals and re-derived totals.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub plan: Plan,
    pub meals: Vec<Meal>,
    pub totals: MacroTotals,
    pub remaining: Remaining,
}

impl PlanSummary {
    #[must_use]
    pub fn new(plan: Plan, meals: Vec<Meal>) -> Self {
        let mut totals = MacroTotals::default();
        for meal in &meals {
            totals += meal.totals();
        }
        let remaining = plan.targets.remaining(&totals);
        Self {
            plan,
            meals,
            totals,
            remaining,
        }
    }
}

pub fn validate_macro_split(protein: i64, carbs: i64, fat: i64) -> Result<()> {
    if protein < 0 || carbs < 0 || fat < 0 {
        bail!("Macro percentages must be non-negative");
    }
    let sum = protein + carbs + fat;
    if sum != 100 {
        bail!("Macro percentages must sum to 100 (got {sum})");
    }
    Ok(())
}
