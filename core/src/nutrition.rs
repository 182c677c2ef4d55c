//! Keeps a food item's calorie/macro values consistent with its quantity and unit.
//!
//! Catalog-derived items are recomputed exactly from their per-100g snapshot.
//! Items without a snapshot are rescaled by the quantity ratio, and items
//! with no macro values at all only change quantity.

use thiserror::Error;

use crate::models::{
    CatalogEntry, FoodItem, FoodItemPatch, MAX_CALORIES, MacroValues, Per100g, Provenance,
};
use crate::units::{self, Unit, to_grams};

/// Reasons an edit is dropped before it touches the item.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error("Quantity must be a positive number (got {0})")]
    InvalidQuantity(f64),
    #[error("Calories must be between 0 and {max} (got {0})", max = MAX_CALORIES)]
    CaloriesOutOfRange(f64),
    #[error("{field} must be a non-negative number (got {value})")]
    InvalidMacro { field: &'static str, value: f64 },
    #[error("Food name must not be empty")]
    EmptyName,
    #[error("Food item {0} not found")]
    UnknownItem(i64),
}

/// Manual override of any subset of the macro fields.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MacroOverride {
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FoodItemEdit {
    Quantity(f64),
    Unit(Unit),
    Macros(MacroOverride),
    /// Replace the food with a catalog entry, keeping quantity and unit.
    Swap(Box<CatalogEntry>),
    Rename(String),
}

/// Derive macros from a per-100g profile and a mass.
///
/// Each output is `None` when its per-100g input is `None`, otherwise
/// `round(per100g * grams / 100)`.
#[must_use]
pub fn recalculate_from_per_100g(
    calories: Option<f64>,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    grams: f64,
) -> MacroValues {
    let scale = |v: Option<f64>| v.map(|per_100g| (per_100g * grams / 100.0).round());
    MacroValues {
        calories: scale(calories),
        protein: scale(protein),
        carbs: scale(carbs),
        fat: scale(fat),
    }
}

#[must_use]
pub fn recalculate(per_100g: &Per100g, grams: f64) -> MacroValues {
    recalculate_from_per_100g(
        per_100g.calories,
        per_100g.protein,
        per_100g.carbs,
        per_100g.fat,
        grams,
    )
}

/// Rescale existing values by `new_quantity / old_quantity`; `None` stays `None`.
#[must_use]
pub fn rescale_proportionally(current: &MacroValues, old_quantity: f64, new_quantity: f64) -> MacroValues {
    let scale = |v: Option<f64>| v.map(|old| (old * new_quantity / old_quantity).round());
    MacroValues {
        calories: scale(current.calories),
        protein: scale(current.protein),
        carbs: scale(current.carbs),
        fat: scale(current.fat),
    }
}

pub fn validate_quantity(quantity: f64) -> Result<(), EditError> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(EditError::InvalidQuantity(quantity));
    }
    Ok(())
}

/// Validate hand-entered macro values: calories within `0..=MAX_CALORIES`,
/// other fields finite and non-negative.
pub fn validate_macros(values: &MacroValues) -> Result<(), EditError> {
    if let Some(cal) = values.calories {
        if !cal.is_finite() || !(0.0..=MAX_CALORIES).contains(&cal) {
            return Err(EditError::CaloriesOutOfRange(cal));
        }
    }
    for (field, value) in [
        ("protein", values.protein),
        ("carbs", values.carbs),
        ("fat", values.fat),
    ] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(EditError::InvalidMacro { field, value: v });
            }
        }
    }
    Ok(())
}

fn validate_override(values: &MacroOverride) -> Result<(), EditError> {
    validate_macros(&MacroValues {
        calories: values.calories,
        protein: values.protein,
        carbs: values.carbs,
        fat: values.fat,
    })
}

/// Macros an item should carry at its current quantity/unit, or `None` to leave them alone.
fn derived_macros(item: &FoodItem, old_quantity: f64) -> Option<MacroValues> {
    match &item.provenance {
        Provenance::Derived(per_100g) if item.unit.is_mass_convertible() => {
            Some(recalculate(per_100g, item.grams_equivalent()))
        }
        _ if item.macros.has_any() && old_quantity > 0.0 => Some(rescale_proportionally(
            &item.macros,
            old_quantity,
            item.quantity,
        )),
        _ => None,
    }
}

/// Validate and apply one edit to `item`, returning the fields it touched.
///
/// On error the item is left exactly as it was.
pub fn apply_edit(item: &mut FoodItem, edit: &FoodItemEdit) -> Result<FoodItemPatch, EditError> {
    let mut patch = FoodItemPatch::default();

    match edit {
        FoodItemEdit::Quantity(quantity) => {
            validate_quantity(*quantity)?;
            let old_quantity = item.quantity;
            item.quantity = *quantity;
            patch.quantity = Some(*quantity);
            if let Some(macros) = derived_macros(item, old_quantity) {
                item.macros = macros;
                patch.set_macros(&macros);
            }
        }
        FoodItemEdit::Unit(unit) => {
            if *unit == item.unit {
                return Ok(patch);
            }
            let quantity = units::convert(item.quantity, item.unit, *unit);
            validate_quantity(quantity)?;
            item.unit = *unit;
            item.quantity = quantity;
            patch.unit = Some(*unit);
            patch.quantity = Some(quantity);
            if let Provenance::Derived(per_100g) = &item.provenance {
                if unit.is_mass_convertible() {
                    let macros = recalculate(per_100g, item.grams_equivalent());
                    item.macros = macros;
                    patch.set_macros(&macros);
                }
            }
        }
        FoodItemEdit::Macros(values) => {
            validate_override(values)?;
            if let Some(cal) = values.calories {
                item.macros.calories = Some(cal);
                patch.calories = Some(Some(cal));
            }
            if let Some(protein) = values.protein {
                item.macros.protein = Some(protein);
                patch.protein = Some(Some(protein));
            }
            if let Some(carbs) = values.carbs {
                item.macros.carbs = Some(carbs);
                patch.carbs = Some(Some(carbs));
            }
            if let Some(fat) = values.fat {
                item.macros.fat = Some(fat);
                patch.fat = Some(Some(fat));
            }
            // A hand-entered value no longer follows the catalog snapshot.
            if !patch.is_empty() && item.provenance.is_derived() {
                item.provenance = Provenance::Manual;
                patch.provenance = Some(Provenance::Manual);
            }
        }
        FoodItemEdit::Swap(entry) => {
            let per_100g = entry.per_100g();
            // Counts have no mass basis; the count stands in for grams.
            let macros = recalculate(&per_100g, to_grams(item.quantity, item.unit));
            item.food_name.clone_from(&entry.name);
            item.provenance = Provenance::Derived(per_100g);
            item.macros = macros;
            patch.food_name = Some(entry.name.clone());
            patch.provenance = Some(item.provenance);
            patch.set_macros(&macros);
        }
        FoodItemEdit::Rename(name) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(EditError::EmptyName);
            }
            item.food_name = name.to_string();
            patch.food_name = Some(name.to_string());
        }
    }

    Ok(patch)
}
