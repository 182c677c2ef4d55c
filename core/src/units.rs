//! Conversion between a food item's display unit and its grams-equivalent.
//!
//! Volume units assume water density (1 ml = 1 g). The discrete `unit`
//! count is not mass-convertible: converting into or out of it leaves the
//! numeric value untouched.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    G,
    #[serde(rename = "unit")]
    Count,
    Ml,
    Cup,
    Tbsp,
    Tsp,
}

impl Unit {
    pub const ALL: [Unit; 6] = [
        Unit::G,
        Unit::Count,
        Unit::Ml,
        Unit::Cup,
        Unit::Tbsp,
        Unit::Tsp,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::G => "g",
            Unit::Count => "unit",
            Unit::Ml => "ml",
            Unit::Cup => "cup",
            Unit::Tbsp => "tbsp",
            Unit::Tsp => "tsp",
        }
    }

    /// Grams represented by one of this unit, or `None` for the discrete count.
    #[must_use]
    pub fn grams_factor(self) -> Option<f64> {
        match self {
            Unit::G | Unit::Ml => Some(1.0),
            Unit::Cup => Some(240.0),
            Unit::Tbsp => Some(15.0),
            Unit::Tsp => Some(5.0),
            Unit::Count => None,
        }
    }

    #[must_use]
    pub fn is_mass_convertible(self) -> bool {
        self.grams_factor().is_some()
    }

    /// Whether the conversion to grams relies on the water-density assumption.
    #[must_use]
    pub fn is_volume(self) -> bool {
        matches!(self, Unit::Ml | Unit::Cup | Unit::Tbsp | Unit::Tsp)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "g" | "gram" | "grams" => Ok(Unit::G),
            "unit" | "units" | "pc" | "pcs" | "piece" | "pieces" | "x" => Ok(Unit::Count),
            "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => Ok(Unit::Ml),
            "cup" | "cups" => Ok(Unit::Cup),
            "tbsp" | "tablespoon" | "tablespoons" => Ok(Unit::Tbsp),
            "tsp" | "teaspoon" | "teaspoons" => Ok(Unit::Tsp),
            _ => bail!("Unknown unit '{s}'. Supported: g, unit, ml, cup, tbsp, tsp"),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Unit::parse(s)
    }
}

/// Grams-equivalent of `quantity` expressed in `unit`.
///
/// For [`Unit::Count`] the quantity is returned unchanged: a count is treated
/// as an opaque number, not as grams.
#[must_use]
pub fn to_grams(quantity: f64, unit: Unit) -> f64 {
    match unit.grams_factor() {
        Some(factor) => quantity * factor,
        None => quantity,
    }
}

/// Quantity in `unit` that represents `grams`. Identity for [`Unit::Count`].
#[must_use]
pub fn from_grams(grams: f64, unit: Unit) -> f64 {
    match unit.grams_factor() {
        Some(factor) => grams / factor,
        None => grams,
    }
}

/// Re-express `quantity` from one unit in another, preserving mass.
///
/// When either side is the discrete count there is no mass to preserve and
/// the numeric quantity is kept as is.
#[must_use]
pub fn convert(quantity: f64, from: Unit, to: Unit) -> f64 {
    if from == to || !from.is_mass_convertible() || !to.is_mass_convertible() {
        return quantity;
    }
    from_grams(to_grams(quantity, from), to)
}

/// Parse a serving string into `(quantity, unit)`.
/// Accepts: "150", "150g", "500 ml", "2tbsp", "1.5 cups", "2 units".
/// A bare number means grams.
pub fn parse_serving(s: &str) -> Result<(f64, Unit)> {
    let s = s.trim();

    let (qty, unit) = if let Ok(qty) = s.parse::<f64>() {
        (qty, Unit::G)
    } else if let Some((num, unit)) = split_number_unit(s) {
        let qty: f64 = num
            .trim()
            .parse()
            .with_context(|| format!("Invalid quantity in '{s}'"))?;
        (qty, Unit::parse(unit)?)
    } else {
        bail!("Invalid serving format: '{s}'. Use '150g', '500 ml', '2 tbsp', '1 unit', etc.")
    };

    if !qty.is_finite() || qty <= 0.0 {
        bail!("Serving size must be greater than 0");
    }
    Ok((qty, unit))
}

/// Split "500ml", "2.5 tbsp" into ("500", "ml") / ("2.5 ", "tbsp").
fn split_number_unit(s: &str) -> Option<(&str, &str)> {
    let idx = s.find(|c: char| c.is_alphabetic())?;
    if idx == 0 {
        return None;
    }
    let (num_part, unit_part) = s.split_at(idx);
    if unit_part.trim().is_empty() {
        return None;
    }
    Some((num_part, unit_part.trim()))
}
