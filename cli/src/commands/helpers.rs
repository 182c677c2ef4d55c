use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use plate_core::models::{FoodItem, Provenance};
use plate_core::units::Unit;

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// Whole-number display for a nullable value, `-` when unknown.
pub(crate) fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{:.0}", no_neg_zero(v)))
}

/// "150g", "1.5 cup", "2 unit".
pub(crate) fn format_quantity(quantity: f64, unit: Unit) -> String {
    let qty = if quantity.fract() == 0.0 {
        format!("{quantity:.0}")
    } else {
        format!("{quantity}")
    };
    match unit {
        Unit::G | Unit::Ml => format!("{qty}{unit}"),
        _ => format!("{qty} {unit}"),
    }
}

/// One-line description of a food item, as echoed by the edit session.
pub(crate) fn describe_item(item: &FoodItem) -> String {
    let id = item.id;
    let name = &item.food_name;
    let qty = format_quantity(item.quantity, item.unit);
    let cal = fmt_opt(item.macros.calories);
    let p = fmt_opt(item.macros.protein);
    let c = fmt_opt(item.macros.carbs);
    let f = fmt_opt(item.macros.fat);
    format!("[{id}] {name}: {qty}, {cal} kcal | P:{p}g C:{c}g F:{f}g")
}

/// Warning for catalog-derived items measured in units, whose count is
/// scaled as if it were grams.
pub(crate) fn count_unit_note(item: &FoodItem) -> Option<String> {
    (item.unit == Unit::Count && item.provenance.is_derived()).then(|| {
        format!(
            "Note: '{}' is measured in units, so its macros are computed as if {} were grams. \
             Use a gram or volume serving for catalog foods.",
            item.food_name,
            format_quantity(item.quantity, Unit::G)
        )
    })
}

pub(crate) fn print_items_table(items: &[FoodItem]) {
    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Meal")]
        meal_id: i64,
        #[tabled(rename = "Food")]
        name: String,
        #[tabled(rename = "Qty")]
        quantity: String,
        #[tabled(rename = "Kcal")]
        calories: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "C")]
        carbs: String,
        #[tabled(rename = "F")]
        fat: String,
        #[tabled(rename = "Source")]
        source: &'static str,
    }

    let rows: Vec<ItemRow> = items
        .iter()
        .map(|i| ItemRow {
            id: i.id,
            meal_id: i.meal_id,
            name: truncate(&i.food_name, 30),
            quantity: format_quantity(i.quantity, i.unit),
            calories: fmt_opt(i.macros.calories),
            protein: fmt_opt(i.macros.protein),
            carbs: fmt_opt(i.macros.carbs),
            fat: fmt_opt(i.macros.fat),
            source: match i.provenance {
                Provenance::Derived(_) => "catalog",
                Provenance::Manual => "manual",
            },
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..8)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}
