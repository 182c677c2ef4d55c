use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use plate_core::matcher::{Alternative, Alternatives, MatcherConfig};
use plate_core::service::PlateService;

use super::helpers::{json_error, truncate};

pub(crate) fn cmd_alternatives(
    service: &PlateService,
    food: &str,
    serving: Option<&str>,
    widen: bool,
    more: usize,
    json: bool,
) -> Result<()> {
    let config = MatcherConfig {
        widen,
        ..MatcherConfig::default()
    };
    let alts = service.alternatives_for_food(food, serving, &config)?;
    show(alts, more, json)
}

pub(crate) fn cmd_item_alternatives(service: &PlateService, item_id: i64, widen: bool, more: usize, json: bool) -> Result<()> {
    let config = MatcherConfig {
        widen,
        ..MatcherConfig::default()
    };
    let alts = service.alternatives_for_item(item_id, &config)?;
    show(alts, more, json)
}

fn show(mut alts: Alternatives, more: usize, json: bool) -> Result<()> {
    for _ in 0..more {
        if !alts.has_more() {
            break;
        }
        alts.load_more();
    }

    if alts.is_empty() {
        if json {
            println!("{}", json_error("No alternatives found"));
        } else {
            eprintln!("No alternatives found");
        }
        process::exit(2);
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "alternatives": alts.visible(),
                "name_only": alts.name_only,
                "has_more": alts.has_more(),
            }))?
        );
        return Ok(());
    }

    if alts.name_only {
        eprintln!("No calorie basis for this food; matched by name only");
    }
    print_alternatives_table(alts.visible());
    if alts.has_more() {
        let hidden = alts.total() - alts.visible().len();
        println!("{hidden} more available (use --more)");
    }
    Ok(())
}

fn print_alternatives_table(alts: &[Alternative]) {
    #[derive(Tabled)]
    struct AltRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Cal/100g")]
        calories: String,
        #[tabled(rename = "P/100g")]
        protein: String,
        #[tabled(rename = "Score")]
        score: String,
        #[tabled(rename = "Same kcal")]
        suggested: String,
    }

    let rows: Vec<AltRow> = alts
        .iter()
        .enumerate()
        .map(|(i, a)| AltRow {
            idx: i + 1,
            name: truncate(&a.entry.name, 30),
            category: if a.cross_category {
                format!("{}*", a.entry.category.as_str())
            } else {
                a.entry.category.as_str().to_string()
            },
            calories: format!("{:.0}", a.entry.calories_per_100g),
            protein: format!("{:.1}", a.entry.protein_per_100g),
            score: format!("{:.2}", a.score.total),
            suggested: a
                .suggested_grams
                .map_or_else(|| "-".to_string(), |g| format!("{g:.0}g")),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..7)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}
