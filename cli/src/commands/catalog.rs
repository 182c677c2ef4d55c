use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use plate_core::catalog::Catalog;
use plate_core::models::{CatalogEntry, Category};

use super::helpers::{json_error, truncate};

pub(crate) fn cmd_catalog(catalog: &Catalog, search: Option<&str>, category: Option<&str>, json: bool) -> Result<()> {
    let category = category.map(Category::parse).transpose()?;
    let entries: Vec<&CatalogEntry> = search
        .map_or_else(|| catalog.entries().iter().collect(), |q| catalog.search(q))
        .into_iter()
        .filter(|e| category.is_none_or(|c| e.category == c))
        .collect();

    if entries.is_empty() {
        if json {
            println!("{}", json_error("No catalog foods found"));
        } else {
            eprintln!("No catalog foods found");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    print_catalog_table(&entries);
    Ok(())
}

fn print_catalog_table(entries: &[&CatalogEntry]) {
    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Category")]
        category: &'static str,
        #[tabled(rename = "Cal/100g")]
        calories: String,
        #[tabled(rename = "P/100g")]
        protein: String,
        #[tabled(rename = "C/100g")]
        carbs: String,
        #[tabled(rename = "F/100g")]
        fat: String,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            id: e.id,
            name: match &e.brand {
                Some(brand) => truncate(&format!("{} ({brand})", e.name), 35),
                None => truncate(&e.name, 35),
            },
            category: e.category.as_str(),
            calories: format!("{:.0}", e.calories_per_100g),
            protein: format!("{:.1}", e.protein_per_100g),
            carbs: format!("{:.1}", e.carbs_per_100g),
            fat: format!("{:.1}", e.fat_per_100g),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..7)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}
