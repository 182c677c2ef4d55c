use anyhow::Result;
use std::process;

use plate_core::models::MacroValues;
use plate_core::service::PlateService;

use super::helpers::{count_unit_note, describe_item, json_error};

pub(crate) fn cmd_item_add(
    service: &PlateService,
    meal_id: i64,
    food: &str,
    serving: &str,
    manual: MacroValues,
    json: bool,
) -> Result<()> {
    // Any macro flag turns the item into a manual entry named `food`.
    let item = if manual.has_any() {
        service.add_manual_item(meal_id, food, serving, manual)?
    } else {
        service.add_catalog_item(meal_id, food, serving)?
    };
    if let Some(note) = count_unit_note(&item) {
        eprintln!("{note}");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        println!("Added {}", describe_item(&item));
    }
    Ok(())
}

pub(crate) fn cmd_item_delete(service: &PlateService, id: i64, json: bool) -> Result<()> {
    if service.delete_item(id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": id }));
        } else {
            println!("Deleted item {id}");
        }
    } else {
        if json {
            println!("{}", json_error(&format!("Item {id} not found")));
        } else {
            eprintln!("Item {id} not found");
        }
        process::exit(2);
    }
    Ok(())
}

pub(crate) fn cmd_item_swap(service: &PlateService, id: i64, food: &str, json: bool) -> Result<()> {
    let item = service.swap_item(id, food)?;
    if let Some(note) = count_unit_note(&item) {
        eprintln!("{note}");
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        println!("Swapped to {}", describe_item(&item));
    }
    Ok(())
}
