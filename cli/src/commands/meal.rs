use anyhow::Result;
use std::process;

use plate_core::service::PlateService;

use super::helpers::json_error;

pub(crate) fn cmd_meal_add(service: &PlateService, plan_id: i64, name: &str, time: Option<&str>, json: bool) -> Result<()> {
    let meal = service.add_meal(plan_id, name, time)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&meal)?);
    } else {
        println!(
            "Added {} at {} to plan {} [meal {}]",
            meal.name.as_str(),
            meal.time.format("%H:%M"),
            meal.plan_id,
            meal.id
        );
    }
    Ok(())
}

pub(crate) fn cmd_meal_delete(service: &PlateService, id: i64, json: bool) -> Result<()> {
    if service.delete_meal(id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": id }));
        } else {
            println!("Deleted meal {id}");
        }
    } else {
        if json {
            println!("{}", json_error(&format!("Meal {id} not found")));
        } else {
            eprintln!("Meal {id} not found");
        }
        process::exit(2);
    }
    Ok(())
}
