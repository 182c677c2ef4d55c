use anyhow::Result;
use std::process;
use tabled::{Table, Tabled, settings::Style};

use plate_core::models::{PlanSummary, PlanTargets};
use plate_core::service::PlateService;

use super::helpers::{fmt_opt, format_quantity, json_error, no_neg_zero};

pub(crate) fn cmd_plan_create(service: &PlateService, name: &str, json: bool) -> Result<()> {
    let plan = service.create_plan(name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        println!("Created plan {} ({})", plan.id, plan.name);
    }
    Ok(())
}

pub(crate) fn cmd_plan_list(service: &PlateService, json: bool) -> Result<()> {
    let plans = service.list_plans()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    if plans.is_empty() {
        eprintln!("No plans yet. Create one with: plate plan create <name>");
        process::exit(2);
    }

    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Kcal target")]
        calories: String,
        #[tabled(rename = "Updated")]
        updated: String,
    }

    let rows: Vec<PlanRow> = plans
        .iter()
        .map(|p| PlanRow {
            id: p.id,
            name: p.name.clone(),
            calories: fmt_opt(p.targets.daily_calories),
            updated: p.updated_at.chars().take(10).collect(),
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
    Ok(())
}

pub(crate) fn cmd_plan_show(service: &PlateService, plan_id: i64, json: bool) -> Result<()> {
    let summary = match service.plan_summary(plan_id) {
        Ok(summary) => summary,
        Err(e) => {
            if json {
                println!("{}", json_error(&format!("{e:#}")));
            } else {
                eprintln!("Plan {plan_id} not found");
            }
            process::exit(2);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &PlanSummary) {
    let plan = &summary.plan;
    println!("=== {} (plan {}) ===\n", plan.name, plan.id);

    if summary.meals.is_empty() {
        println!("  No meals yet\n");
    }
    for meal in &summary.meals {
        let totals = meal.totals();
        println!(
            "  {} {} [meal {}] ({:.0} kcal)",
            meal.time.format("%H:%M"),
            meal.name.as_str().replace('_', " ").to_uppercase(),
            meal.id,
            totals.calories
        );
        for item in &meal.items {
            let source = if item.provenance.is_derived() { "" } else { " *" };
            println!(
                "    [{}] {}{source}: {}, {} kcal | P:{}g C:{}g F:{}g",
                item.id,
                item.food_name,
                format_quantity(item.quantity, item.unit),
                fmt_opt(item.macros.calories),
                fmt_opt(item.macros.protein),
                fmt_opt(item.macros.carbs),
                fmt_opt(item.macros.fat),
            );
        }
        println!();
    }

    let t = &summary.totals;
    println!(
        "  TOTAL: {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        t.calories, t.protein, t.carbs, t.fat
    );
    print_targets(&plan.targets, summary);
}

fn print_targets(targets: &PlanTargets, summary: &PlanSummary) {
    if targets.is_empty() {
        return;
    }
    let r = &summary.remaining;
    println!(
        "  TARGET: {} kcal | P:{}g C:{}g F:{}g",
        fmt_opt(targets.daily_calories),
        fmt_opt(targets.protein_grams),
        fmt_opt(targets.carbs_grams),
        fmt_opt(targets.fat_grams),
    );
    println!(
        "  REMAINING: {} kcal | P:{}g C:{}g F:{}g",
        fmt_opt(r.calories.map(no_neg_zero)),
        fmt_opt(r.protein),
        fmt_opt(r.carbs),
        fmt_opt(r.fat),
    );
    if let Some(water) = targets.daily_water_ml {
        println!("  WATER: {water:.0} ml");
    }
}
