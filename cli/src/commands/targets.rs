use anyhow::{Result, bail};

use plate_core::calories::{ActivityLevel, Biometrics, DerivedTargets, Gender, Goal, derive_targets};
use plate_core::service::PlateService;

use super::helpers::no_neg_zero;

/// Parse and range-check the body measurements given on the command line.
pub(crate) fn biometrics(
    weight_kg: f64,
    height_cm: f64,
    age_years: f64,
    gender: &str,
    activity: &str,
    goal: &str,
) -> Result<Biometrics> {
    for (label, value) in [("Weight", weight_kg), ("Height", height_cm), ("Age", age_years)] {
        if !value.is_finite() || value <= 0.0 {
            bail!("{label} must be a positive number (got {value})");
        }
    }
    Ok(Biometrics {
        weight_kg,
        height_cm,
        age_years,
        gender: Gender::parse(gender)?,
        activity: ActivityLevel::parse(activity)?,
        goal: Goal::parse(goal)?,
    })
}

pub(crate) fn cmd_targets(service: &PlateService, bio: &Biometrics, plan_id: Option<i64>, json: bool) -> Result<()> {
    let (targets, plan) = match plan_id {
        Some(id) => {
            let (plan, targets) = service.set_targets_from_biometrics(id, bio)?;
            (targets, Some(plan))
        }
        None => (derive_targets(bio), None),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "targets": targets,
                "plan": plan,
            }))?
        );
        return Ok(());
    }

    print_targets(&targets);
    if let Some(plan) = plan {
        println!("\nSaved as targets for plan {} ({})", plan.id, plan.name);
    }
    Ok(())
}

fn print_targets(t: &DerivedTargets) {
    let m = &t.macros;
    println!("  BMR:      {:.0} kcal", t.bmr);
    println!("  TDEE:     {:.0} kcal", t.tdee);
    println!("  Target:   {:.0} kcal", t.calories);
    println!("  Protein:  {:.0}g ({:.0} kcal)", m.protein_g, m.protein_kcal);
    println!(
        "  Carbs:    {:.0}g ({:.0} kcal)",
        no_neg_zero(m.carbs_g),
        no_neg_zero(m.carbs_kcal)
    );
    println!("  Fat:      {:.0}g ({:.0} kcal)", m.fat_g, m.fat_kcal);
    println!("  Water:    {:.0} ml", t.water_ml);
    if m.carbs_kcal < 0.0 {
        eprintln!("\nWarning: protein and fat exceed the calorie target; carbs are negative");
    }
}
