mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    biometrics, cmd_alternatives, cmd_catalog, cmd_convert, cmd_edit, cmd_item_add,
    cmd_item_alternatives, cmd_item_delete, cmd_item_swap, cmd_meal_add, cmd_meal_delete,
    cmd_plan_create, cmd_plan_list, cmd_plan_show, cmd_targets,
};
use crate::config::Config;
use plate_core::models::MacroValues;
use plate_core::service::PlateService;

#[derive(Parser)]
#[command(
    name = "plate",
    version,
    about = "Plan meals and hit your macros",
    long_about = "Plan meals from a food catalog, derive calorie and macro targets from \
                  body measurements, and find foods that can stand in for one another."
)]
struct Cli {
    /// Food catalog JSON file (default: catalog.json in the data directory, else built-in)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a serving between units (e.g. "2 tbsp", "1.5 cup --to g")
    Convert {
        /// Serving to convert (e.g. "150g", "2 tbsp", "3 units")
        serving: String,
        /// Target unit: g, ml, cup, tbsp, tsp, unit (default: grams)
        #[arg(long)]
        to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Derive daily calorie, macro and water targets from body measurements
    Targets {
        /// Body weight in kg
        #[arg(long)]
        weight: f64,
        /// Height in cm
        #[arg(long)]
        height: f64,
        /// Age in years
        #[arg(long)]
        age: f64,
        /// male or female
        #[arg(long)]
        gender: String,
        /// sedentary, light, moderate, active, very_active
        #[arg(long, default_value = "moderate")]
        activity: String,
        /// cutting, maintenance, bulking
        #[arg(long, default_value = "maintenance")]
        goal: String,
        /// Save the result as this plan's targets
        #[arg(long)]
        plan: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Browse the food catalog
    Catalog {
        /// Filter by name or brand
        #[arg(long)]
        search: Option<String>,
        /// Filter by category: protein, carb, fat
        #[arg(long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Find catalog foods that can replace a food
    Alternatives {
        /// Catalog food name, or any name to match by name only
        food: String,
        /// Serving to match calories for (e.g. "150g")
        #[arg(long)]
        serving: Option<String>,
        /// Loosen the macro tolerance
        #[arg(long)]
        widen: bool,
        /// Reveal this many further pages of results
        #[arg(long, default_value_t = 0)]
        more: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage meal plans
    Plan {
        #[command(subcommand)]
        action: PlanAction,
    },
    /// Manage meals within a plan
    Meal {
        #[command(subcommand)]
        action: MealAction,
    },
    /// Manage food items within a meal
    Item {
        #[command(subcommand)]
        action: ItemAction,
    },
    /// Interactively edit a plan's food items; changes are saved after a pause
    Edit {
        /// Plan ID
        plan_id: i64,
        /// Milliseconds without edits before an item is saved
        #[arg(long, default_value_t = 500)]
        quiescence_ms: u64,
    },
}

#[derive(Subcommand)]
enum PlanAction {
    /// Create a new plan
    Create {
        /// Plan name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all plans
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a plan's meals, totals and remaining targets
    Show {
        /// Plan ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MealAction {
    /// Add a meal to a plan
    Add {
        /// Plan ID
        plan_id: i64,
        /// breakfast, morning_snack, lunch, afternoon_snack, dinner, evening_snack
        name: String,
        /// Time of day (HH:MM, default depends on the meal)
        #[arg(long)]
        time: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an empty meal
    Delete {
        /// Meal ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ItemAction {
    /// Add a food to a meal (from the catalog, or manual with any macro flag)
    Add {
        /// Meal ID
        meal_id: i64,
        /// Catalog food name, or the name of a manual entry
        food: String,
        /// Serving (e.g. "150g", "1 cup", "2 units")
        serving: String,
        /// Manual calories
        #[arg(long)]
        calories: Option<f64>,
        /// Manual protein in grams
        #[arg(long)]
        protein: Option<f64>,
        /// Manual carbs in grams
        #[arg(long)]
        carbs: Option<f64>,
        /// Manual fat in grams
        #[arg(long)]
        fat: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a food item
    Delete {
        /// Item ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace an item's food with a catalog food, keeping its serving
    Swap {
        /// Item ID
        id: i64,
        /// Catalog food name
        food: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Find catalog foods that can replace an item
    Alternatives {
        /// Item ID
        id: i64,
        /// Loosen the macro tolerance
        #[arg(long)]
        widen: bool,
        /// Reveal this many further pages of results
        #[arg(long, default_value_t = 0)]
        more: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let catalog = config.catalog(cli.catalog.as_deref())?;
    let service = PlateService::new(&config.db_path, catalog)?;

    match cli.command {
        Commands::Convert { serving, to, json } => cmd_convert(&serving, to.as_deref(), json),
        Commands::Targets {
            weight,
            height,
            age,
            gender,
            activity,
            goal,
            plan,
            json,
        } => {
            let bio = biometrics(weight, height, age, &gender, &activity, &goal)?;
            cmd_targets(&service, &bio, plan, json)
        }
        Commands::Catalog {
            search,
            category,
            json,
        } => cmd_catalog(
            service.catalog(),
            search.as_deref(),
            category.as_deref(),
            json,
        ),
        Commands::Alternatives {
            food,
            serving,
            widen,
            more,
            json,
        } => cmd_alternatives(&service, &food, serving.as_deref(), widen, more, json),
        Commands::Plan { action } => match action {
            PlanAction::Create { name, json } => cmd_plan_create(&service, &name, json),
            PlanAction::List { json } => cmd_plan_list(&service, json),
            PlanAction::Show { id, json } => cmd_plan_show(&service, id, json),
        },
        Commands::Meal { action } => match action {
            MealAction::Add {
                plan_id,
                name,
                time,
                json,
            } => cmd_meal_add(&service, plan_id, &name, time.as_deref(), json),
            MealAction::Delete { id, json } => cmd_meal_delete(&service, id, json),
        },
        Commands::Item { action } => match action {
            ItemAction::Add {
                meal_id,
                food,
                serving,
                calories,
                protein,
                carbs,
                fat,
                json,
            } => {
                let manual = MacroValues {
                    calories,
                    protein,
                    carbs,
                    fat,
                };
                cmd_item_add(&service, meal_id, &food, &serving, manual, json)
            }
            ItemAction::Delete { id, json } => cmd_item_delete(&service, id, json),
            ItemAction::Swap { id, food, json } => cmd_item_swap(&service, id, &food, json),
            ItemAction::Alternatives {
                id,
                widen,
                more,
                json,
            } => cmd_item_alternatives(&service, id, widen, more, json),
        },
        Commands::Edit {
            plan_id,
            quiescence_ms,
        } => cmd_edit(&service, plan_id, quiescence_ms).await,
    }
}
