use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveTime;
use tracing::debug;

use crate::calories::{Biometrics, DerivedTargets, derive_targets};
use crate::catalog::Catalog;
use crate::coalescer::{CoalescerConfig, NotificationSink, PendingWriteCoalescer};
use crate::db::Database;
use crate::matcher::{Alternatives, MatchTarget, MatcherConfig, find_alternatives};
use crate::models::{
    CatalogEntry, FoodItem, MacroValues, Meal, MealName, NewFoodItem, Plan, PlanSummary,
    PlanTargets,
};
use crate::nutrition::{FoodItemEdit, apply_edit, recalculate};
use crate::units::{parse_serving, to_grams};

/// Plans, meals and food items backed by the database, with the catalog
/// used for catalog-derived items and substitutes.
pub struct PlateService {
    db: Database,
    catalog: Catalog,
}

impl PlateService {
    pub fn new(db_path: &Path, catalog: Catalog) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db, catalog })
    }

    pub fn new_in_memory(catalog: Catalog) -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db, catalog })
    }

    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // --- Plans ---

    pub fn create_plan(&self, name: &str) -> Result<Plan> {
        self.db.create_plan(name)
    }

    pub fn list_plans(&self) -> Result<Vec<Plan>> {
        self.db.list_plans()
    }

    pub fn plan_summary(&self, plan_id: i64) -> Result<PlanSummary> {
        let plan = self.db.get_plan(plan_id)?;
        let meals = self.db.list_meals(plan_id)?;
        Ok(PlanSummary::new(plan, meals))
    }

    pub fn set_targets(&self, plan_id: i64, targets: &PlanTargets) -> Result<Plan> {
        self.db.set_plan_targets(plan_id, targets)
    }

    pub fn set_targets_from_biometrics(&self, plan_id: i64, bio: &Biometrics) -> Result<(Plan, DerivedTargets)> {
        let derived = derive_targets(bio);
        let plan = self.db.set_plan_targets(plan_id, &PlanTargets::from(derived))?;
        Ok((plan, derived))
    }

    // --- Meals ---

    pub fn add_meal(&self, plan_id: i64, name: &str, time: Option<&str>) -> Result<Meal> {
        let name = MealName::parse(name)?;
        let time = time
            .map(|t| {
                NaiveTime::parse_from_str(t.trim(), "%H:%M")
                    .with_context(|| format!("Invalid time '{t}'. Use HH:MM"))
            })
            .transpose()?;
        self.db.create_meal(plan_id, name, time)
    }

    pub fn delete_meal(&self, id: i64) -> Result<bool> {
        self.db.delete_meal(id)
    }

    // --- Food items ---

    /// Resolve a food by exact name, or by a search with exactly one hit.
    pub fn resolve_catalog_food(&self, query: &str) -> Result<&CatalogEntry> {
        if let Some(entry) = self.catalog.find_by_name(query) {
            return Ok(entry);
        }
        let hits = self.catalog.search(query);
        match hits.as_slice() {
            [] => bail!("No catalog food matches '{query}'"),
            [only] => Ok(*only),
            many => {
                let names: Vec<&str> = many.iter().take(5).map(|e| e.name.as_str()).collect();
                bail!(
                    "'{query}' matches {} catalog foods: {}. Be more specific",
                    many.len(),
                    names.join(", ")
                )
            }
        }
    }

    pub fn add_catalog_item(&self, meal_id: i64, food: &str, serving: &str) -> Result<FoodItem> {
        let entry = self.resolve_catalog_food(food)?;
        let (quantity, unit) = parse_serving(serving)?;
        let item = NewFoodItem::from_catalog(entry, quantity, unit)?;
        self.db.insert_food_item(meal_id, &item)
    }

    pub fn add_manual_item(&self, meal_id: i64, name: &str, serving: &str, macros: MacroValues) -> Result<FoodItem> {
        let (quantity, unit) = parse_serving(serving)?;
        let item = NewFoodItem::manual(name, quantity, unit, macros)?;
        self.db.insert_food_item(meal_id, &item)
    }

    pub fn delete_item(&self, id: i64) -> Result<bool> {
        self.db.delete_food_item(id)
    }

    /// Replace an item's food with a catalog entry, keeping its quantity and unit.
    pub fn swap_item(&self, item_id: i64, food: &str) -> Result<FoodItem> {
        let entry = self.resolve_catalog_food(food)?.clone();
        let mut item = self.db.get_food_item(item_id)?;
        let patch = apply_edit(&mut item, &FoodItemEdit::Swap(Box::new(entry)))?;
        self.db
            .update_food_item(item_id, &patch)?
            .context("Food item not found")
    }

    // --- Alternatives ---

    pub fn alternatives_for_item(&self, item_id: i64, config: &MatcherConfig) -> Result<Alternatives> {
        let item = self.db.get_food_item(item_id)?;
        Ok(find_alternatives(
            &self.catalog,
            &MatchTarget::from_item(&item),
            config,
        ))
    }

    /// Alternatives for a food by name. Unknown foods fall back to name-only matching.
    pub fn alternatives_for_food(&self, food: &str, serving: Option<&str>, config: &MatcherConfig) -> Result<Alternatives> {
        let mut target = match self.resolve_catalog_food(food) {
            Ok(entry) => MatchTarget::from_entry(entry),
            Err(e) => {
                debug!(food, error = %e, "food not in catalog");
                MatchTarget::from_name(food, None)
            }
        };
        if let Some(serving) = serving {
            let (quantity, unit) = parse_serving(serving)?;
            target.quantity = Some(quantity);
            target.unit = unit;
            if let Some(per_100g) = &target.per_100g {
                target.current = recalculate(per_100g, to_grams(quantity, unit));
            }
        }
        Ok(find_alternatives(&self.catalog, &target, config))
    }

    // --- Editing ---

    /// A coalescer over every item of a plan, writing back to this service's database.
    pub fn edit_session<N: NotificationSink>(
        &self,
        plan_id: i64,
        notifier: N,
        config: CoalescerConfig,
    ) -> Result<PendingWriteCoalescer<&Database, N>> {
        self.db.get_plan(plan_id)?;
        let mut coalescer = PendingWriteCoalescer::new(&self.db, notifier, config);
        coalescer.load(self.db.items_for_plan(plan_id)?);
        Ok(coalescer)
    }
}
