use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveTime};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};

use crate::coalescer::ItemStore;
use crate::models::{
    Category, FoodItem, FoodItemPatch, MacroValues, Meal, MealName, NewFoodItem, Per100g, Plan,
    PlanTargets, Provenance,
};
use crate::units::Unit;

const TIME_FORMAT: &str = "%H:%M";

const FOOD_ITEM_COLUMNS: &str = "fi.id, fi.meal_id, fi.food_name, fi.quantity, fi.unit,
     fi.calories, fi.protein, fi.carbs, fi.fat, fi.source, fi.category,
     fi.calories_per_100g, fi.protein_per_100g, fi.carbs_per_100g, fi.fat_per_100g";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS plans (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    daily_calories REAL,
                    protein_grams REAL,
                    carbs_grams REAL,
                    fat_grams REAL,
                    daily_water_ml REAL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    plan_id INTEGER NOT NULL REFERENCES plans(id),
                    name TEXT NOT NULL,
                    time TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS food_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    meal_id INTEGER NOT NULL REFERENCES meals(id),
                    food_name TEXT NOT NULL,
                    quantity REAL NOT NULL CHECK (quantity > 0),
                    unit TEXT NOT NULL,
                    calories REAL,
                    protein REAL,
                    carbs REAL,
                    fat REAL,
                    source TEXT NOT NULL CHECK (source IN ('catalog', 'manual')),
                    category TEXT,
                    calories_per_100g REAL,
                    protein_per_100g REAL,
                    carbs_per_100g REAL,
                    fat_per_100g REAL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_meals_plan ON meals(plan_id);
                CREATE INDEX IF NOT EXISTS idx_food_items_meal ON food_items(meal_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn text_column<T>(idx: usize, raw: &str, parse: impl FnOnce(&str) -> Result<T>) -> rusqlite::Result<T> {
        parse(raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
    }

    fn plan_from_row(row: &rusqlite::Row) -> rusqlite::Result<Plan> {
        Ok(Plan {
            id: row.get(0)?,
            name: row.get(1)?,
            targets: PlanTargets {
                daily_calories: row.get(2)?,
                protein_grams: row.get(3)?,
                carbs_grams: row.get(4)?,
                fat_grams: row.get(5)?,
                daily_water_ml: row.get(6)?,
            },
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    // Expects columns: 0: id, 1: plan_id, 2: name, 3: time
    fn meal_from_row(row: &rusqlite::Row) -> rusqlite::Result<Meal> {
        let name: String = row.get(2)?;
        let time: String = row.get(3)?;
        Ok(Meal {
            id: row.get(0)?,
            plan_id: row.get(1)?,
            name: Self::text_column(2, &name, MealName::parse)?,
            time: Self::text_column(3, &time, |s| {
                NaiveTime::parse_from_str(s, TIME_FORMAT).context("Invalid meal time")
            })?,
            items: Vec::new(),
        })
    }

    // Expects FOOD_ITEM_COLUMNS order.
    fn food_item_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodItem> {
        let unit: String = row.get(4)?;
        let source: String = row.get(9)?;
        let category: Option<String> = row.get(10)?;
        let provenance = if source == "catalog" {
            Provenance::Derived(Per100g {
                category: category
                    .as_deref()
                    .map(|c| Self::text_column(10, c, Category::parse))
                    .transpose()?,
                calories: row.get(11)?,
                protein: row.get(12)?,
                carbs: row.get(13)?,
                fat: row.get(14)?,
            })
        } else {
            Provenance::Manual
        };
        Ok(FoodItem {
            id: row.get(0)?,
            meal_id: row.get(1)?,
            food_name: row.get(2)?,
            quantity: row.get(3)?,
            unit: Self::text_column(4, &unit, Unit::parse)?,
            macros: MacroValues {
                calories: row.get(5)?,
                protein: row.get(6)?,
                carbs: row.get(7)?,
                fat: row.get(8)?,
            },
            provenance,
        })
    }

    fn provenance_columns(provenance: &Provenance) -> (&'static str, Per100g) {
        match provenance {
            Provenance::Derived(per_100g) => ("catalog", *per_100g),
            Provenance::Manual => ("manual", Per100g::default()),
        }
    }

    // --- Plans ---

    pub fn create_plan(&self, name: &str) -> Result<Plan> {
        let name = name.trim();
        if name.is_empty() {
            bail!("Plan name must not be empty");
        }
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO plans (name, created_at, updated_at) VALUES (?1, ?2, ?3)",
            params![name, now, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_plan(id)
    }

    pub fn get_plan(&self, id: i64) -> Result<Plan> {
        self.conn
            .query_row(
                "SELECT id, name, daily_calories, protein_grams, carbs_grams, fat_grams,
                        daily_water_ml, created_at, updated_at
                 FROM plans WHERE id = ?1",
                params![id],
                Self::plan_from_row,
            )
            .context("Plan not found")
    }

    pub fn list_plans(&self) -> Result<Vec<Plan>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, daily_calories, protein_grams, carbs_grams, fat_grams,
                    daily_water_ml, created_at, updated_at
             FROM plans ORDER BY id",
        )?;
        let plans = stmt
            .query_map([], Self::plan_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(plans)
    }

    pub fn set_plan_targets(&self, plan_id: i64, targets: &PlanTargets) -> Result<Plan> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE plans SET daily_calories = ?1, protein_grams = ?2, carbs_grams = ?3,
                    fat_grams = ?4, daily_water_ml = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                targets.daily_calories,
                targets.protein_grams,
                targets.carbs_grams,
                targets.fat_grams,
                targets.daily_water_ml,
                now,
                plan_id,
            ],
        )?;
        if rows == 0 {
            bail!("Plan not found");
        }
        self.get_plan(plan_id)
    }

    // --- Meals ---

    pub fn create_meal(&self, plan_id: i64, name: MealName, time: Option<NaiveTime>) -> Result<Meal> {
        self.get_plan(plan_id)?;
        let now = Local::now().to_rfc3339();
        let time = time.unwrap_or_else(|| name.default_time());
        self.conn.execute(
            "INSERT INTO meals (plan_id, name, time, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                plan_id,
                name.as_str(),
                time.format(TIME_FORMAT).to_string(),
                now,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_meal(id)
    }

    /// A meal with its items, in insertion order.
    pub fn get_meal(&self, id: i64) -> Result<Meal> {
        let mut meal = self
            .conn
            .query_row(
                "SELECT id, plan_id, name, time FROM meals WHERE id = ?1",
                params![id],
                Self::meal_from_row,
            )
            .context("Meal not found")?;
        meal.items = self.items_for_meal(id)?;
        Ok(meal)
    }

    fn meal_exists(&self, id: i64) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT id FROM meals WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    /// Meals of a plan ordered by time, each with its items.
    pub fn list_meals(&self, plan_id: i64) -> Result<Vec<Meal>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, plan_id, name, time FROM meals WHERE plan_id = ?1 ORDER BY time, id",
        )?;
        let mut meals = stmt
            .query_map(params![plan_id], Self::meal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        let mut items = self.items_for_plan(plan_id)?;
        for meal in &mut meals {
            let (mine, rest): (Vec<FoodItem>, Vec<FoodItem>) =
                items.into_iter().partition(|i| i.meal_id == meal.id);
            meal.items = mine;
            items = rest;
        }
        Ok(meals)
    }

    /// Deletes an empty meal. Items are never removed implicitly.
    pub fn delete_meal(&self, id: i64) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM food_items WHERE meal_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if count > 0 {
            bail!("Meal {id} still has {count} food item(s); delete them first");
        }
        let rows = self
            .conn
            .execute("DELETE FROM meals WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // --- Food items ---

    pub fn insert_food_item(&self, meal_id: i64, item: &NewFoodItem) -> Result<FoodItem> {
        if !self.meal_exists(meal_id)? {
            bail!("Meal not found");
        }
        let now = Local::now().to_rfc3339();
        let (source, snapshot) = Self::provenance_columns(&item.provenance);
        self.conn.execute(
            "INSERT INTO food_items (meal_id, food_name, quantity, unit, calories, protein, carbs, fat,
                                     source, category, calories_per_100g, protein_per_100g,
                                     carbs_per_100g, fat_per_100g, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                meal_id,
                item.food_name,
                item.quantity,
                item.unit.as_str(),
                item.macros.calories,
                item.macros.protein,
                item.macros.carbs,
                item.macros.fat,
                source,
                snapshot.category.map(Category::as_str),
                snapshot.calories,
                snapshot.protein,
                snapshot.carbs,
                snapshot.fat,
                now,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_food_item(id)
    }

    pub fn get_food_item(&self, id: i64) -> Result<FoodItem> {
        self.find_food_item(id)?.context("Food item not found")
    }

    pub fn find_food_item(&self, id: i64) -> Result<Option<FoodItem>> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {FOOD_ITEM_COLUMNS} FROM food_items fi WHERE fi.id = ?1"),
                params![id],
                Self::food_item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    /// Apply a partial update. Returns `None` when the item does not exist.
    pub fn update_food_item(&self, id: i64, patch: &FoodItemPatch) -> Result<Option<FoodItem>> {
        let Some(mut item) = self.find_food_item(id)? else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(Some(item));
        }
        patch.apply_to(&mut item);

        let now = Local::now().to_rfc3339();
        let (source, snapshot) = Self::provenance_columns(&item.provenance);
        self.conn.execute(
            "UPDATE food_items SET food_name = ?1, quantity = ?2, unit = ?3, calories = ?4,
                    protein = ?5, carbs = ?6, fat = ?7, source = ?8, category = ?9,
                    calories_per_100g = ?10, protein_per_100g = ?11, carbs_per_100g = ?12,
                    fat_per_100g = ?13, updated_at = ?14
             WHERE id = ?15",
            params![
                item.food_name,
                item.quantity,
                item.unit.as_str(),
                item.macros.calories,
                item.macros.protein,
                item.macros.carbs,
                item.macros.fat,
                source,
                snapshot.category.map(Category::as_str),
                snapshot.calories,
                snapshot.protein,
                snapshot.carbs,
                snapshot.fat,
                now,
                id,
            ],
        )?;
        self.find_food_item(id)
    }

    pub fn delete_food_item(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM food_items WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn items_for_meal(&self, meal_id: i64) -> Result<Vec<FoodItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_ITEM_COLUMNS} FROM food_items fi WHERE fi.meal_id = ?1 ORDER BY fi.id"
        ))?;
        let items = stmt
            .query_map(params![meal_id], Self::food_item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn items_for_plan(&self, plan_id: i64) -> Result<Vec<FoodItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {FOOD_ITEM_COLUMNS}
             FROM food_items fi
             JOIN meals m ON fi.meal_id = m.id
             WHERE m.plan_id = ?1
             ORDER BY fi.id"
        ))?;
        let items = stmt
            .query_map(params![plan_id], Self::food_item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }
}

impl ItemStore for Database {
    fn create_item(&self, meal_id: i64, item: &NewFoodItem) -> Result<Option<FoodItem>> {
        if !self.meal_exists(meal_id)? {
            return Ok(None);
        }
        self.insert_food_item(meal_id, item).map(Some)
    }

    fn update_item(&self, id: i64, patch: &FoodItemPatch) -> Result<Option<FoodItem>> {
        self.update_food_item(id, patch)
    }

    fn delete_item(&self, id: i64) -> Result<bool> {
        self.delete_food_item(id)
    }
}
