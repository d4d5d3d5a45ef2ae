use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rusqlite::types::Type;
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::mapping::MappedPlan;
use crate::models::{
    Day, DayDetail, GroceryCategory, GroceryItem, GroceryList, Meal, MealPlan, MealType,
    MeasurementUnit, NewIngredient, NewIngredientLine, NewRecipe, PlanDetail, Recipe,
    RecipeDetail, RecipeIngredient, RecipeSource, UserProfile,
};

const PLAN_COLUMNS: &str =
    "id, uuid, week_start_date, plan_duration, is_active, grocery_list_id, created_at, updated_at";

const MEAL_SELECT: &str = "SELECT m.id, m.uuid, m.day_id, m.meal_type, m.position, m.recipe_id,
            m.is_eaten, m.eaten_at, m.health_record_ids, m.created_at, m.updated_at,
            r.name, r.calories, r.protein_g, r.carbs_g, r.fat_g
     FROM meals m
     LEFT JOIN recipes r ON m.recipe_id = r.id";

const RECIPE_COLUMNS: &str = "id, uuid, external_id, name, description, instructions,
    prep_time_min, cook_time_min, servings, complexity, cuisine, calories, protein_g, carbs_g,
    fat_g, image_url, source, is_custom, is_favorite, created_at, updated_at";

/// A grocery item about to be inserted into a list.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGroceryItem {
    pub ingredient_id: Option<i64>,
    pub name: String,
    pub quantity: f64,
    pub unit: MeasurementUnit,
    pub category: GroceryCategory,
    pub is_checked: bool,
}

/// One ingredient line of an uneaten meal in a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedIngredient {
    pub ingredient_id: i64,
    pub name: String,
    pub category: GroceryCategory,
    pub quantity: f64,
    pub unit: MeasurementUnit,
}

pub struct Database {
    conn: Connection,
}

fn date_str(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

/// Reads a text column into any type parsed with `FromStr` (enums, dates).
fn text_col<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn opt_text_col<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Reads a JSON-encoded text column.
fn json_col<T: serde::de::DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
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

    #[allow(clippy::too_many_lines)]
    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS user_profile (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    age INTEGER NOT NULL,
                    sex TEXT NOT NULL,
                    weight_kg REAL NOT NULL,
                    height_cm REAL NOT NULL,
                    activity_level TEXT NOT NULL,
                    goal TEXT NOT NULL,
                    dietary_restrictions TEXT NOT NULL DEFAULT '[]',
                    allergies TEXT NOT NULL DEFAULT '[]',
                    dislikes TEXT NOT NULL DEFAULT '[]',
                    cuisine_preferences TEXT NOT NULL DEFAULT '{}',
                    cooking_skill TEXT NOT NULL,
                    max_cooking_time_min INTEGER NOT NULL,
                    pantry_level TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS grocery_lists (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL,
                    plan_id INTEGER,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meal_plans (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL,
                    week_start_date TEXT NOT NULL,
                    plan_duration INTEGER NOT NULL,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    grocery_list_id INTEGER REFERENCES grocery_lists(id) ON DELETE SET NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS days (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL,
                    plan_id INTEGER NOT NULL REFERENCES meal_plans(id) ON DELETE CASCADE,
                    date TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL,
                    external_id TEXT UNIQUE,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    instructions TEXT NOT NULL DEFAULT '[]',
                    prep_time_min INTEGER NOT NULL,
                    cook_time_min INTEGER NOT NULL,
                    servings INTEGER NOT NULL,
                    complexity TEXT NOT NULL,
                    cuisine TEXT,
                    calories INTEGER NOT NULL,
                    protein_g INTEGER NOT NULL,
                    carbs_g INTEGER NOT NULL,
                    fat_g INTEGER NOT NULL,
                    image_url TEXT,
                    source TEXT NOT NULL,
                    is_custom INTEGER NOT NULL DEFAULT 0,
                    is_favorite INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    normalized_name TEXT NOT NULL UNIQUE,
                    category TEXT NOT NULL,
                    default_unit TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipe_ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    ingredient_id INTEGER NOT NULL REFERENCES ingredients(id),
                    quantity REAL NOT NULL,
                    unit TEXT NOT NULL,
                    notes TEXT
                );

                CREATE TABLE IF NOT EXISTS meals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL,
                    day_id INTEGER NOT NULL REFERENCES days(id) ON DELETE CASCADE,
                    meal_type TEXT NOT NULL,
                    position INTEGER NOT NULL DEFAULT 0,
                    recipe_id INTEGER REFERENCES recipes(id) ON DELETE SET NULL,
                    is_eaten INTEGER NOT NULL DEFAULT 0,
                    eaten_at TEXT,
                    health_record_ids TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS grocery_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    list_id INTEGER NOT NULL REFERENCES grocery_lists(id) ON DELETE CASCADE,
                    ingredient_id INTEGER REFERENCES ingredients(id) ON DELETE SET NULL,
                    name TEXT NOT NULL,
                    quantity REAL NOT NULL,
                    unit TEXT NOT NULL,
                    category TEXT NOT NULL,
                    is_checked INTEGER NOT NULL DEFAULT 0,
                    is_locked INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS user_settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_days_plan ON days(plan_id);
                CREATE INDEX IF NOT EXISTS idx_days_date ON days(date);
                CREATE INDEX IF NOT EXISTS idx_meals_day ON meals(day_id);
                CREATE INDEX IF NOT EXISTS idx_meals_recipe ON meals(recipe_id);
                CREATE INDEX IF NOT EXISTS idx_recipe_ingredients_recipe ON recipe_ingredients(recipe_id);
                CREATE INDEX IF NOT EXISTS idx_grocery_items_list ON grocery_items(list_id);
                CREATE INDEX IF NOT EXISTS idx_recipes_name ON recipes(name);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    /// Runs `f` inside one transaction. Nothing it wrote survives an error.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    // --- Row mapping helpers ---

    fn profile_from_row(row: &rusqlite::Row) -> rusqlite::Result<UserProfile> {
        Ok(UserProfile {
            age: row.get(0)?,
            sex: text_col(row, 1)?,
            weight_kg: row.get(2)?,
            height_cm: row.get(3)?,
            activity_level: text_col(row, 4)?,
            goal: text_col(row, 5)?,
            dietary_restrictions: json_col(row, 6)?,
            allergies: json_col(row, 7)?,
            dislikes: json_col(row, 8)?,
            cuisine_preferences: json_col(row, 9)?,
            cooking_skill: text_col(row, 10)?,
            max_cooking_time_min: row.get(11)?,
            pantry_level: text_col(row, 12)?,
            updated_at: row.get(13)?,
        })
    }

    fn plan_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealPlan> {
        Ok(MealPlan {
            id: row.get(0)?,
            uuid: row.get(1)?,
            week_start_date: text_col(row, 2)?,
            plan_duration: row.get(3)?,
            is_active: row.get(4)?,
            grocery_list_id: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn day_from_row(row: &rusqlite::Row) -> rusqlite::Result<Day> {
        Ok(Day {
            id: row.get(0)?,
            uuid: row.get(1)?,
            plan_id: row.get(2)?,
            date: text_col(row, 3)?,
        })
    }

    // Expects the column order of MEAL_SELECT.
    fn meal_from_row(row: &rusqlite::Row) -> rusqlite::Result<Meal> {
        Ok(Meal {
            id: row.get(0)?,
            uuid: row.get(1)?,
            day_id: row.get(2)?,
            meal_type: text_col(row, 3)?,
            position: row.get(4)?,
            recipe_id: row.get(5)?,
            is_eaten: row.get(6)?,
            eaten_at: row.get(7)?,
            health_record_ids: json_col(row, 8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
            recipe_name: row.get(11)?,
            calories: row.get(12)?,
            protein_g: row.get(13)?,
            carbs_g: row.get(14)?,
            fat_g: row.get(15)?,
        })
    }

    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
        Ok(Recipe {
            id: row.get(0)?,
            uuid: row.get(1)?,
            external_id: row.get(2)?,
            name: row.get(3)?,
            description: row.get(4)?,
            instructions: json_col(row, 5)?,
            prep_time_min: row.get(6)?,
            cook_time_min: row.get(7)?,
            servings: row.get(8)?,
            complexity: text_col(row, 9)?,
            cuisine: opt_text_col(row, 10)?,
            calories: row.get(11)?,
            protein_g: row.get(12)?,
            carbs_g: row.get(13)?,
            fat_g: row.get(14)?,
            image_url: row.get(15)?,
            source: text_col(row, 16)?,
            is_custom: row.get(17)?,
            is_favorite: row.get(18)?,
            created_at: row.get(19)?,
            updated_at: row.get(20)?,
        })
    }

    fn grocery_item_from_row(row: &rusqlite::Row) -> rusqlite::Result<GroceryItem> {
        Ok(GroceryItem {
            id: row.get(0)?,
            list_id: row.get(1)?,
            ingredient_id: row.get(2)?,
            name: row.get(3)?,
            quantity: row.get(4)?,
            unit: text_col(row, 5)?,
            category: text_col(row, 6)?,
            is_checked: row.get(7)?,
            is_locked: row.get(8)?,
        })
    }

    // --- Profile ---

    pub fn get_profile(&self) -> Result<Option<UserProfile>> {
        let mut stmt = self.conn.prepare(
            "SELECT age, sex, weight_kg, height_cm, activity_level, goal, dietary_restrictions,
                    allergies, dislikes, cuisine_preferences, cooking_skill, max_cooking_time_min,
                    pantry_level, updated_at
             FROM user_profile WHERE id = 1",
        )?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::profile_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn save_profile(&self, profile: &UserProfile) -> Result<UserProfile> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO user_profile (id, age, sex, weight_kg, height_cm, activity_level, goal,
                dietary_restrictions, allergies, dislikes, cuisine_preferences, cooking_skill,
                max_cooking_time_min, pantry_level, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
                age = excluded.age, sex = excluded.sex, weight_kg = excluded.weight_kg,
                height_cm = excluded.height_cm, activity_level = excluded.activity_level,
                goal = excluded.goal, dietary_restrictions = excluded.dietary_restrictions,
                allergies = excluded.allergies, dislikes = excluded.dislikes,
                cuisine_preferences = excluded.cuisine_preferences,
                cooking_skill = excluded.cooking_skill,
                max_cooking_time_min = excluded.max_cooking_time_min,
                pantry_level = excluded.pantry_level, updated_at = excluded.updated_at",
            params![
                profile.age,
                profile.sex.as_str(),
                profile.weight_kg,
                profile.height_cm,
                profile.activity_level.as_str(),
                profile.goal.as_str(),
                serde_json::to_string(&profile.dietary_restrictions)?,
                serde_json::to_string(&profile.allergies)?,
                serde_json::to_string(&profile.dislikes)?,
                serde_json::to_string(&profile.cuisine_preferences)?,
                profile.cooking_skill.as_str(),
                profile.max_cooking_time_min,
                profile.pantry_level.as_str(),
                now,
            ],
        )?;
        self.get_profile()?.context("Profile not found after save")
    }

    // --- Plans ---

    pub fn insert_plan(&self, week_start_date: NaiveDate, plan_duration: i64) -> Result<i64> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO meal_plans (uuid, week_start_date, plan_duration, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?5)",
            params![
                Uuid::new_v4().to_string(),
                date_str(week_start_date),
                plan_duration,
                now,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_plan(&self, id: i64) -> Result<MealPlan> {
        self.conn
            .query_row(
                &format!("SELECT {PLAN_COLUMNS} FROM meal_plans WHERE id = ?1"),
                params![id],
                Self::plan_from_row,
            )
            .context("Meal plan not found")
    }

    /// All plans, newest first.
    pub fn list_plans(&self) -> Result<Vec<MealPlan>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PLAN_COLUMNS} FROM meal_plans ORDER BY created_at DESC, id DESC"
        ))?;
        let plans = stmt
            .query_map([], Self::plan_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(plans)
    }

    /// Active plans other than `except`, newest first.
    pub fn active_plans_except(&self, except: i64) -> Result<Vec<MealPlan>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PLAN_COLUMNS} FROM meal_plans
             WHERE is_active = 1 AND id != ?1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let plans = stmt
            .query_map(params![except], Self::plan_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(plans)
    }

    /// Newest active plan, if any.
    pub fn latest_active_plan(&self) -> Result<Option<MealPlan>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PLAN_COLUMNS} FROM meal_plans
             WHERE is_active = 1
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::plan_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn set_plan_active(&self, id: i64, active: bool) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "UPDATE meal_plans SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active, now, id],
        )?;
        Ok(())
    }

    pub fn set_plan_range(&self, id: i64, week_start_date: NaiveDate, duration: i64) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "UPDATE meal_plans SET week_start_date = ?1, plan_duration = ?2, updated_at = ?3
             WHERE id = ?4",
            params![date_str(week_start_date), duration, now, id],
        )?;
        Ok(())
    }

    pub fn set_plan_grocery_list(&self, plan_id: i64, list_id: Option<i64>) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "UPDATE meal_plans SET grocery_list_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![list_id, now, plan_id],
        )?;
        Ok(())
    }

    /// Earliest and latest day dates currently attached to the plan.
    pub fn plan_date_range(&self, plan_id: i64) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let (min, max): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(date), MAX(date) FROM days WHERE plan_id = ?1",
            params![plan_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        match (min, max) {
            (Some(min), Some(max)) => Ok(Some((min.parse()?, max.parse()?))),
            _ => Ok(None),
        }
    }

    pub fn get_plan_detail(&self, id: i64) -> Result<PlanDetail> {
        let plan = self.get_plan(id)?;
        let days = self
            .days_for_plan(id)?
            .into_iter()
            .map(|day| {
                let meals = self.meals_for_day(day.id)?;
                Ok(DayDetail { day, meals })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PlanDetail {
            end_date: plan.end_date(),
            plan,
            days,
        })
    }

    // --- Days ---

    pub fn insert_day(&self, plan_id: i64, date: NaiveDate) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO days (uuid, plan_id, date) VALUES (?1, ?2, ?3)",
            params![Uuid::new_v4().to_string(), plan_id, date_str(date)],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn days_for_plan(&self, plan_id: i64) -> Result<Vec<Day>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, plan_id, date FROM days WHERE plan_id = ?1 ORDER BY date, id",
        )?;
        let days = stmt
            .query_map(params![plan_id], Self::day_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(days)
    }

    /// The day scheduled for `date`, preferring active plans and then newer ones.
    pub fn day_for_date(&self, date: NaiveDate) -> Result<Option<Day>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.id, d.uuid, d.plan_id, d.date
             FROM days d
             JOIN meal_plans p ON d.plan_id = p.id
             WHERE d.date = ?1
             ORDER BY p.is_active DESC, p.created_at DESC, p.id DESC, d.id
             LIMIT 1",
        )?;
        let mut rows = stmt.query(params![date_str(date)])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::day_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn move_day(&self, day_id: i64, plan_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE days SET plan_id = ?1 WHERE id = ?2",
            params![plan_id, day_id],
        )?;
        Ok(())
    }

    // --- Meals ---

    pub fn insert_meal(
        &self,
        day_id: i64,
        meal_type: MealType,
        position: i64,
        recipe_id: Option<i64>,
    ) -> Result<i64> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO meals (uuid, day_id, meal_type, position, recipe_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Uuid::new_v4().to_string(),
                day_id,
                meal_type.as_str(),
                position,
                recipe_id,
                now,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_meal(&self, id: i64) -> Result<Meal> {
        self.conn
            .query_row(
                &format!("{MEAL_SELECT} WHERE m.id = ?1"),
                params![id],
                Self::meal_from_row,
            )
            .context("Meal not found")
    }

    pub fn meals_for_day(&self, day_id: i64) -> Result<Vec<Meal>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MEAL_SELECT} WHERE m.day_id = ?1 ORDER BY m.position, m.id"
        ))?;
        let meals = stmt
            .query_map(params![day_id], Self::meal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meals)
    }

    pub fn set_meal_recipe(&self, meal_id: i64, recipe_id: i64) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "UPDATE meals SET recipe_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![recipe_id, now, meal_id],
        )?;
        Ok(())
    }

    /// Sets or clears the eaten flag. Clearing also drops the timestamp and record ids.
    pub fn set_meal_eaten(
        &self,
        meal_id: i64,
        eaten_at: Option<&str>,
        health_record_ids: &[String],
    ) -> Result<Meal> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE meals SET is_eaten = ?1, eaten_at = ?2, health_record_ids = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                eaten_at.is_some(),
                eaten_at,
                serde_json::to_string(health_record_ids)?,
                now,
                meal_id,
            ],
        )?;
        if rows == 0 {
            anyhow::bail!("Meal not found");
        }
        self.get_meal(meal_id)
    }

    // --- Recipes and ingredients ---

    pub fn insert_recipe(&self, recipe: &NewRecipe) -> Result<i64> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO recipes (uuid, external_id, name, description, instructions,
                prep_time_min, cook_time_min, servings, complexity, cuisine, calories, protein_g,
                carbs_g, fat_g, image_url, source, is_custom, is_favorite, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, 0, ?18, ?19)",
            params![
                Uuid::new_v4().to_string(),
                recipe.external_id,
                recipe.name,
                recipe.description,
                serde_json::to_string(&recipe.instructions)?,
                recipe.prep_time_min,
                recipe.cook_time_min,
                recipe.servings,
                recipe.complexity.as_str(),
                recipe.cuisine.map(|c| c.as_str()),
                recipe.calories,
                recipe.protein_g,
                recipe.carbs_g,
                recipe.fat_g,
                recipe.image_url,
                recipe.source.as_str(),
                recipe.source == RecipeSource::Custom,
                now,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_recipe(&self, id: i64, recipe: &NewRecipe) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "UPDATE recipes SET name = ?1, description = ?2, instructions = ?3, prep_time_min = ?4,
                cook_time_min = ?5, servings = ?6, complexity = ?7, cuisine = ?8, calories = ?9,
                protein_g = ?10, carbs_g = ?11, fat_g = ?12, image_url = ?13, updated_at = ?14
             WHERE id = ?15",
            params![
                recipe.name,
                recipe.description,
                serde_json::to_string(&recipe.instructions)?,
                recipe.prep_time_min,
                recipe.cook_time_min,
                recipe.servings,
                recipe.complexity.as_str(),
                recipe.cuisine.map(|c| c.as_str()),
                recipe.calories,
                recipe.protein_g,
                recipe.carbs_g,
                recipe.fat_g,
                recipe.image_url,
                now,
                id,
            ],
        )?;
        Ok(())
    }

    /// Inserts a recipe together with its ingredient lines.
    pub fn insert_recipe_with_ingredients(
        &self,
        recipe: &NewRecipe,
        lines: &[NewIngredientLine],
    ) -> Result<Recipe> {
        let recipe_id = self.insert_recipe(recipe)?;
        self.add_ingredient_lines(recipe_id, lines)?;
        self.get_recipe(recipe_id)
    }

    /// Inserts or refreshes a recipe keyed by its external id. Returns the
    /// stored recipe and whether it was newly inserted.
    pub fn upsert_recipe_by_external_id(
        &self,
        recipe: &NewRecipe,
        lines: &[NewIngredientLine],
    ) -> Result<(Recipe, bool)> {
        let Some(external_id) = recipe.external_id.as_deref() else {
            return Ok((self.insert_recipe_with_ingredients(recipe, lines)?, true));
        };
        if let Some(existing) = self.get_recipe_by_external_id(external_id)? {
            self.update_recipe(existing.id, recipe)?;
            self.conn.execute(
                "DELETE FROM recipe_ingredients WHERE recipe_id = ?1",
                params![existing.id],
            )?;
            self.add_ingredient_lines(existing.id, lines)?;
            return Ok((self.get_recipe(existing.id)?, false));
        }
        Ok((self.insert_recipe_with_ingredients(recipe, lines)?, true))
    }

    fn add_ingredient_lines(&self, recipe_id: i64, lines: &[NewIngredientLine]) -> Result<()> {
        for line in lines {
            let ingredient_id = self.upsert_ingredient(&line.ingredient)?;
            self.add_recipe_ingredient(
                recipe_id,
                ingredient_id,
                line.quantity,
                line.unit,
                line.notes.as_deref(),
            )?;
        }
        Ok(())
    }

    /// Returns the id of the ingredient with the same normalized name, inserting it if new.
    pub fn upsert_ingredient(&self, ingredient: &NewIngredient) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO ingredients (name, normalized_name, category, default_unit)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(normalized_name) DO NOTHING",
            params![
                ingredient.name,
                ingredient.normalized_name,
                ingredient.category.as_str(),
                ingredient.default_unit.as_str(),
            ],
        )?;
        self.conn
            .query_row(
                "SELECT id FROM ingredients WHERE normalized_name = ?1",
                params![ingredient.normalized_name],
                |row| row.get(0),
            )
            .context("Ingredient not found")
    }

    pub fn add_recipe_ingredient(
        &self,
        recipe_id: i64,
        ingredient_id: i64,
        quantity: f64,
        unit: MeasurementUnit,
        notes: Option<&str>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, quantity, unit, notes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![recipe_id, ingredient_id, quantity, unit.as_str(), notes],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn ingredient_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM ingredients", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn get_recipe(&self, id: i64) -> Result<Recipe> {
        self.conn
            .query_row(
                &format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = ?1"),
                params![id],
                Self::recipe_from_row,
            )
            .context("Recipe not found")
    }

    pub fn get_recipe_by_external_id(&self, external_id: &str) -> Result<Option<Recipe>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE external_id = ?1"
        ))?;
        let mut rows = stmt.query(params![external_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::recipe_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn recipe_ingredients(&self, recipe_id: i64) -> Result<Vec<RecipeIngredient>> {
        let mut stmt = self.conn.prepare(
            "SELECT ri.id, ri.recipe_id, ri.ingredient_id, ri.quantity, ri.unit, ri.notes,
                    i.name, i.category
             FROM recipe_ingredients ri
             JOIN ingredients i ON ri.ingredient_id = i.id
             WHERE ri.recipe_id = ?1
             ORDER BY ri.id",
        )?;
        let items = stmt
            .query_map(params![recipe_id], |row| {
                Ok(RecipeIngredient {
                    id: row.get(0)?,
                    recipe_id: row.get(1)?,
                    ingredient_id: row.get(2)?,
                    quantity: row.get(3)?,
                    unit: text_col(row, 4)?,
                    notes: row.get(5)?,
                    ingredient_name: row.get(6)?,
                    category: text_col(row, 7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn get_recipe_detail(&self, id: i64) -> Result<RecipeDetail> {
        let recipe = self.get_recipe(id)?;
        let ingredients = self.recipe_ingredients(id)?;
        Ok(RecipeDetail {
            total_time_min: recipe.total_time_min(),
            recipe,
            ingredients,
        })
    }

    /// Recipes by name, optionally restricted to favorites and/or a name substring.
    pub fn list_recipes(&self, favorites_only: bool, search: Option<&str>) -> Result<Vec<Recipe>> {
        let pattern = search.map(|q| {
            let escaped = q
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        });
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes
             WHERE (?1 = 0 OR is_favorite = 1)
               AND (?2 IS NULL OR name LIKE ?2 ESCAPE '\\')
             ORDER BY name, id
             LIMIT 200"
        ))?;
        let recipes = stmt
            .query_map(params![favorites_only, pattern], Self::recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    pub fn set_recipe_favorite(&self, id: i64, favorite: bool) -> Result<Recipe> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE recipes SET is_favorite = ?1, updated_at = ?2 WHERE id = ?3",
            params![favorite, now, id],
        )?;
        if rows == 0 {
            anyhow::bail!("Recipe not found");
        }
        self.get_recipe(id)
    }

    pub fn delete_recipe(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Distinct names of the most recently planned recipes, newest first.
    pub fn recent_recipe_names(&self, limit: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.name
             FROM meals m
             JOIN recipes r ON m.recipe_id = r.id
             GROUP BY r.name
             ORDER BY MAX(m.created_at) DESC, MAX(m.id) DESC
             LIMIT ?1",
        )?;
        let names = stmt
            .query_map(params![limit], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Counts the recipes of one source that [`Self::delete_orphaned_recipes`] would remove.
    pub fn count_orphaned_recipes(&self, source: RecipeSource) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM recipes
             WHERE is_favorite = 0 AND source = ?1
               AND NOT EXISTS (SELECT 1 FROM meals m WHERE m.recipe_id = recipes.id)",
            params![source.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Deletes recipes that no meal references and that are not favorites.
    pub fn delete_orphaned_recipes(&self) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM recipes
             WHERE is_favorite = 0
               AND NOT EXISTS (SELECT 1 FROM meals m WHERE m.recipe_id = recipes.id)",
            [],
        )?;
        Ok(rows)
    }

    /// Inserts every record of a mapped generation response and returns the new plan id.
    pub fn insert_mapped_plan(&self, mapped: &MappedPlan) -> Result<i64> {
        let header = mapped
            .plan
            .as_ref()
            .context("Mapped plan is missing its header")?;
        let plan_id = self.insert_plan(header.week_start_date, header.plan_duration)?;

        let day_ids = mapped
            .days
            .iter()
            .map(|d| self.insert_day(plan_id, d.date))
            .collect::<Result<Vec<_>>>()?;
        let recipe_ids = mapped
            .recipes
            .iter()
            .map(|r| self.insert_recipe(r))
            .collect::<Result<Vec<_>>>()?;
        let ingredient_ids = mapped
            .ingredients
            .iter()
            .map(|i| self.upsert_ingredient(i))
            .collect::<Result<Vec<_>>>()?;

        for link in &mapped.recipe_ingredients {
            self.add_recipe_ingredient(
                recipe_ids[link.recipe],
                ingredient_ids[link.ingredient],
                link.quantity,
                link.unit,
                link.notes.as_deref(),
            )?;
        }
        for meal in &mapped.meals {
            self.insert_meal(
                day_ids[meal.day],
                meal.meal_type,
                meal.position,
                Some(recipe_ids[meal.recipe]),
            )?;
        }
        Ok(plan_id)
    }

    // --- Grocery ---

    pub fn create_grocery_list(&self, plan_id: Option<i64>) -> Result<i64> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO grocery_lists (uuid, plan_id, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![Uuid::new_v4().to_string(), plan_id, now, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn touch_grocery_list(&self, list_id: i64) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "UPDATE grocery_lists SET updated_at = ?1 WHERE id = ?2",
            params![now, list_id],
        )?;
        Ok(())
    }

    pub fn get_grocery_list(&self, id: i64) -> Result<GroceryList> {
        let (uuid, plan_id, created_at, updated_at): (String, Option<i64>, String, String) = self
            .conn
            .query_row(
                "SELECT uuid, plan_id, created_at, updated_at FROM grocery_lists WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .context("Grocery list not found")?;
        let mut stmt = self.conn.prepare(
            "SELECT id, list_id, ingredient_id, name, quantity, unit, category, is_checked, is_locked
             FROM grocery_items WHERE list_id = ?1
             ORDER BY category, name, id",
        )?;
        let items = stmt
            .query_map(params![id], Self::grocery_item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(GroceryList {
            id,
            uuid,
            plan_id,
            created_at,
            updated_at,
            items,
        })
    }

    pub fn get_grocery_item(&self, id: i64) -> Result<GroceryItem> {
        self.conn
            .query_row(
                "SELECT id, list_id, ingredient_id, name, quantity, unit, category, is_checked, is_locked
                 FROM grocery_items WHERE id = ?1",
                params![id],
                Self::grocery_item_from_row,
            )
            .context("Grocery item not found")
    }

    pub fn insert_grocery_item(&self, list_id: i64, item: &NewGroceryItem) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO grocery_items (list_id, ingredient_id, name, quantity, unit, category, is_checked, is_locked)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
            params![
                list_id,
                item.ingredient_id,
                item.name,
                item.quantity,
                item.unit.as_str(),
                item.category.as_str(),
                item.is_checked,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn delete_unlocked_grocery_items(&self, list_id: i64) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM grocery_items WHERE list_id = ?1 AND is_locked = 0",
            params![list_id],
        )?;
        Ok(rows)
    }

    pub fn set_grocery_item_flags(
        &self,
        id: i64,
        checked: Option<bool>,
        locked: Option<bool>,
    ) -> Result<GroceryItem> {
        let item = self.get_grocery_item(id)?;
        self.conn.execute(
            "UPDATE grocery_items SET is_checked = ?1, is_locked = ?2 WHERE id = ?3",
            params![
                checked.unwrap_or(item.is_checked),
                locked.unwrap_or(item.is_locked),
                id
            ],
        )?;
        self.touch_grocery_list(item.list_id)?;
        self.get_grocery_item(id)
    }

    /// Ingredient lines of every uneaten meal in the plan.
    pub fn planned_ingredients(&self, plan_id: i64) -> Result<Vec<PlannedIngredient>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.id, i.name, i.category, ri.quantity, ri.unit
             FROM days d
             JOIN meals m ON m.day_id = d.id
             JOIN recipe_ingredients ri ON ri.recipe_id = m.recipe_id
             JOIN ingredients i ON ri.ingredient_id = i.id
             WHERE d.plan_id = ?1 AND m.is_eaten = 0
             ORDER BY d.date, m.position, ri.id",
        )?;
        let lines = stmt
            .query_map(params![plan_id], |row| {
                Ok(PlannedIngredient {
                    ingredient_id: row.get(0)?,
                    name: row.get(1)?,
                    category: text_col(row, 2)?,
                    quantity: row.get(3)?,
                    unit: text_col(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    // --- User Settings ---

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO user_settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM user_settings WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM user_settings WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    // --- Reset ---

    /// Deletes every stored record, the profile included.
    pub fn reset_all(&self) -> Result<()> {
        self.in_transaction(|db| {
            db.conn.execute_batch(
                "DELETE FROM grocery_items;
                 DELETE FROM meals;
                 DELETE FROM days;
                 DELETE FROM meal_plans;
                 DELETE FROM grocery_lists;
                 DELETE FROM recipe_ingredients;
                 DELETE FROM recipes;
                 DELETE FROM ingredients;
                 DELETE FROM user_profile;
                 DELETE FROM user_settings;",
            )?;
            Ok(())
        })
    }
}
