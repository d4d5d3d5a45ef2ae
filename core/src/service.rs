use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::catalog::{self, CatalogSource, CatalogSyncSummary};
use crate::db::Database;
use crate::error::{CatalogError, GenerationError};
use crate::grocery;
use crate::mapping::{
    UnmappedValue, decode_generation_response, decode_swap_response, map_recipe, map_weekly_plan,
};
use crate::models::{
    CuisinePreference, CuisineType, DaySummary, GroceryItem, GroceryList, MacroTargets,
    MacroTotals, Meal, MealPlan, NewIngredientLine, NewRecipe, PlanDetail, Recipe, RecipeDetail,
    RecipeSource, UserProfile, validate_profile,
};
use crate::reconcile::{self, SaveOutcome};
use crate::request::{MacroOverrides, build_plan_request, build_swap_request};
use crate::transport::PlanTransport;

/// How many recently planned recipe names are sent as exclusions.
pub const RECENT_RECIPE_LIMIT: i64 = 21;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub start_date: NaiveDate,
    pub duration: i64,
    pub weekly_preferences: Option<String>,
    pub overrides: MacroOverrides,
    pub excluded_recipes: Vec<String>,
}

impl GenerateOptions {
    #[must_use]
    pub fn new(start_date: NaiveDate, duration: i64) -> Self {
        Self {
            start_date,
            duration,
            weekly_preferences: None,
            overrides: MacroOverrides::default(),
            excluded_recipes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedPlan {
    pub plan: PlanDetail,
    pub outcome: SaveOutcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmapped: Vec<UnmappedValue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwappedMeal {
    pub meal: Meal,
    pub recipe: Recipe,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmapped: Vec<UnmappedValue>,
}

/// Merge exclusion lists, keeping first occurrences and dropping blanks.
fn merge_exclusions(lists: &[&[String]]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    lists
        .iter()
        .flat_map(|l| l.iter())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Entry point shared by the CLI and the REST server.
///
/// Storage sits behind a `std::sync::Mutex` that is never held across an
/// await. Plan generation and meal swaps additionally take an async lock so
/// only one write sequence runs at a time.
pub struct PlannerService {
    db: Mutex<Database>,
    generation: tokio::sync::Mutex<()>,
}

impl PlannerService {
    pub fn new(db_path: &Path) -> Result<Self> {
        Ok(Self::from_database(Database::open(db_path)?))
    }

    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory()?))
    }

    fn from_database(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            generation: tokio::sync::Mutex::new(()),
        }
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Profile ---

    pub fn get_profile(&self) -> Result<Option<UserProfile>> {
        self.db().get_profile()
    }

    pub fn save_profile(&self, profile: &UserProfile) -> Result<UserProfile> {
        validate_profile(profile)?;
        self.db().save_profile(profile)
    }

    /// Tag a cuisine as liked, disliked or neutral in the stored profile.
    pub fn set_cuisine_preference(
        &self,
        cuisine: &str,
        preference: CuisinePreference,
    ) -> Result<UserProfile> {
        let cuisine: CuisineType = cuisine.parse()?;
        let db = self.db();
        let Some(mut profile) = db.get_profile()? else {
            bail!("No profile found. Run `plateplan profile set` first");
        };
        profile
            .cuisine_preferences
            .insert(cuisine.as_str().to_string(), preference);
        db.save_profile(&profile)
    }

    pub fn macro_targets(&self) -> Result<Option<MacroTargets>> {
        Ok(self.db().get_profile()?.map(|p| p.macro_targets()))
    }

    // --- Generation ---

    /// True while a generate or swap sequence holds the write lock.
    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.generation.try_lock().is_err()
    }

    /// Request a new plan, then insert, reconcile and clean up in one transaction.
    ///
    /// Nothing is written unless every step succeeds. Waits for any running
    /// generation or swap to finish first.
    pub async fn generate_plan(
        &self,
        transport: &dyn PlanTransport,
        options: &GenerateOptions,
    ) -> Result<GeneratedPlan, GenerationError> {
        let _guard = self.generation.lock().await;
        self.generate_locked(transport, options).await
    }

    /// Like [`generate_plan`](Self::generate_plan), but fails with
    /// [`GenerationError::InProgress`] instead of waiting when another
    /// generation or swap holds the lock.
    pub async fn try_generate_plan(
        &self,
        transport: &dyn PlanTransport,
        options: &GenerateOptions,
    ) -> Result<GeneratedPlan, GenerationError> {
        let _guard = self
            .generation
            .try_lock()
            .map_err(|_| GenerationError::InProgress)?;
        self.generate_locked(transport, options).await
    }

    async fn generate_locked(
        &self,
        transport: &dyn PlanTransport,
        options: &GenerateOptions,
    ) -> Result<GeneratedPlan, GenerationError> {
        let (profile, recent) = {
            let db = self.db();
            let profile = db.get_profile()?.ok_or(GenerationError::MissingProfile)?;
            (profile, db.recent_recipe_names(RECENT_RECIPE_LIMIT)?)
        };
        let request = build_plan_request(
            &profile,
            &options.overrides,
            options.weekly_preferences.as_deref(),
            merge_exclusions(&[options.excluded_recipes.as_slice(), recent.as_slice()]),
            options.duration,
            options.start_date,
        );

        tracing::info!(
            start = %options.start_date,
            duration = options.duration,
            excluded = request.excluded_recipes.len(),
            "requesting meal plan"
        );
        let body = transport.request_plan(&request).await?;
        let payload = decode_generation_response(&body)?;
        let mapped = map_weekly_plan(&payload, options.start_date, options.duration)?;

        let db = self.db();
        let outcome = reconcile::save_generated_plan(&db, &mapped)?;
        let plan = db.get_plan_detail(outcome.plan_id)?;
        tracing::info!(
            plan_id = outcome.plan_id,
            days = plan.days.len(),
            moved = outcome.reconcile.moved_days,
            orphans = outcome.orphans_removed,
            "saved meal plan"
        );
        Ok(GeneratedPlan {
            plan,
            outcome,
            unmapped: mapped.unmapped,
        })
    }

    /// Replace one meal's recipe with a freshly generated one. Other plans are not touched.
    pub async fn replace_meal(
        &self,
        transport: &dyn PlanTransport,
        meal_id: i64,
        excluded_recipes: &[String],
    ) -> Result<SwappedMeal, GenerationError> {
        let _guard = self.generation.lock().await;

        let (profile, meal, recent) = {
            let db = self.db();
            let profile = db.get_profile()?.ok_or(GenerationError::MissingProfile)?;
            let meal = db
                .get_meal(meal_id)
                .map_err(|_| GenerationError::MealNotFound(meal_id))?;
            (profile, meal, db.recent_recipe_names(RECENT_RECIPE_LIMIT)?)
        };
        let current: Vec<String> = meal.recipe_name.iter().cloned().collect();
        let request = build_swap_request(
            &profile,
            &MacroOverrides::default(),
            meal.meal_type,
            merge_exclusions(&[excluded_recipes, current.as_slice(), recent.as_slice()]),
        );

        let body = transport.request_swap(&request).await?;
        let payload = decode_swap_response(&body)?;
        let mapped = map_recipe(&payload, RecipeSource::Generated);

        let db = self.db();
        let recipe = db.in_transaction(|db| {
            let recipe = db.insert_recipe_with_ingredients(&mapped.recipe, &mapped.ingredients)?;
            db.set_meal_recipe(meal_id, recipe.id)?;
            Ok(recipe)
        })?;
        let meal = db.get_meal(meal_id)?;
        tracing::info!(meal_id, recipe = %recipe.name, "swapped meal");
        Ok(SwappedMeal {
            meal,
            recipe,
            unmapped: mapped.unmapped,
        })
    }

    // --- Plans ---

    pub fn list_plans(&self) -> Result<Vec<MealPlan>> {
        self.db().list_plans()
    }

    pub fn get_plan_detail(&self, plan_id: i64) -> Result<PlanDetail> {
        self.db().get_plan_detail(plan_id)
    }

    /// The newest active plan with its days and meals.
    pub fn active_plan(&self) -> Result<Option<PlanDetail>> {
        let db = self.db();
        db.latest_active_plan()?
            .map(|plan| db.get_plan_detail(plan.id))
            .transpose()
    }

    // --- Meal tracking ---

    pub fn get_meal(&self, meal_id: i64) -> Result<Meal> {
        self.db().get_meal(meal_id)
    }

    /// Mark a meal eaten. `eaten_at` defaults to now.
    pub fn mark_meal_eaten(
        &self,
        meal_id: i64,
        eaten_at: Option<&str>,
        health_record_ids: &[String],
    ) -> Result<Meal> {
        let now = Local::now().to_rfc3339();
        self.db()
            .set_meal_eaten(meal_id, Some(eaten_at.unwrap_or(&now)), health_record_ids)
    }

    pub fn unmark_meal_eaten(&self, meal_id: i64) -> Result<Meal> {
        self.db().set_meal_eaten(meal_id, None, &[])
    }

    /// Planned versus eaten macros for one date, with the profile's targets.
    pub fn day_summary(&self, date: NaiveDate) -> Result<DaySummary> {
        let db = self.db();
        let target = db.get_profile()?.map(|p| p.macro_targets());
        let mut summary = DaySummary {
            date,
            plan_id: None,
            meals: Vec::new(),
            planned: MacroTotals::default(),
            eaten: MacroTotals::default(),
            target,
        };
        let Some(day) = db.day_for_date(date)? else {
            return Ok(summary);
        };
        summary.plan_id = Some(day.plan_id);
        summary.meals = db.meals_for_day(day.id)?;
        for meal in &summary.meals {
            summary.planned.add_meal(meal);
            if meal.is_eaten {
                summary.eaten.add_meal(meal);
            }
        }
        Ok(summary)
    }

    // --- Recipes ---

    pub fn create_custom_recipe(
        &self,
        recipe: &NewRecipe,
        ingredients: &[NewIngredientLine],
    ) -> Result<RecipeDetail> {
        if recipe.name.trim().is_empty() {
            bail!("Recipe name must not be empty");
        }
        let recipe = NewRecipe {
            name: recipe.name.trim().to_string(),
            external_id: None,
            source: RecipeSource::Custom,
            ..recipe.clone()
        };
        let db = self.db();
        let created =
            db.in_transaction(|db| db.insert_recipe_with_ingredients(&recipe, ingredients))?;
        db.get_recipe_detail(created.id)
    }

    pub fn list_recipes(&self, favorites_only: bool, search: Option<&str>) -> Result<Vec<Recipe>> {
        self.db().list_recipes(favorites_only, search)
    }

    pub fn get_recipe_detail(&self, recipe_id: i64) -> Result<RecipeDetail> {
        self.db().get_recipe_detail(recipe_id)
    }

    pub fn set_recipe_favorite(&self, recipe_id: i64, favorite: bool) -> Result<Recipe> {
        self.db().set_recipe_favorite(recipe_id, favorite)
    }

    pub fn delete_recipe(&self, recipe_id: i64) -> Result<bool> {
        self.db().delete_recipe(recipe_id)
    }

    // --- Grocery ---

    pub fn build_grocery_list(&self, plan_id: i64) -> Result<GroceryList> {
        grocery::build_grocery_list(&self.db(), plan_id)
    }

    pub fn grocery_list(&self, plan_id: i64) -> Result<Option<GroceryList>> {
        grocery::grocery_list_for_plan(&self.db(), plan_id)
    }

    pub fn set_grocery_item_checked(&self, item_id: i64, checked: bool) -> Result<GroceryItem> {
        self.db().set_grocery_item_flags(item_id, Some(checked), None)
    }

    pub fn set_grocery_item_locked(&self, item_id: i64, locked: bool) -> Result<GroceryItem> {
        self.db().set_grocery_item_flags(item_id, None, Some(locked))
    }

    /// Set either flag; `None` keeps the stored value.
    pub fn update_grocery_item(
        &self,
        item_id: i64,
        checked: Option<bool>,
        locked: Option<bool>,
    ) -> Result<GroceryItem> {
        self.db().set_grocery_item_flags(item_id, checked, locked)
    }

    // --- Catalog ---

    pub async fn sync_catalog(
        &self,
        source: &dyn CatalogSource,
        page_size: usize,
        max_pages: usize,
    ) -> Result<CatalogSyncSummary, CatalogError> {
        catalog::sync_catalog(&self.db, source, page_size, max_pages).await
    }

    pub async fn search_catalog(
        &self,
        source: &dyn CatalogSource,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Recipe>, CatalogError> {
        catalog::search_catalog(&self.db, source, query, limit).await
    }

    pub fn reset_catalog_cursor(&self) -> Result<bool> {
        catalog::reset_catalog_cursor(&self.db())
    }

    // --- Reset ---

    /// Delete every stored record, the profile included.
    pub fn reset_all_data(&self) -> Result<()> {
        self.db().reset_all()?;
        tracing::warn!("all local data deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Complexity, GroceryCategory, MeasurementUnit, NewIngredient, normalize_ingredient_name,
    };
    use crate::transport::MockTransport;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn service_with_profile() -> PlannerService {
        let svc = PlannerService::new_in_memory().unwrap();
        svc.save_profile(&UserProfile::default()).unwrap();
        svc
    }

    #[tokio::test]
    async fn test_generate_plan_end_to_end() {
        let svc = service_with_profile();
        let result = svc
            .generate_plan(&MockTransport::new(), &GenerateOptions::new(date(5), 7))
            .await
            .unwrap();

        assert_eq!(result.plan.days.len(), 7);
        assert_eq!(result.plan.days[0].day.date, date(5));
        assert_eq!(result.plan.days[6].day.date, date(11));
        assert!(result.plan.days.iter().all(|d| d.meals.len() == 3));
        assert!(result.plan.plan.is_active);
        assert_eq!(result.plan.end_date, date(11));
        assert!(result.unmapped.is_empty());
        assert!(!svc.is_generating());
    }

    #[tokio::test]
    async fn test_generate_requires_profile() {
        let svc = PlannerService::new_in_memory().unwrap();
        let err = svc
            .generate_plan(&MockTransport::new(), &GenerateOptions::new(date(5), 7))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::MissingProfile));
    }

    #[tokio::test]
    async fn test_server_failure_writes_nothing() {
        let svc = service_with_profile();
        let err = svc
            .generate_plan(
                &MockTransport::failing("rate limited"),
                &GenerateOptions::new(date(5), 7),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "rate limited");
        assert!(svc.list_plans().unwrap().is_empty());
        assert!(svc.list_recipes(false, None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_regeneration_reconciles_older_plan() {
        let svc = service_with_profile();
        let mock = MockTransport::new();
        let first = svc
            .generate_plan(&mock, &GenerateOptions::new(date(5), 7))
            .await
            .unwrap();
        let first_day = first.plan.days[0].day.id;
        let first_meal = first.plan.days[0].meals[0].id;
        svc.mark_meal_eaten(first_meal, None, &[]).unwrap();

        let second = svc
            .generate_plan(&mock, &GenerateOptions::new(date(6), 7))
            .await
            .unwrap();

        assert_eq!(second.outcome.reconcile.moved_days, 1);
        assert_eq!(second.plan.plan.week_start_date, date(5));
        assert_eq!(second.plan.plan.plan_duration, 8);
        assert_eq!(second.plan.days[0].day.id, first_day);
        // the tracked meal came along with its day
        assert!(second.plan.days[0].meals[0].is_eaten);

        let old = svc.get_plan_detail(first.plan.plan.id).unwrap();
        assert!(!old.plan.is_active);
        assert_eq!(old.days.len(), 6);
        assert_eq!(
            svc.active_plan().unwrap().unwrap().plan.id,
            second.plan.plan.id
        );
    }

    #[tokio::test]
    async fn test_replace_meal_relinks_and_orphan_is_cleaned_later() {
        let svc = service_with_profile();
        let mock = MockTransport::new();
        let generated = svc
            .generate_plan(&mock, &GenerateOptions::new(date(5), 1))
            .await
            .unwrap();
        let meal = &generated.plan.days[0].meals[2];
        let old_recipe = meal.recipe_id.unwrap();

        let swapped = svc.replace_meal(&mock, meal.id, &[]).await.unwrap();
        assert_ne!(swapped.recipe.id, old_recipe);
        assert_ne!(Some(swapped.recipe.name.clone()), meal.recipe_name);
        assert_eq!(swapped.meal.recipe_id, Some(swapped.recipe.id));
        // still present until the next regeneration
        assert!(svc.get_recipe_detail(old_recipe).is_ok());

        svc.generate_plan(&mock, &GenerateOptions::new(date(12), 1))
            .await
            .unwrap();
        assert!(svc.get_recipe_detail(old_recipe).is_err());
    }

    #[tokio::test]
    async fn test_favorite_survives_orphan_cleanup() {
        let svc = service_with_profile();
        let mock = MockTransport::new();
        let generated = svc
            .generate_plan(&mock, &GenerateOptions::new(date(5), 1))
            .await
            .unwrap();
        let meal = &generated.plan.days[0].meals[0];
        let old_recipe = meal.recipe_id.unwrap();
        svc.set_recipe_favorite(old_recipe, true).unwrap();
        svc.replace_meal(&mock, meal.id, &[]).await.unwrap();

        svc.generate_plan(&mock, &GenerateOptions::new(date(12), 1))
            .await
            .unwrap();
        assert!(svc.get_recipe_detail(old_recipe).unwrap().recipe.is_favorite);
    }

    #[tokio::test]
    async fn test_replace_missing_meal() {
        let svc = service_with_profile();
        let err = svc
            .replace_meal(&MockTransport::new(), 404, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::MealNotFound(404)));
    }

    #[tokio::test]
    async fn test_is_generating_while_locked() {
        let svc = PlannerService::new_in_memory().unwrap();
        assert!(!svc.is_generating());
        let _guard = svc.generation.lock().await;
        assert!(svc.is_generating());
    }

    #[tokio::test]
    async fn test_try_generate_fails_fast_while_locked() {
        let svc = service_with_profile();
        let guard = svc.generation.lock().await;
        let err = svc
            .try_generate_plan(&MockTransport::new(), &GenerateOptions::new(date(5), 3))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::InProgress));
        assert!(svc.list_plans().unwrap().is_empty());

        drop(guard);
        let generated = svc
            .try_generate_plan(&MockTransport::new(), &GenerateOptions::new(date(5), 3))
            .await
            .unwrap();
        assert_eq!(generated.plan.days.len(), 3);
    }

    #[tokio::test]
    async fn test_huge_day_offset_writes_nothing() {
        struct FarFuture;

        #[async_trait::async_trait]
        impl PlanTransport for FarFuture {
            async fn request_plan(
                &self,
                _request: &crate::request::GenerationRequest,
            ) -> Result<String, GenerationError> {
                Ok(r#"{"success":true,"mealPlan":{"days":[{"dayOfWeek":100000000000,"meals":[]}]}}"#
                    .to_string())
            }

            async fn request_swap(
                &self,
                _request: &crate::request::SwapRequest,
            ) -> Result<String, GenerationError> {
                Ok(r#"{"success":false}"#.to_string())
            }
        }

        let svc = service_with_profile();
        let err = svc
            .generate_plan(&FarFuture, &GenerateOptions::new(date(5), 7))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::DayOutOfRange(_)));
        assert!(svc.list_plans().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generation_cleanup_lets_catalog_resync() {
        use crate::catalog::{CatalogPage, CatalogRecipe};

        struct OneRecipe;

        #[async_trait::async_trait]
        impl CatalogSource for OneRecipe {
            async fn fetch_page(
                &self,
                after: Option<&str>,
                _limit: usize,
            ) -> Result<CatalogPage, CatalogError> {
                if after.is_some() {
                    return Ok(CatalogPage::default());
                }
                let recipe = serde_json::from_value(serde_json::json!({
                    "name": "Catalog Curry",
                    "instructions": ["Simmer"],
                    "prepTime": 10,
                    "cookTime": 20,
                    "servings": 2,
                    "complexity": "easy",
                    "calories": 500,
                    "protein": 20,
                    "carbs": 60,
                    "fat": 15,
                    "ingredients": []
                }))
                .unwrap();
                Ok(CatalogPage {
                    recipes: vec![CatalogRecipe {
                        id: "c1".to_string(),
                        recipe,
                    }],
                    next_cursor: Some("c1".to_string()),
                })
            }

            async fn search_prefix(
                &self,
                _query: &str,
                _limit: usize,
            ) -> Result<Vec<CatalogRecipe>, CatalogError> {
                Ok(Vec::new())
            }

            async fn search_scan(
                &self,
                _query: &str,
                _limit: usize,
            ) -> Result<Vec<CatalogRecipe>, CatalogError> {
                Ok(Vec::new())
            }
        }

        let svc = service_with_profile();
        assert_eq!(svc.sync_catalog(&OneRecipe, 10, 5).await.unwrap().inserted, 1);

        let generated = svc
            .generate_plan(&MockTransport::new(), &GenerateOptions::new(date(5), 2))
            .await
            .unwrap();
        assert!(generated.outcome.catalog_cursor_reset);
        let catalog_rows = |svc: &PlannerService| {
            svc.list_recipes(false, None)
                .unwrap()
                .into_iter()
                .filter(|r| r.source == RecipeSource::Catalog)
                .count()
        };
        assert_eq!(catalog_rows(&svc), 0);

        let resync = svc.sync_catalog(&OneRecipe, 10, 5).await.unwrap();
        assert_eq!(resync.inserted, 1);
        assert_eq!(catalog_rows(&svc), 1);
    }

    #[tokio::test]
    async fn test_day_summary_planned_and_eaten() {
        let svc = service_with_profile();
        let generated = svc
            .generate_plan(&MockTransport::new(), &GenerateOptions::new(date(5), 2))
            .await
            .unwrap();
        let meals = &generated.plan.days[0].meals;
        svc.mark_meal_eaten(meals[0].id, None, &["hk-42".to_string()])
            .unwrap();

        let summary = svc.day_summary(date(5)).unwrap();
        assert_eq!(summary.plan_id, Some(generated.plan.plan.id));
        assert_eq!(summary.meals.len(), 3);
        let planned: i64 = meals.iter().filter_map(|m| m.calories).sum();
        assert_eq!(summary.planned.calories, planned);
        assert_eq!(summary.eaten.calories, meals[0].calories.unwrap());
        assert!(summary.target.is_some());

        svc.unmark_meal_eaten(meals[0].id).unwrap();
        assert_eq!(svc.day_summary(date(5)).unwrap().eaten.calories, 0);

        let empty = svc.day_summary(date(20)).unwrap();
        assert!(empty.plan_id.is_none());
        assert!(empty.meals.is_empty());
    }

    #[test]
    fn test_custom_recipe_and_favorites() {
        let svc = PlannerService::new_in_memory().unwrap();
        let detail = svc
            .create_custom_recipe(
                &NewRecipe {
                    external_id: Some("ignored".to_string()),
                    name: "  Grandma's Chili ".to_string(),
                    description: String::new(),
                    instructions: vec!["Simmer".to_string()],
                    prep_time_min: 15,
                    cook_time_min: 90,
                    servings: 6,
                    complexity: Complexity::Medium,
                    cuisine: None,
                    calories: 520,
                    protein_g: 34,
                    carbs_g: 40,
                    fat_g: 22,
                    image_url: None,
                    source: RecipeSource::Generated,
                },
                &[NewIngredientLine {
                    ingredient: NewIngredient {
                        name: "Kidney Beans".to_string(),
                        normalized_name: normalize_ingredient_name("Kidney Beans"),
                        category: GroceryCategory::Pantry,
                        default_unit: MeasurementUnit::Can,
                    },
                    quantity: 2.0,
                    unit: MeasurementUnit::Can,
                    notes: Some("drained".to_string()),
                }],
            )
            .unwrap();
        assert_eq!(detail.recipe.name, "Grandma's Chili");
        assert!(detail.recipe.is_custom);
        assert_eq!(detail.recipe.source, RecipeSource::Custom);
        assert!(detail.recipe.external_id.is_none());
        assert_eq!(detail.total_time_min, 105);
        assert_eq!(detail.ingredients[0].notes.as_deref(), Some("drained"));

        assert!(svc.list_recipes(true, None).unwrap().is_empty());
        svc.set_recipe_favorite(detail.recipe.id, true).unwrap();
        assert_eq!(svc.list_recipes(true, None).unwrap().len(), 1);
        assert!(svc.delete_recipe(detail.recipe.id).unwrap());
    }

    #[test]
    fn test_cuisine_preference() {
        let svc = PlannerService::new_in_memory().unwrap();
        assert!(
            svc.set_cuisine_preference("thai", CuisinePreference::Like)
                .is_err()
        );
        svc.save_profile(&UserProfile::default()).unwrap();
        let profile = svc
            .set_cuisine_preference("Middle Eastern", CuisinePreference::Dislike)
            .unwrap();
        assert_eq!(
            profile.cuisine_preferences.get("middle_eastern"),
            Some(&CuisinePreference::Dislike)
        );
        assert!(
            svc.set_cuisine_preference("martian", CuisinePreference::Like)
                .is_err()
        );
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let svc = PlannerService::new_in_memory().unwrap();
        let bad = UserProfile {
            age: 0,
            ..UserProfile::default()
        };
        assert!(svc.save_profile(&bad).is_err());
        assert!(svc.get_profile().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset_all_data() {
        let svc = service_with_profile();
        svc.generate_plan(&MockTransport::new(), &GenerateOptions::new(date(5), 3))
            .await
            .unwrap();
        svc.reset_all_data().unwrap();
        assert!(svc.get_profile().unwrap().is_none());
        assert!(svc.list_plans().unwrap().is_empty());
        assert!(svc.active_plan().unwrap().is_none());
    }

    #[test]
    fn test_merge_exclusions() {
        let a = vec!["Oats".to_string(), " ".to_string()];
        let b = vec!["oats".to_string(), "Soup".to_string()];
        assert_eq!(merge_exclusions(&[a.as_slice(), b.as_slice()]), vec!["Oats", "Soup"]);
    }
}
