//! Wire format of the plan generator and its mapping onto local records.
//!
//! The generator answers with loosely typed strings for enums. Mapping never
//! fails on an unrecognized value: it falls back to a default, logs a warning,
//! and records the substitution in [`UnmappedValue`] so callers can surface it.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::models::{
    Complexity, CuisineType, GroceryCategory, MealType, MeasurementUnit, NewIngredient,
    NewIngredientLine, NewRecipe, RecipeSource, normalize_ingredient_name,
};

// --- Wire types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub success: bool,
    #[serde(default)]
    pub meal_plan: Option<WeeklyPlanPayload>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResponse {
    pub success: bool,
    #[serde(default)]
    pub recipe: Option<RecipePayload>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyPlanPayload {
    pub days: Vec<DayPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPayload {
    /// Zero-based offset from the plan start, not a weekday.
    pub day_of_week: i64,
    pub meals: Vec<MealPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPayload {
    pub meal_type: String,
    pub recipe: RecipePayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipePayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub instructions: Vec<String>,
    pub prep_time: i64,
    pub cook_time: i64,
    pub servings: i64,
    #[serde(default)]
    pub complexity: String,
    #[serde(default)]
    pub cuisine_type: Option<String>,
    pub calories: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fat: i64,
    pub ingredients: Vec<IngredientPayload>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientPayload {
    pub name: String,
    pub quantity: Quantity,
    pub unit: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// The generator sends whole numbers as integers and fractions as floats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Integer(i64),
    Float(f64),
}

impl Quantity {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

// --- Decoding ---

/// Decode a plan generation body into its weekly plan payload.
pub fn decode_generation_response(body: &str) -> Result<WeeklyPlanPayload, GenerationError> {
    let response: GenerationResponse = serde_json::from_str(body)?;
    if !response.success {
        return Err(GenerationError::Server(
            response
                .error
                .unwrap_or_else(|| "Unknown server error".to_string()),
        ));
    }
    response.meal_plan.ok_or(GenerationError::InvalidResponse)
}

/// Decode a single-meal swap body into its recipe payload.
pub fn decode_swap_response(body: &str) -> Result<RecipePayload, GenerationError> {
    let response: SwapResponse = serde_json::from_str(body)?;
    if !response.success {
        return Err(GenerationError::Server(
            response
                .error
                .unwrap_or_else(|| "Unknown server error".to_string()),
        ));
    }
    response.recipe.ok_or(GenerationError::InvalidResponse)
}

// --- Mapped records ---

/// A wire value that did not match any known variant and was replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmappedValue {
    pub field: &'static str,
    pub value: String,
    pub fallback: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMealPlan {
    pub week_start_date: NaiveDate,
    pub plan_duration: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDay {
    pub date: NaiveDate,
}

/// Links `recipes[recipe]` to `ingredients[ingredient]` in a [`MappedPlan`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipeIngredient {
    pub recipe: usize,
    pub ingredient: usize,
    pub quantity: f64,
    pub unit: MeasurementUnit,
    pub notes: Option<String>,
}

/// Places `recipes[recipe]` into `days[day]` of a [`MappedPlan`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeal {
    pub day: usize,
    pub recipe: usize,
    pub meal_type: MealType,
    pub position: i64,
}

/// Flat, index-linked records built from one generation response, not yet persisted.
#[derive(Debug, Clone, Default)]
pub struct MappedPlan {
    pub plan: Option<NewMealPlan>,
    pub days: Vec<NewDay>,
    pub recipes: Vec<NewRecipe>,
    pub ingredients: Vec<NewIngredient>,
    pub recipe_ingredients: Vec<NewRecipeIngredient>,
    pub meals: Vec<NewMeal>,
    pub unmapped: Vec<UnmappedValue>,
}

#[derive(Debug, Clone)]
pub struct MappedRecipe {
    pub recipe: NewRecipe,
    pub ingredients: Vec<NewIngredientLine>,
    pub unmapped: Vec<UnmappedValue>,
}

// --- Mapping ---

#[derive(Default)]
struct Mapper {
    unmapped: Vec<UnmappedValue>,
}

impl Mapper {
    fn note(&mut self, field: &'static str, value: &str, fallback: &'static str) {
        tracing::warn!(field, value, fallback, "unrecognized value from generator");
        self.unmapped.push(UnmappedValue {
            field,
            value: value.to_string(),
            fallback,
        });
    }

    fn complexity(&mut self, raw: &str) -> Complexity {
        match raw.trim().to_lowercase().as_str() {
            "easy" => Complexity::Easy,
            "hard" => Complexity::Hard,
            "medium" => Complexity::Medium,
            _ => {
                self.note("complexity", raw, Complexity::Medium.as_str());
                Complexity::Medium
            }
        }
    }

    fn cuisine(&mut self, raw: Option<&str>) -> Option<CuisineType> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
        if let Ok(cuisine) = raw.parse() {
            Some(cuisine)
        } else {
            self.note("cuisineType", raw, "none");
            None
        }
    }

    fn category(&mut self, raw: &str) -> GroceryCategory {
        GroceryCategory::match_synonym(raw).unwrap_or_else(|| {
            self.note("category", raw, GroceryCategory::Other.as_str());
            GroceryCategory::Other
        })
    }

    fn unit(&mut self, raw: &str) -> MeasurementUnit {
        MeasurementUnit::match_synonym(raw).unwrap_or_else(|| {
            self.note("unit", raw, MeasurementUnit::Piece.as_str());
            MeasurementUnit::Piece
        })
    }

    fn meal_type(&mut self, raw: &str) -> MealType {
        raw.parse().unwrap_or_else(|_| {
            self.note("mealType", raw, MealType::Snack.as_str());
            MealType::Snack
        })
    }

    fn recipe(&mut self, payload: &RecipePayload, source: RecipeSource) -> NewRecipe {
        NewRecipe {
            external_id: None,
            name: payload.name.trim().to_string(),
            description: payload.description.clone(),
            instructions: payload.instructions.clone(),
            prep_time_min: payload.prep_time,
            cook_time_min: payload.cook_time,
            servings: payload.servings,
            complexity: self.complexity(&payload.complexity),
            cuisine: self.cuisine(payload.cuisine_type.as_deref()),
            calories: payload.calories,
            protein_g: payload.protein,
            carbs_g: payload.carbs,
            fat_g: payload.fat,
            image_url: payload.image_url.clone().filter(|u| !u.is_empty()),
            source,
        }
    }

    fn ingredient_line(&mut self, payload: &IngredientPayload) -> NewIngredientLine {
        let unit = self.unit(&payload.unit);
        NewIngredientLine {
            ingredient: NewIngredient {
                name: payload.name.trim().to_string(),
                normalized_name: normalize_ingredient_name(&payload.name),
                category: self.category(&payload.category),
                default_unit: unit,
            },
            quantity: payload.quantity.as_f64(),
            unit,
            notes: payload.notes.clone().filter(|n| !n.is_empty()),
        }
    }
}

/// Map a generated weekly plan onto new records.
///
/// Day dates are `start_date + dayOfWeek`. Ingredients are deduplicated by
/// normalized name across the whole payload; the first occurrence decides the
/// category and default unit. An offset that overflows the calendar fails
/// the whole mapping with [`GenerationError::DayOutOfRange`].
pub fn map_weekly_plan(
    payload: &WeeklyPlanPayload,
    start_date: NaiveDate,
    plan_duration: i64,
) -> Result<MappedPlan, GenerationError> {
    let mut mapper = Mapper::default();
    let mut mapped = MappedPlan {
        plan: Some(NewMealPlan {
            week_start_date: start_date,
            plan_duration,
        }),
        ..MappedPlan::default()
    };
    let mut ingredient_index: HashMap<String, usize> = HashMap::new();

    for day in &payload.days {
        let day_idx = mapped.days.len();
        let date = Duration::try_days(day.day_of_week)
            .and_then(|offset| start_date.checked_add_signed(offset))
            .ok_or(GenerationError::DayOutOfRange(day.day_of_week))?;
        mapped.days.push(NewDay { date });

        for (position, meal) in day.meals.iter().enumerate() {
            let recipe_idx = mapped.recipes.len();
            mapped
                .recipes
                .push(mapper.recipe(&meal.recipe, RecipeSource::Generated));

            for ing in &meal.recipe.ingredients {
                let line = mapper.ingredient_line(ing);
                let ingredient_idx = *ingredient_index
                    .entry(line.ingredient.normalized_name.clone())
                    .or_insert_with(|| {
                        mapped.ingredients.push(line.ingredient.clone());
                        mapped.ingredients.len() - 1
                    });
                mapped.recipe_ingredients.push(NewRecipeIngredient {
                    recipe: recipe_idx,
                    ingredient: ingredient_idx,
                    quantity: line.quantity,
                    unit: line.unit,
                    notes: line.notes,
                });
            }

            mapped.meals.push(NewMeal {
                day: day_idx,
                recipe: recipe_idx,
                meal_type: mapper.meal_type(&meal.meal_type),
                position: position as i64,
            });
        }
    }

    mapped.unmapped = mapper.unmapped;
    Ok(mapped)
}

/// Map one recipe payload (meal swap or catalog entry) onto new records.
#[must_use]
pub fn map_recipe(payload: &RecipePayload, source: RecipeSource) -> MappedRecipe {
    let mut mapper = Mapper::default();
    let recipe = mapper.recipe(payload, source);
    let ingredients = payload
        .ingredients
        .iter()
        .map(|ing| mapper.ingredient_line(ing))
        .collect();
    MappedRecipe {
        recipe,
        ingredients,
        unmapped: mapper.unmapped,
    }
}
