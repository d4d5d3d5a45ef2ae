use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Lowercases and trims a free-form key, folding spaces and hyphens to underscores.
fn normalize_key(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Declares a closed set of values stored as text in the database and on the wire.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self> {
                let key = normalize_key(s);
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == key)
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "Invalid {} '{s}'. Must be one of: {}",
                            stringify!($name),
                            Self::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
                        )
                    })
            }
        }
    };
}

text_enum!(MealType {
    Breakfast => "breakfast",
    Lunch => "lunch",
    Dinner => "dinner",
    Snack => "snack",
});

text_enum!(Complexity {
    Easy => "easy",
    Medium => "medium",
    Hard => "hard",
});

text_enum!(CuisineType {
    American => "american",
    Italian => "italian",
    Mexican => "mexican",
    Chinese => "chinese",
    Japanese => "japanese",
    Indian => "indian",
    Thai => "thai",
    French => "french",
    Mediterranean => "mediterranean",
    Greek => "greek",
    Korean => "korean",
    Vietnamese => "vietnamese",
    MiddleEastern => "middle_eastern",
    Spanish => "spanish",
    Caribbean => "caribbean",
    Fusion => "fusion",
});

text_enum!(GroceryCategory {
    Produce => "produce",
    MeatSeafood => "meat_seafood",
    DairyEggs => "dairy_eggs",
    Bakery => "bakery",
    Pantry => "pantry",
    Frozen => "frozen",
    Beverages => "beverages",
    Spices => "spices",
    Other => "other",
});

text_enum!(MeasurementUnit {
    Gram => "gram",
    Kilogram => "kilogram",
    Milliliter => "milliliter",
    Liter => "liter",
    Teaspoon => "teaspoon",
    Tablespoon => "tablespoon",
    Cup => "cup",
    Ounce => "ounce",
    Pound => "pound",
    Piece => "piece",
    Slice => "slice",
    Clove => "clove",
    Pinch => "pinch",
    Can => "can",
    Bunch => "bunch",
});

text_enum!(RecipeSource {
    Generated => "generated",
    Catalog => "catalog",
    Custom => "custom",
});

text_enum!(Sex {
    Male => "male",
    Female => "female",
});

text_enum!(ActivityLevel {
    Sedentary => "sedentary",
    Light => "light",
    Moderate => "moderate",
    Active => "active",
    VeryActive => "very_active",
});

text_enum!(Goal {
    Lose => "lose",
    Maintain => "maintain",
    Gain => "gain",
});

text_enum!(CookingSkill {
    Beginner => "beginner",
    Intermediate => "intermediate",
    Advanced => "advanced",
});

text_enum!(PantryLevel {
    Minimal => "minimal",
    Average => "average",
    WellStocked => "well_stocked",
});

text_enum!(CuisinePreference {
    Like => "like",
    Dislike => "dislike",
    Neutral => "neutral",
});

impl GroceryCategory {
    /// Matches the loose category names the generator emits.
    #[must_use]
    pub fn match_synonym(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "produce" | "vegetables" | "vegetable" | "fruit" | "fruits" | "fruits & vegetables"
            | "fresh produce" => Some(Self::Produce),
            "meat" | "seafood" | "meat & seafood" | "meat and seafood" | "meat_seafood"
            | "poultry" | "fish" | "protein" => Some(Self::MeatSeafood),
            "dairy" | "eggs" | "dairy & eggs" | "dairy and eggs" | "dairy_eggs" | "cheese" => {
                Some(Self::DairyEggs)
            }
            "bakery" | "bread" | "baked goods" => Some(Self::Bakery),
            "pantry" | "grains" | "pasta & grains" | "canned goods" | "dry goods" | "baking"
            | "condiments" | "oils" | "nuts & seeds" => Some(Self::Pantry),
            "frozen" | "frozen foods" => Some(Self::Frozen),
            "beverages" | "drinks" => Some(Self::Beverages),
            "spices" | "spices & seasonings" | "herbs & spices" | "seasonings" | "herbs" => {
                Some(Self::Spices)
            }
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Produce => "Produce",
            Self::MeatSeafood => "Meat & Seafood",
            Self::DairyEggs => "Dairy & Eggs",
            Self::Bakery => "Bakery",
            Self::Pantry => "Pantry",
            Self::Frozen => "Frozen",
            Self::Beverages => "Beverages",
            Self::Spices => "Spices & Seasonings",
            Self::Other => "Other",
        }
    }
}

impl MeasurementUnit {
    /// Matches common unit spellings and abbreviations.
    #[must_use]
    pub fn match_synonym(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_lowercase();
        match lower.as_str() {
            "g" | "gram" | "grams" => Some(Self::Gram),
            "kg" | "kilogram" | "kilograms" => Some(Self::Kilogram),
            "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => {
                Some(Self::Milliliter)
            }
            "l" | "liter" | "liters" | "litre" | "litres" => Some(Self::Liter),
            "tsp" | "teaspoon" | "teaspoons" => Some(Self::Teaspoon),
            "tbsp" | "tablespoon" | "tablespoons" => Some(Self::Tablespoon),
            "cup" | "cups" => Some(Self::Cup),
            "oz" | "ounce" | "ounces" => Some(Self::Ounce),
            "lb" | "lbs" | "pound" | "pounds" => Some(Self::Pound),
            "piece" | "pieces" | "pc" | "pcs" | "whole" | "item" | "items" | "unit" | "units" => {
                Some(Self::Piece)
            }
            "slice" | "slices" => Some(Self::Slice),
            "clove" | "cloves" => Some(Self::Clove),
            "pinch" | "pinches" => Some(Self::Pinch),
            "can" | "cans" => Some(Self::Can),
            "bunch" | "bunches" => Some(Self::Bunch),
            _ => None,
        }
    }

    /// Converts mass and volume quantities to grams or milliliters so the same
    /// ingredient listed as "1 kg" and "200 g" can be summed. Other units pass through.
    #[must_use]
    pub fn to_base(self, quantity: f64) -> (f64, MeasurementUnit) {
        match self {
            Self::Kilogram => (quantity * 1000.0, Self::Gram),
            Self::Pound => (quantity * 454.0, Self::Gram),
            Self::Ounce => (quantity * 28.35, Self::Gram),
            Self::Liter => (quantity * 1000.0, Self::Milliliter),
            other => (quantity, other),
        }
    }
}

impl ActivityLevel {
    #[must_use]
    pub fn factor(self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::Light => 1.375,
            Self::Moderate => 1.55,
            Self::Active => 1.725,
            Self::VeryActive => 1.9,
        }
    }
}

impl Goal {
    #[must_use]
    pub fn calorie_adjustment(self) -> f64 {
        match self {
            Self::Lose => -500.0,
            Self::Maintain => 0.0,
            Self::Gain => 300.0,
        }
    }
}

/// Normalized form used to deduplicate ingredients: trimmed, lowercased, single-spaced.
#[must_use]
pub fn normalize_ingredient_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn validate_meal_type(meal: &str) -> Result<MealType> {
    meal.parse()
}

// --- Profile ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroTargets {
    pub calories: i64,
    pub protein_g: i64,
    pub carbs_g: i64,
    pub fat_g: i64,
}

impl MacroTargets {
    /// Splits a calorie budget 30/40/30 across protein, carbs and fat.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_calories(calories: i64) -> Self {
        let cal = calories as f64;
        Self {
            calories,
            protein_g: (cal * 30.0 / 100.0 / 4.0).round() as i64,
            carbs_g: (cal * 40.0 / 100.0 / 4.0).round() as i64,
            fat_g: (cal * 30.0 / 100.0 / 9.0).round() as i64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub age: i64,
    pub sex: Sex,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub activity_level: ActivityLevel,
    pub goal: Goal,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub dislikes: Vec<String>,
    #[serde(default)]
    pub cuisine_preferences: HashMap<String, CuisinePreference>,
    pub cooking_skill: CookingSkill,
    pub max_cooking_time_min: i64,
    pub pantry_level: PantryLevel,
    #[serde(default)]
    pub updated_at: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            age: 30,
            sex: Sex::Female,
            weight_kg: 70.0,
            height_cm: 170.0,
            activity_level: ActivityLevel::Moderate,
            goal: Goal::Maintain,
            dietary_restrictions: Vec::new(),
            allergies: Vec::new(),
            dislikes: Vec::new(),
            cuisine_preferences: HashMap::new(),
            cooking_skill: CookingSkill::Intermediate,
            max_cooking_time_min: 45,
            pantry_level: PantryLevel::Average,
            updated_at: String::new(),
        }
    }
}

impl UserProfile {
    /// Mifflin-St Jeor resting energy expenditure in kcal.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bmr(&self) -> f64 {
        let base = 10.0 * self.weight_kg + 6.25 * self.height_cm - 5.0 * self.age as f64;
        match self.sex {
            Sex::Male => base + 5.0,
            Sex::Female => base - 161.0,
        }
    }

    #[must_use]
    pub fn macro_targets(&self) -> MacroTargets {
        let calories =
            (self.bmr() * self.activity_level.factor() + self.goal.calorie_adjustment()).round();
        MacroTargets::from_calories(calories as i64)
    }

    /// Cuisines tagged with the given preference. Order follows the map and is unspecified.
    #[must_use]
    pub fn cuisines_tagged(&self, preference: CuisinePreference) -> Vec<String> {
        self.cuisine_preferences
            .iter()
            .filter(|(_, p)| **p == preference)
            .map(|(cuisine, _)| cuisine.clone())
            .collect()
    }
}

/// Reject profiles a user could not plausibly have entered.
pub fn validate_profile(profile: &UserProfile) -> Result<()> {
    if !(1..=120).contains(&profile.age) {
        bail!("Age must be between 1 and 120");
    }
    if profile.weight_kg <= 0.0 {
        bail!("weight_kg must be greater than 0");
    }
    if profile.height_cm <= 0.0 {
        bail!("height_cm must be greater than 0");
    }
    if profile.max_cooking_time_min <= 0 {
        bail!("max_cooking_time_min must be greater than 0");
    }
    Ok(())
}

// --- Plans ---

#[derive(Debug, Clone, Serialize)]
pub struct MealPlan {
    pub id: i64,
    pub uuid: String,
    pub week_start_date: NaiveDate,
    pub plan_duration: i64,
    pub is_active: bool,
    pub grocery_list_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl MealPlan {
    /// Last calendar date covered by the plan's nominal range.
    #[must_use]
    pub fn end_date(&self) -> NaiveDate {
        self.week_start_date + Duration::days((self.plan_duration - 1).max(0))
    }

    #[must_use]
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.week_start_date && date <= self.end_date()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Day {
    pub id: i64,
    pub uuid: String,
    pub plan_id: i64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meal {
    pub id: i64,
    pub uuid: String,
    pub day_id: i64,
    pub meal_type: MealType,
    pub position: i64,
    pub recipe_id: Option<i64>,
    pub is_eaten: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eaten_at: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub health_record_ids: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    // Joined fields for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protein_g: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbs_g: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fat_g: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayDetail {
    #[serde(flatten)]
    pub day: Day,
    pub meals: Vec<Meal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanDetail {
    #[serde(flatten)]
    pub plan: MealPlan,
    pub end_date: NaiveDate,
    pub days: Vec<DayDetail>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MacroTotals {
    pub calories: i64,
    pub protein_g: i64,
    pub carbs_g: i64,
    pub fat_g: i64,
}

impl MacroTotals {
    pub fn add_meal(&mut self, meal: &Meal) {
        self.calories += meal.calories.unwrap_or(0);
        self.protein_g += meal.protein_g.unwrap_or(0);
        self.carbs_g += meal.carbs_g.unwrap_or(0);
        self.fat_g += meal.fat_g.unwrap_or(0);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<i64>,
    pub meals: Vec<Meal>,
    pub planned: MacroTotals,
    pub eaten: MacroTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<MacroTargets>,
}

// --- Recipes ---

#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: i64,
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub name: String,
    pub description: String,
    pub instructions: Vec<String>,
    pub prep_time_min: i64,
    pub cook_time_min: i64,
    pub servings: i64,
    pub complexity: Complexity,
    pub cuisine: Option<CuisineType>,
    pub calories: i64,
    pub protein_g: i64,
    pub carbs_g: i64,
    pub fat_g: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub source: RecipeSource,
    pub is_custom: bool,
    pub is_favorite: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Recipe {
    #[must_use]
    pub fn total_time_min(&self) -> i64 {
        self.prep_time_min + self.cook_time_min
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub normalized_name: String,
    pub category: GroceryCategory,
    pub default_unit: MeasurementUnit,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeIngredient {
    pub id: i64,
    pub recipe_id: i64,
    pub ingredient_id: i64,
    pub quantity: f64,
    pub unit: MeasurementUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    // Joined fields for display
    pub ingredient_name: String,
    pub category: GroceryCategory,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub total_time_min: i64,
    pub ingredients: Vec<RecipeIngredient>,
}

/// A recipe about to be inserted. Generated, catalog and custom recipes share this shape.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub external_id: Option<String>,
    pub name: String,
    pub description: String,
    pub instructions: Vec<String>,
    pub prep_time_min: i64,
    pub cook_time_min: i64,
    pub servings: i64,
    pub complexity: Complexity,
    pub cuisine: Option<CuisineType>,
    pub calories: i64,
    pub protein_g: i64,
    pub carbs_g: i64,
    pub fat_g: i64,
    pub image_url: Option<String>,
    pub source: RecipeSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewIngredient {
    pub name: String,
    pub normalized_name: String,
    pub category: GroceryCategory,
    pub default_unit: MeasurementUnit,
}

/// Ingredient line for a recipe that is inserted together with its ingredients.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIngredientLine {
    pub ingredient: NewIngredient,
    pub quantity: f64,
    pub unit: MeasurementUnit,
    pub notes: Option<String>,
}

// --- Grocery ---

#[derive(Debug, Clone, Serialize)]
pub struct GroceryItem {
    pub id: i64,
    pub list_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredient_id: Option<i64>,
    pub name: String,
    pub quantity: f64,
    pub unit: MeasurementUnit,
    pub category: GroceryCategory,
    pub is_checked: bool,
    pub is_locked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroceryList {
    pub id: i64,
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub items: Vec<GroceryItem>,
}

impl GroceryList {
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.items.iter().filter(|i| !i.is_checked).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_meal_types() {
        assert_eq!(validate_meal_type("breakfast").unwrap(), MealType::Breakfast);
        assert_eq!(validate_meal_type("lunch").unwrap(), MealType::Lunch);
        assert_eq!(validate_meal_type("dinner").unwrap(), MealType::Dinner);
        assert_eq!(validate_meal_type("snack").unwrap(), MealType::Snack);
    }

    #[test]
    fn test_invalid_meal_type() {
        assert!(validate_meal_type("brunch").is_err());
        assert!(validate_meal_type("").is_err());
    }

    #[test]
    fn test_meal_type_case_insensitive() {
        assert_eq!(validate_meal_type("Lunch").unwrap(), MealType::Lunch);
        assert_eq!(validate_meal_type("BREAKFAST").unwrap(), MealType::Breakfast);
    }

    #[test]
    fn test_enum_parse_folds_separators() {
        assert_eq!(
            "Middle Eastern".parse::<CuisineType>().unwrap(),
            CuisineType::MiddleEastern
        );
        assert_eq!(
            "very-active".parse::<ActivityLevel>().unwrap(),
            ActivityLevel::VeryActive
        );
        assert_eq!(
            "well stocked".parse::<PantryLevel>().unwrap(),
            PantryLevel::WellStocked
        );
    }

    #[test]
    fn test_enum_parse_error_lists_choices() {
        let err = "brunch".parse::<MealType>().unwrap_err().to_string();
        assert!(err.contains("breakfast, lunch, dinner, snack"));
    }

    #[test]
    fn test_category_synonyms() {
        for raw in ["meat", "Seafood", "Meat & Seafood"] {
            assert_eq!(
                GroceryCategory::match_synonym(raw),
                Some(GroceryCategory::MeatSeafood)
            );
        }
        assert_eq!(
            GroceryCategory::match_synonym("Vegetables"),
            Some(GroceryCategory::Produce)
        );
        assert!(GroceryCategory::match_synonym("stationery").is_none());
    }

    #[test]
    fn test_unit_synonyms() {
        for raw in ["g", "gram", "grams", "G"] {
            assert_eq!(MeasurementUnit::match_synonym(raw), Some(MeasurementUnit::Gram));
        }
        assert_eq!(
            MeasurementUnit::match_synonym("tbsp"),
            Some(MeasurementUnit::Tablespoon)
        );
        assert!(MeasurementUnit::match_synonym("handful").is_none());
        assert!(MeasurementUnit::match_synonym("").is_none());
    }

    #[test]
    fn test_unit_to_base() {
        let (q, unit) = MeasurementUnit::Kilogram.to_base(1.5);
        assert!((q - 1500.0).abs() < f64::EPSILON);
        assert_eq!(unit, MeasurementUnit::Gram);

        let (q, unit) = MeasurementUnit::Liter.to_base(0.5);
        assert!((q - 500.0).abs() < f64::EPSILON);
        assert_eq!(unit, MeasurementUnit::Milliliter);

        let (q, unit) = MeasurementUnit::Cup.to_base(2.0);
        assert!((q - 2.0).abs() < f64::EPSILON);
        assert_eq!(unit, MeasurementUnit::Cup);
    }

    #[test]
    fn test_normalize_ingredient_name() {
        assert_eq!(normalize_ingredient_name("  Olive   Oil "), "olive oil");
        assert_eq!(normalize_ingredient_name("GARLIC"), "garlic");
    }

    #[test]
    fn test_macro_targets_from_calories() {
        let t = MacroTargets::from_calories(2000);
        // 2000 * 30% / 4 = 150g protein
        assert_eq!(t.protein_g, 150);
        // 2000 * 40% / 4 = 200g carbs
        assert_eq!(t.carbs_g, 200);
        // 2000 * 30% / 9 = 66.7g fat
        assert_eq!(t.fat_g, 67);
    }

    #[test]
    fn test_profile_macro_targets() {
        let profile = UserProfile {
            age: 30,
            sex: Sex::Male,
            weight_kg: 80.0,
            height_cm: 180.0,
            activity_level: ActivityLevel::Sedentary,
            goal: Goal::Maintain,
            ..UserProfile::default()
        };
        // 800 + 1125 - 150 + 5 = 1780; * 1.2 = 2136
        assert!((profile.bmr() - 1780.0).abs() < 0.01);
        assert_eq!(profile.macro_targets().calories, 2136);

        let losing = UserProfile {
            goal: Goal::Lose,
            ..profile
        };
        assert_eq!(losing.macro_targets().calories, 1636);
    }

    #[test]
    fn test_cuisines_tagged() {
        let mut profile = UserProfile::default();
        profile
            .cuisine_preferences
            .insert("italian".to_string(), CuisinePreference::Like);
        profile
            .cuisine_preferences
            .insert("thai".to_string(), CuisinePreference::Dislike);
        profile
            .cuisine_preferences
            .insert("greek".to_string(), CuisinePreference::Dislike);
        profile
            .cuisine_preferences
            .insert("french".to_string(), CuisinePreference::Neutral);

        let mut disliked = profile.cuisines_tagged(CuisinePreference::Dislike);
        disliked.sort();
        assert_eq!(disliked, vec!["greek", "thai"]);
        assert_eq!(
            profile.cuisines_tagged(CuisinePreference::Like),
            vec!["italian"]
        );
    }

    #[test]
    fn test_validate_profile() {
        assert!(validate_profile(&UserProfile::default()).is_ok());
        let bad = UserProfile {
            age: 0,
            ..UserProfile::default()
        };
        assert!(validate_profile(&bad).is_err());
        let bad = UserProfile {
            weight_kg: -1.0,
            ..UserProfile::default()
        };
        assert!(validate_profile(&bad).is_err());
    }

    #[test]
    fn test_plan_end_date_and_covers() {
        let plan = MealPlan {
            id: 1,
            uuid: String::new(),
            week_start_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            plan_duration: 7,
            is_active: true,
            grocery_list_id: None,
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(plan.end_date(), NaiveDate::from_ymd_opt(2026, 1, 11).unwrap());
        assert!(plan.covers(NaiveDate::from_ymd_opt(2026, 1, 8).unwrap()));
        assert!(!plan.covers(NaiveDate::from_ymd_opt(2026, 1, 12).unwrap()));
    }
}
