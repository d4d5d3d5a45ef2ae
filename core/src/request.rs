//! Builds the generator request body from the stored profile.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{CuisinePreference, MacroTargets, MealType, UserProfile};

/// Caller-supplied macro targets. Any field left `None` falls back to the
/// value computed from the profile. Values are passed through unvalidated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroOverrides {
    pub calories: Option<i64>,
    pub protein_g: Option<i64>,
    pub carbs_g: Option<i64>,
    pub fat_g: Option<i64>,
}

impl MacroOverrides {
    #[must_use]
    pub fn resolve(&self, computed: MacroTargets) -> MacroTargets {
        MacroTargets {
            calories: self.calories.unwrap_or(computed.calories),
            protein_g: self.protein_g.unwrap_or(computed.protein_g),
            carbs_g: self.carbs_g.unwrap_or(computed.carbs_g),
            fat_g: self.fat_g.unwrap_or(computed.fat_g),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePayload {
    pub age: i64,
    pub sex: String,
    pub weight: f64,
    pub height: f64,
    pub activity_level: String,
    pub goal: String,
    pub target_calories: i64,
    pub target_protein: i64,
    pub target_carbs: i64,
    pub target_fat: i64,
    pub dietary_restrictions: Vec<String>,
    pub allergies: Vec<String>,
    pub dislikes: Vec<String>,
    pub preferred_cuisines: Vec<String>,
    pub disliked_cuisines: Vec<String>,
    pub cooking_skill: String,
    pub max_cooking_time: i64,
    pub pantry_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_preferences: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub user_profile: ProfilePayload,
    pub excluded_recipes: Vec<String>,
    pub duration: i64,
    pub start_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub user_profile: ProfilePayload,
    pub meal_type: MealType,
    pub excluded_recipes: Vec<String>,
}

/// Flatten the profile and its resolved targets into the wire shape.
#[must_use]
pub fn build_profile_payload(
    profile: &UserProfile,
    overrides: &MacroOverrides,
    weekly_preferences: Option<&str>,
) -> ProfilePayload {
    let targets = overrides.resolve(profile.macro_targets());
    ProfilePayload {
        age: profile.age,
        sex: profile.sex.to_string(),
        weight: profile.weight_kg,
        height: profile.height_cm,
        activity_level: profile.activity_level.to_string(),
        goal: profile.goal.to_string(),
        target_calories: targets.calories,
        target_protein: targets.protein_g,
        target_carbs: targets.carbs_g,
        target_fat: targets.fat_g,
        dietary_restrictions: profile.dietary_restrictions.clone(),
        allergies: profile.allergies.clone(),
        dislikes: profile.dislikes.clone(),
        preferred_cuisines: profile.cuisines_tagged(CuisinePreference::Like),
        disliked_cuisines: profile.cuisines_tagged(CuisinePreference::Dislike),
        cooking_skill: profile.cooking_skill.to_string(),
        max_cooking_time: profile.max_cooking_time_min,
        pantry_level: profile.pantry_level.to_string(),
        weekly_preferences: weekly_preferences
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    }
}

#[must_use]
pub fn build_plan_request(
    profile: &UserProfile,
    overrides: &MacroOverrides,
    weekly_preferences: Option<&str>,
    excluded_recipes: Vec<String>,
    duration: i64,
    start_date: NaiveDate,
) -> GenerationRequest {
    GenerationRequest {
        user_profile: build_profile_payload(profile, overrides, weekly_preferences),
        excluded_recipes,
        duration,
        start_date,
    }
}

#[must_use]
pub fn build_swap_request(
    profile: &UserProfile,
    overrides: &MacroOverrides,
    meal_type: MealType,
    excluded_recipes: Vec<String>,
) -> SwapRequest {
    SwapRequest {
        user_profile: build_profile_payload(profile, overrides, None),
        meal_type,
        excluded_recipes,
    }
}
