use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::GenerationError;
use crate::request::{GenerationRequest, SwapRequest};

/// Sends generation requests to the remote planner and returns the raw body.
///
/// Decoding is left to the caller so every transport shares one set of
/// failure semantics.
#[async_trait]
pub trait PlanTransport: Send + Sync {
    async fn request_plan(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
    async fn request_swap(&self, request: &SwapRequest) -> Result<String, GenerationError>;
}

const MOCK_BREAKFASTS: &[(&str, i64, i64, i64, i64)] = &[
    ("Greek Yogurt Parfait", 380, 24, 48, 10),
    ("Spinach Omelette", 420, 28, 8, 30),
    ("Overnight Oats", 450, 18, 64, 14),
];

const MOCK_LUNCHES: &[(&str, i64, i64, i64, i64)] = &[
    ("Chicken Caesar Wrap", 560, 38, 44, 24),
    ("Lentil Soup", 480, 26, 62, 12),
    ("Tuna Nicoise Salad", 520, 36, 30, 28),
];

const MOCK_DINNERS: &[(&str, i64, i64, i64, i64)] = &[
    ("Salmon with Rice", 640, 42, 58, 24),
    ("Beef Stir Fry", 610, 40, 52, 26),
    ("Chickpea Curry", 580, 22, 76, 20),
    ("Turkey Meatballs", 600, 44, 50, 22),
];

/// Offline transport that answers with a canned plan built from the request.
///
/// Useful for demos and tests. Recipes named in `excludedRecipes` are skipped
/// while alternatives remain.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    /// When set, every call answers `success: false` with this message.
    pub failure: Option<String>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
        }
    }

    fn failure_body(&self) -> Option<String> {
        self.failure
            .as_ref()
            .map(|msg| json!({"success": false, "error": msg}).to_string())
    }
}

fn pick<'a>(
    pool: &'a [(&'a str, i64, i64, i64, i64)],
    index: usize,
    excluded: &[String],
) -> &'a (&'a str, i64, i64, i64, i64) {
    let allowed: Vec<_> = pool
        .iter()
        .filter(|(name, ..)| !excluded.iter().any(|e| e.eq_ignore_ascii_case(name)))
        .collect();
    if allowed.is_empty() {
        &pool[index % pool.len()]
    } else {
        allowed[index % allowed.len()]
    }
}

fn mock_recipe(entry: &(&str, i64, i64, i64, i64), meal_type: &str) -> Value {
    let (name, calories, protein, carbs, fat) = *entry;
    let ingredients = match meal_type {
        "breakfast" => json!([
            {"name": "Eggs", "quantity": 2, "unit": "piece", "category": "dairy"},
            {"name": "Rolled Oats", "quantity": 0.5, "unit": "cup", "category": "pantry"}
        ]),
        "lunch" => json!([
            {"name": "Mixed Greens", "quantity": 100, "unit": "g", "category": "produce"},
            {"name": "Olive Oil", "quantity": 1, "unit": "tbsp", "category": "pantry"}
        ]),
        _ => json!([
            {"name": "Garlic", "quantity": 2, "unit": "cloves", "category": "produce"},
            {"name": "Olive Oil", "quantity": 1.5, "unit": "tbsp", "category": "pantry"},
            {"name": "Brown Rice", "quantity": 0.25, "unit": "kg", "category": "grains"}
        ]),
    };
    json!({
        "name": name,
        "description": format!("A simple {meal_type} ready in under half an hour."),
        "instructions": ["Prepare the ingredients.", "Cook until done.", "Serve."],
        "prepTime": 10,
        "cookTime": 15,
        "servings": 1,
        "complexity": "easy",
        "cuisineType": "mediterranean",
        "calories": calories,
        "protein": protein,
        "carbs": carbs,
        "fat": fat,
        "ingredients": ingredients
    })
}

#[async_trait]
impl PlanTransport for MockTransport {
    async fn request_plan(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        if let Some(body) = self.failure_body() {
            return Ok(body);
        }
        let excluded = &request.excluded_recipes;
        let days: Vec<Value> = (0..request.duration.max(0))
            .map(|offset| {
                let i = usize::try_from(offset).unwrap_or_default();
                json!({
                    "dayOfWeek": offset,
                    "meals": [
                        {"mealType": "breakfast", "recipe": mock_recipe(pick(MOCK_BREAKFASTS, i, excluded), "breakfast")},
                        {"mealType": "lunch", "recipe": mock_recipe(pick(MOCK_LUNCHES, i, excluded), "lunch")},
                        {"mealType": "dinner", "recipe": mock_recipe(pick(MOCK_DINNERS, i, excluded), "dinner")}
                    ]
                })
            })
            .collect();
        Ok(json!({"success": true, "mealPlan": {"days": days}}).to_string())
    }

    async fn request_swap(&self, request: &SwapRequest) -> Result<String, GenerationError> {
        if let Some(body) = self.failure_body() {
            return Ok(body);
        }
        let meal_type = request.meal_type.as_str();
        let pool = match meal_type {
            "breakfast" => MOCK_BREAKFASTS,
            "lunch" => MOCK_LUNCHES,
            _ => MOCK_DINNERS,
        };
        let recipe = mock_recipe(pick(pool, 0, &request.excluded_recipes), meal_type);
        Ok(json!({"success": true, "recipe": recipe}).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{decode_generation_response, decode_swap_response};
    use crate::models::{MealType, UserProfile};
    use crate::request::{MacroOverrides, build_plan_request, build_swap_request};
    use chrono::NaiveDate;

    fn plan_request(duration: i64, excluded: Vec<String>) -> GenerationRequest {
        build_plan_request(
            &UserProfile::default(),
            &MacroOverrides::default(),
            None,
            excluded,
            duration,
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_mock_plan_has_requested_days() {
        let body = MockTransport::new()
            .request_plan(&plan_request(5, Vec::new()))
            .await
            .unwrap();
        let payload = decode_generation_response(&body).unwrap();
        assert_eq!(payload.days.len(), 5);
        assert!(payload.days.iter().all(|d| d.meals.len() == 3));
    }

    #[tokio::test]
    async fn test_mock_skips_excluded() {
        let req = plan_request(3, vec!["salmon with rice".to_string()]);
        let body = MockTransport::new().request_plan(&req).await.unwrap();
        let payload = decode_generation_response(&body).unwrap();
        assert!(
            payload
                .days
                .iter()
                .flat_map(|d| &d.meals)
                .all(|m| m.recipe.name != "Salmon with Rice")
        );
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let body = MockTransport::failing("rate limited")
            .request_plan(&plan_request(1, Vec::new()))
            .await
            .unwrap();
        let err = decode_generation_response(&body).unwrap_err();
        assert_eq!(err.to_string(), "rate limited");
    }

    #[tokio::test]
    async fn test_mock_swap() {
        let req = build_swap_request(
            &UserProfile::default(),
            &MacroOverrides::default(),
            MealType::Lunch,
            vec!["Chicken Caesar Wrap".to_string()],
        );
        let body = MockTransport::new().request_swap(&req).await.unwrap();
        let recipe = decode_swap_response(&body).unwrap();
        assert_eq!(recipe.name, "Lentil Soup");
    }
}
