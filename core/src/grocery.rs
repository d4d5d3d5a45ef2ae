//! Grocery list derived from a plan's uneaten meals.

use std::collections::HashMap;

use anyhow::Result;

use crate::db::{Database, NewGroceryItem, PlannedIngredient};
use crate::models::{GroceryItem, GroceryList, MeasurementUnit};

/// Sums planned ingredient lines per (ingredient, base unit).
///
/// Mass and volume are converted to grams and milliliters first, so "1 kg" and
/// "200 g" of rice collapse into one 1200 g line. Items whose key appears in
/// `checked` start checked. `skip` holds keys already covered by locked items.
#[must_use]
pub fn aggregate(
    lines: &[PlannedIngredient],
    checked: &[(i64, MeasurementUnit)],
    skip: &[(i64, MeasurementUnit)],
) -> Vec<NewGroceryItem> {
    let mut order: Vec<(i64, MeasurementUnit)> = Vec::new();
    let mut totals: HashMap<(i64, MeasurementUnit), NewGroceryItem> = HashMap::new();

    for line in lines {
        let (quantity, unit) = line.unit.to_base(line.quantity);
        let key = (line.ingredient_id, unit);
        if skip.contains(&key) {
            continue;
        }
        totals
            .entry(key)
            .and_modify(|item| item.quantity += quantity)
            .or_insert_with(|| {
                order.push(key);
                NewGroceryItem {
                    ingredient_id: Some(line.ingredient_id),
                    name: line.name.clone(),
                    quantity,
                    unit,
                    category: line.category,
                    is_checked: checked.contains(&key),
                }
            });
    }

    order
        .into_iter()
        .filter_map(|key| totals.remove(&key))
        .collect()
}

fn item_key(item: &GroceryItem) -> Option<(i64, MeasurementUnit)> {
    item.ingredient_id.map(|id| (id, item.unit))
}

/// Rebuild the plan's grocery list from its uneaten meals.
///
/// Locked items are left untouched and suppress regenerated lines for the same
/// ingredient and unit. The checked state of unlocked items carries over.
pub fn build_grocery_list(db: &Database, plan_id: i64) -> Result<GroceryList> {
    db.in_transaction(|db| {
        let plan = db.get_plan(plan_id)?;
        let list_id = match plan.grocery_list_id {
            Some(id) => id,
            None => {
                let id = db.create_grocery_list(Some(plan_id))?;
                db.set_plan_grocery_list(plan_id, Some(id))?;
                id
            }
        };

        let existing = db.get_grocery_list(list_id)?;
        let locked: Vec<_> = existing
            .items
            .iter()
            .filter(|i| i.is_locked)
            .filter_map(item_key)
            .collect();
        let checked: Vec<_> = existing
            .items
            .iter()
            .filter(|i| i.is_checked && !i.is_locked)
            .filter_map(item_key)
            .collect();

        db.delete_unlocked_grocery_items(list_id)?;
        let lines = db.planned_ingredients(plan_id)?;
        let items = aggregate(&lines, &checked, &locked);
        for item in &items {
            db.insert_grocery_item(list_id, item)?;
        }
        db.touch_grocery_list(list_id)?;

        tracing::debug!(plan_id, list_id, items = items.len(), "rebuilt grocery list");
        db.get_grocery_list(list_id)
    })
}

/// The plan's current grocery list, if one was built.
pub fn grocery_list_for_plan(db: &Database, plan_id: i64) -> Result<Option<GroceryList>> {
    let plan = db.get_plan(plan_id)?;
    plan.grocery_list_id
        .map(|id| db.get_grocery_list(id))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Complexity, GroceryCategory, MealType, NewIngredient, NewIngredientLine, NewRecipe,
        RecipeSource, normalize_ingredient_name,
    };
    use chrono::NaiveDate;

    fn planned(id: i64, name: &str, quantity: f64, unit: MeasurementUnit) -> PlannedIngredient {
        PlannedIngredient {
            ingredient_id: id,
            name: name.to_string(),
            category: GroceryCategory::Pantry,
            quantity,
            unit,
        }
    }

    #[test]
    fn test_aggregate_sums_in_base_units() {
        let lines = vec![
            planned(1, "Rice", 1.0, MeasurementUnit::Kilogram),
            planned(1, "Rice", 200.0, MeasurementUnit::Gram),
            planned(2, "Olive Oil", 1.0, MeasurementUnit::Tablespoon),
            planned(2, "Olive Oil", 1.5, MeasurementUnit::Tablespoon),
            planned(2, "Olive Oil", 1.0, MeasurementUnit::Cup),
        ];
        let items = aggregate(&lines, &[], &[]);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].name, "Rice");
        assert!((items[0].quantity - 1200.0).abs() < 1e-9);
        assert_eq!(items[0].unit, MeasurementUnit::Gram);
        assert!((items[1].quantity - 2.5).abs() < 1e-9);
        assert_eq!(items[2].unit, MeasurementUnit::Cup);
    }

    #[test]
    fn test_aggregate_checked_and_skipped() {
        let lines = vec![
            planned(1, "Rice", 100.0, MeasurementUnit::Gram),
            planned(2, "Eggs", 2.0, MeasurementUnit::Piece),
        ];
        let items = aggregate(
            &lines,
            &[(1, MeasurementUnit::Gram)],
            &[(2, MeasurementUnit::Piece)],
        );
        assert_eq!(items.len(), 1);
        assert!(items[0].is_checked);
    }

    fn seed(db: &Database) -> (i64, Vec<i64>) {
        let plan_id = db
            .insert_plan(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(), 2)
            .unwrap();
        let mut meal_ids = Vec::new();
        for (offset, qty) in [(5u32, 200.0), (6u32, 300.0)] {
            let day_id = db
                .insert_day(plan_id, NaiveDate::from_ymd_opt(2026, 1, offset).unwrap())
                .unwrap();
            let recipe = db
                .insert_recipe_with_ingredients(
                    &NewRecipe {
                        external_id: None,
                        name: format!("Rice Bowl {offset}"),
                        description: String::new(),
                        instructions: Vec::new(),
                        prep_time_min: 5,
                        cook_time_min: 20,
                        servings: 1,
                        complexity: Complexity::Easy,
                        cuisine: None,
                        calories: 500,
                        protein_g: 20,
                        carbs_g: 80,
                        fat_g: 10,
                        image_url: None,
                        source: RecipeSource::Generated,
                    },
                    &[NewIngredientLine {
                        ingredient: NewIngredient {
                            name: "Rice".to_string(),
                            normalized_name: normalize_ingredient_name("Rice"),
                            category: GroceryCategory::Pantry,
                            default_unit: MeasurementUnit::Gram,
                        },
                        quantity: qty,
                        unit: MeasurementUnit::Gram,
                        notes: None,
                    }],
                )
                .unwrap();
            meal_ids.push(
                db.insert_meal(day_id, MealType::Lunch, 0, Some(recipe.id))
                    .unwrap(),
            );
        }
        (plan_id, meal_ids)
    }

    #[test]
    fn test_build_links_list_and_skips_eaten() {
        let db = Database::open_in_memory().unwrap();
        let (plan_id, meals) = seed(&db);

        let list = build_grocery_list(&db, plan_id).unwrap();
        assert_eq!(list.items.len(), 1);
        assert!((list.items[0].quantity - 500.0).abs() < 1e-9);
        assert_eq!(db.get_plan(plan_id).unwrap().grocery_list_id, Some(list.id));

        db.set_meal_eaten(meals[0], Some("2026-01-05T12:00:00Z"), &[])
            .unwrap();
        let rebuilt = build_grocery_list(&db, plan_id).unwrap();
        assert_eq!(rebuilt.id, list.id);
        assert!((rebuilt.items[0].quantity - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_rebuild_keeps_checked_and_locked() {
        let db = Database::open_in_memory().unwrap();
        let (plan_id, meals) = seed(&db);

        let list = build_grocery_list(&db, plan_id).unwrap();
        let item = &list.items[0];
        db.set_grocery_item_flags(item.id, Some(true), None).unwrap();
        let rebuilt = build_grocery_list(&db, plan_id).unwrap();
        assert!(rebuilt.items[0].is_checked);

        let locked_id = rebuilt.items[0].id;
        db.set_grocery_item_flags(locked_id, None, Some(true)).unwrap();
        db.set_meal_eaten(meals[0], Some("2026-01-05T12:00:00Z"), &[])
            .unwrap();
        let rebuilt = build_grocery_list(&db, plan_id).unwrap();
        assert_eq!(rebuilt.items.len(), 1);
        assert_eq!(rebuilt.items[0].id, locked_id);
        assert!((rebuilt.items[0].quantity - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_list_for_plan_without_build() {
        let db = Database::open_in_memory().unwrap();
        let (plan_id, _) = seed(&db);
        assert!(grocery_list_for_plan(&db, plan_id).unwrap().is_none());
    }
}
