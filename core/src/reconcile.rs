//! Folds stale active plans into a freshly generated one.
//!
//! Days of older active plans whose dates the new plan does not cover are
//! reassigned to the new plan, so already-tracked meals survive a
//! regeneration. Days on dates the new plan does cover stay with their old
//! plan. Every older plan ends up inactive.

use std::collections::HashSet;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;

use crate::catalog;
use crate::db::Database;
use crate::mapping::MappedPlan;
use crate::models::RecipeSource;

/// Days of one stale plan, as (day id, date).
#[derive(Debug, Clone)]
pub struct OldPlan {
    pub id: i64,
    pub days: Vec<(i64, NaiveDate)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationPlan {
    /// Day ids to reassign to the new plan.
    pub moves: Vec<i64>,
    /// Plan ids to mark inactive.
    pub deactivate: Vec<i64>,
    /// Day ids left behind because a newer stale plan already supplied that date.
    pub skipped_duplicates: Vec<i64>,
}

/// Decide which days move into the new plan.
///
/// `old_plans` must be ordered newest first. When two stale plans both hold a
/// day for the same uncovered date, the newer plan's day moves and the older
/// one stays put.
#[must_use]
pub fn plan_migration(new_dates: &HashSet<NaiveDate>, old_plans: &[OldPlan]) -> MigrationPlan {
    let mut claimed: HashSet<NaiveDate> = new_dates.clone();
    let mut migration = MigrationPlan::default();

    for plan in old_plans {
        for &(day_id, date) in &plan.days {
            if new_dates.contains(&date) {
                continue;
            }
            if claimed.insert(date) {
                migration.moves.push(day_id);
            } else {
                migration.skipped_duplicates.push(day_id);
            }
        }
        migration.deactivate.push(plan.id);
    }
    migration
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub deactivated_plans: Vec<i64>,
    pub moved_days: usize,
    pub skipped_duplicates: usize,
    pub week_start_date: Option<NaiveDate>,
    pub plan_duration: Option<i64>,
}

/// Reconcile every other active plan into `new_plan_id` and recompute its range.
pub fn reconcile(db: &Database, new_plan_id: i64) -> Result<ReconcileSummary> {
    let new_dates: HashSet<NaiveDate> = db
        .days_for_plan(new_plan_id)?
        .into_iter()
        .map(|d| d.date)
        .collect();

    let old_plans = db
        .active_plans_except(new_plan_id)?
        .into_iter()
        .map(|plan| {
            let days = db
                .days_for_plan(plan.id)?
                .into_iter()
                .map(|d| (d.id, d.date))
                .collect();
            Ok(OldPlan { id: plan.id, days })
        })
        .collect::<Result<Vec<_>>>()?;

    let migration = plan_migration(&new_dates, &old_plans);
    for &day_id in &migration.moves {
        db.move_day(day_id, new_plan_id)?;
    }
    for &plan_id in &migration.deactivate {
        db.set_plan_active(plan_id, false)?;
    }
    if !migration.skipped_duplicates.is_empty() {
        tracing::warn!(
            days = ?migration.skipped_duplicates,
            "stale plans overlap on dates outside the new plan; keeping the newest"
        );
    }

    let range = db.plan_date_range(new_plan_id)?;
    let (week_start_date, plan_duration) = match range {
        Some((start, end)) => {
            let duration = (end - start).num_days() + 1;
            db.set_plan_range(new_plan_id, start, duration)?;
            (Some(start), Some(duration))
        }
        None => (None, None),
    };

    tracing::debug!(
        plan_id = new_plan_id,
        moved = migration.moves.len(),
        deactivated = migration.deactivate.len(),
        "reconciled plans"
    );

    Ok(ReconcileSummary {
        deactivated_plans: migration.deactivate,
        moved_days: migration.moves.len(),
        skipped_duplicates: migration.skipped_duplicates.len(),
        week_start_date,
        plan_duration,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub plan_id: i64,
    pub reconcile: ReconcileSummary,
    pub orphans_removed: usize,
    /// Set when cleanup removed synced catalog recipes and the sync cursor was rewound.
    pub catalog_cursor_reset: bool,
}

/// Insert a mapped plan, reconcile older plans into it and drop orphaned
/// recipes, all in one transaction.
///
/// Removed catalog recipes sit behind the stored sync cursor, so the cursor
/// is cleared with them and the next sync fetches them again.
pub fn save_generated_plan(db: &Database, mapped: &MappedPlan) -> Result<SaveOutcome> {
    db.in_transaction(|db| {
        let plan_id = db.insert_mapped_plan(mapped)?;
        let reconcile = reconcile(db, plan_id)?;
        let catalog_orphans = db.count_orphaned_recipes(RecipeSource::Catalog)?;
        let orphans_removed = db.delete_orphaned_recipes()?;
        let catalog_cursor_reset = catalog_orphans > 0 && catalog::reset_catalog_cursor(db)?;
        Ok(SaveOutcome {
            plan_id,
            reconcile,
            orphans_removed,
            catalog_cursor_reset,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Complexity, MealType, NewRecipe, RecipeSource};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    fn dates(range: std::ops::RangeInclusive<u32>) -> HashSet<NaiveDate> {
        range.map(date).collect()
    }

    fn recipe(name: &str) -> NewRecipe {
        NewRecipe {
            external_id: None,
            name: name.to_string(),
            description: String::new(),
            instructions: Vec::new(),
            prep_time_min: 5,
            cook_time_min: 5,
            servings: 1,
            complexity: Complexity::Easy,
            cuisine: None,
            calories: 400,
            protein_g: 20,
            carbs_g: 40,
            fat_g: 15,
            image_url: None,
            source: RecipeSource::Generated,
        }
    }

    /// Creates an active plan with one meal per day.
    fn seed_plan(db: &Database, days: &[u32]) -> i64 {
        let plan_id = db.insert_plan(date(days[0]), days.len() as i64).unwrap();
        for &d in days {
            let day_id = db.insert_day(plan_id, date(d)).unwrap();
            let recipe_id = db.insert_recipe(&recipe(&format!("Meal {d}"))).unwrap();
            db.insert_meal(day_id, MealType::Dinner, 0, Some(recipe_id))
                .unwrap();
        }
        plan_id
    }

    #[test]
    fn test_fully_covered_plan_moves_nothing() {
        let old = OldPlan {
            id: 1,
            days: (5..=11).map(|d| (i64::from(d), date(d))).collect(),
        };
        let migration = plan_migration(&dates(5..=11), &[old]);
        assert!(migration.moves.is_empty());
        assert_eq!(migration.deactivate, vec![1]);
    }

    #[test]
    fn test_uncovered_day_moves() {
        let old = OldPlan {
            id: 1,
            days: vec![(10, date(4)), (11, date(5))],
        };
        let migration = plan_migration(&dates(5..=11), &[old]);
        assert_eq!(migration.moves, vec![10]);
        assert_eq!(migration.deactivate, vec![1]);
    }

    #[test]
    fn test_duplicate_dates_newest_wins() {
        let newer = OldPlan {
            id: 2,
            days: vec![(20, date(3))],
        };
        let older = OldPlan {
            id: 1,
            days: vec![(10, date(3)), (11, date(2))],
        };
        let migration = plan_migration(&dates(5..=11), &[newer, older]);
        assert_eq!(migration.moves, vec![20, 11]);
        assert_eq!(migration.skipped_duplicates, vec![10]);
        assert_eq!(migration.deactivate, vec![2, 1]);
    }

    #[test]
    fn test_reconcile_fully_covered() {
        let db = Database::open_in_memory().unwrap();
        let old = seed_plan(&db, &[5, 6, 7, 8, 9, 10, 11]);
        let new = seed_plan(&db, &[5, 6, 7, 8, 9, 10, 11]);

        let summary = reconcile(&db, new).unwrap();
        assert_eq!(summary.moved_days, 0);
        assert_eq!(summary.deactivated_plans, vec![old]);
        assert!(!db.get_plan(old).unwrap().is_active);
        assert!(db.get_plan(new).unwrap().is_active);
        assert_eq!(db.days_for_plan(old).unwrap().len(), 7);
        assert_eq!(db.days_for_plan(new).unwrap().len(), 7);
        assert_eq!(db.get_plan(new).unwrap().plan_duration, 7);
    }

    #[test]
    fn test_reconcile_moves_day_and_extends_range() {
        let db = Database::open_in_memory().unwrap();
        let old = seed_plan(&db, &[4, 5, 6, 7, 8, 9, 10]);
        let new = seed_plan(&db, &[5, 6, 7, 8, 9, 10, 11]);

        let summary = reconcile(&db, new).unwrap();
        assert_eq!(summary.moved_days, 1);
        assert_eq!(summary.week_start_date, Some(date(4)));
        assert_eq!(summary.plan_duration, Some(8));

        let plan = db.get_plan(new).unwrap();
        assert_eq!(plan.week_start_date, date(4));
        assert_eq!(plan.plan_duration, 8);
        assert_eq!(plan.end_date(), date(11));

        let moved: Vec<_> = db.days_for_plan(new).unwrap();
        assert_eq!(moved.len(), 8);
        assert_eq!(moved[0].date, date(4));
        // the moved day keeps its meals
        assert_eq!(db.meals_for_day(moved[0].id).unwrap().len(), 1);

        assert!(!db.get_plan(old).unwrap().is_active);
        assert_eq!(db.days_for_plan(old).unwrap().len(), 6);
    }

    #[test]
    fn test_reconcile_ignores_inactive_plans() {
        let db = Database::open_in_memory().unwrap();
        let inactive = seed_plan(&db, &[1, 2]);
        db.set_plan_active(inactive, false).unwrap();
        let new = seed_plan(&db, &[5, 6]);

        let summary = reconcile(&db, new).unwrap();
        assert!(summary.deactivated_plans.is_empty());
        assert_eq!(db.days_for_plan(inactive).unwrap().len(), 2);
    }

    #[test]
    fn test_save_generated_plan_is_atomic() {
        use crate::mapping::{NewDay, NewMeal, NewMealPlan};

        let db = Database::open_in_memory().unwrap();
        let old = seed_plan(&db, &[1, 2, 3, 4, 5, 6]);
        // Inserts and day moves succeed; deactivating the old plan fails
        db.execute_batch(
            "CREATE TRIGGER block_plan_updates BEFORE UPDATE ON meal_plans
             BEGIN SELECT RAISE(ABORT, 'plan updates blocked'); END;",
        )
        .unwrap();

        let mapped = MappedPlan {
            plan: Some(NewMealPlan {
                week_start_date: date(5),
                plan_duration: 3,
            }),
            days: (5..=7).map(|d| NewDay { date: date(d) }).collect(),
            recipes: vec![recipe("Fresh Dinner")],
            meals: (0..3)
                .map(|day| NewMeal {
                    day,
                    recipe: 0,
                    meal_type: MealType::Dinner,
                    position: 0,
                })
                .collect(),
            ..MappedPlan::default()
        };
        assert!(save_generated_plan(&db, &mapped).is_err());

        let plans = db.list_plans().unwrap();
        assert_eq!(plans.len(), 1);
        assert!(plans[0].is_active);
        assert_eq!(db.days_for_plan(old).unwrap().len(), 6);
        assert!(db.day_for_date(date(7)).unwrap().is_none());
        let names: Vec<_> = db
            .list_recipes(false, None)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names.len(), 6);
        assert!(!names.iter().any(|n| n == "Fresh Dinner"));
    }

    #[test]
    fn test_save_resets_catalog_cursor_when_catalog_rows_removed() {
        let db = Database::open_in_memory().unwrap();
        let mut synced = recipe("Synced Stew");
        synced.source = RecipeSource::Catalog;
        synced.external_id = Some("doc-9".to_string());
        db.insert_recipe(&synced).unwrap();
        db.set_setting("catalog_cursor", "doc-9").unwrap();

        let mapped = MappedPlan {
            plan: Some(crate::mapping::NewMealPlan {
                week_start_date: date(5),
                plan_duration: 1,
            }),
            days: vec![crate::mapping::NewDay { date: date(5) }],
            ..MappedPlan::default()
        };
        let outcome = save_generated_plan(&db, &mapped).unwrap();
        assert_eq!(outcome.orphans_removed, 1);
        assert!(outcome.catalog_cursor_reset);
        assert!(db.get_setting("catalog_cursor").unwrap().is_none());

        // Without catalog orphans the cursor is left alone
        db.set_setting("catalog_cursor", "doc-9").unwrap();
        let outcome = save_generated_plan(&db, &mapped).unwrap();
        assert!(!outcome.catalog_cursor_reset);
        assert_eq!(db.get_setting("catalog_cursor").unwrap().as_deref(), Some("doc-9"));
    }
}
