use anyhow::{Context, Result};
use chrono::DateTime;

use plateplan_core::models::Meal;
use plateplan_core::service::PlannerService;
use plateplan_core::transport::PlanTransport;

use super::helpers::warn_unmapped;

pub(crate) async fn cmd_meal_swap(
    service: &PlannerService,
    transport: &dyn PlanTransport,
    meal_id: i64,
    exclude: &[String],
    json: bool,
) -> Result<()> {
    let before = service.get_meal(meal_id)?;
    let swapped = service.replace_meal(transport, meal_id, exclude).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&swapped)?);
        return Ok(());
    }

    warn_unmapped(&swapped.unmapped);
    let old = before.recipe_name.as_deref().unwrap_or("(no recipe)");
    let recipe = &swapped.recipe;
    let (name, cal) = (&recipe.name, recipe.calories);
    let (p, c, f) = (recipe.protein_g, recipe.carbs_g, recipe.fat_g);
    println!("Swapped {} [{meal_id}]: {old} -> {name}", before.meal_type);
    println!("  {cal} kcal | P:{p}g C:{c}g F:{f}g | {} min", recipe.total_time_min());
    Ok(())
}

fn print_eaten_state(meal: &Meal) {
    let id = meal.id;
    let name = meal.recipe_name.as_deref().unwrap_or("(no recipe)");
    match &meal.eaten_at {
        Some(at) if meal.is_eaten => println!("Marked [{id}] {name} as eaten at {at}"),
        _ => println!("Marked [{id}] {name} as not eaten"),
    }
}

pub(crate) fn cmd_meal_eat(
    service: &PlannerService,
    meal_id: i64,
    at: Option<&str>,
    health_ids: &[String],
    json: bool,
) -> Result<()> {
    if let Some(at) = at {
        DateTime::parse_from_rfc3339(at)
            .with_context(|| format!("Invalid time '{at}'. Use RFC 3339, e.g. 2026-01-05T12:30:00Z"))?;
    }
    let meal = service.mark_meal_eaten(meal_id, at, health_ids)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&meal)?);
    } else {
        print_eaten_state(&meal);
    }
    Ok(())
}

pub(crate) fn cmd_meal_uneat(service: &PlannerService, meal_id: i64, json: bool) -> Result<()> {
    let meal = service.unmark_meal_eaten(meal_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&meal)?);
    } else {
        print_eaten_state(&meal);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use plateplan_core::models::UserProfile;
    use plateplan_core::service::GenerateOptions;
    use plateplan_core::transport::MockTransport;

    async fn service_with_plan() -> (PlannerService, i64) {
        let service = PlannerService::new_in_memory().unwrap();
        service.save_profile(&UserProfile::default()).unwrap();
        let options = GenerateOptions::new(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(), 1);
        let generated = service
            .generate_plan(&MockTransport::new(), &options)
            .await
            .unwrap();
        let meal_id = generated.plan.days[0].meals[0].id;
        (service, meal_id)
    }

    #[tokio::test]
    async fn test_eat_then_uneat() {
        let (service, meal_id) = service_with_plan().await;
        cmd_meal_eat(&service, meal_id, Some("2026-01-05T08:00:00Z"), &["hk-1".to_string()], true)
            .unwrap();
        let meal = service.get_meal(meal_id).unwrap();
        assert!(meal.is_eaten);
        assert_eq!(meal.health_record_ids, vec!["hk-1"]);

        cmd_meal_uneat(&service, meal_id, true).unwrap();
        assert!(!service.get_meal(meal_id).unwrap().is_eaten);
    }

    #[tokio::test]
    async fn test_swap_replaces_recipe() {
        let (service, meal_id) = service_with_plan().await;
        let before = service.get_meal(meal_id).unwrap().recipe_id;
        cmd_meal_swap(&service, &MockTransport::new(), meal_id, &[], true)
            .await
            .unwrap();
        assert_ne!(service.get_meal(meal_id).unwrap().recipe_id, before);
    }

    #[test]
    fn test_eat_missing_meal_fails() {
        let service = PlannerService::new_in_memory().unwrap();
        assert!(cmd_meal_eat(&service, 999, None, &[], true).is_err());
    }

    #[tokio::test]
    async fn test_eat_rejects_bad_timestamp() {
        let (service, meal_id) = service_with_plan().await;
        assert!(cmd_meal_eat(&service, meal_id, Some("lunchtime"), &[], true).is_err());
        assert!(!service.get_meal(meal_id).unwrap().is_eaten);
    }
}
