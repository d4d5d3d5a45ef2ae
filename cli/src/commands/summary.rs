use anyhow::Result;
use std::process;

use plateplan_core::service::PlannerService;

use super::helpers::{confirm, parse_date};

pub(crate) fn cmd_summary(service: &PlannerService, date: Option<String>, json: bool) -> Result<()> {
    let date = parse_date(date)?;
    let summary = service.day_summary(date)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if summary.meals.is_empty() {
        eprintln!("No planned meals for {date}");
        process::exit(2);
    }

    println!("=== {} {date} ===\n", date.format("%A"));
    for meal in &summary.meals {
        let meal_label = meal.meal_type.as_str().to_uppercase();
        let name = meal.recipe_name.as_deref().unwrap_or("(no recipe)");
        let cal = meal.calories.unwrap_or(0);
        let mark = if meal.is_eaten { "x" } else { " " };
        let id = meal.id;
        println!("  [{mark}] [{id}] {meal_label:<9} {name} ({cal} kcal)");
    }
    println!();

    let planned = &summary.planned;
    let eaten = &summary.eaten;
    println!(
        "  PLANNED: {} kcal | P:{}g C:{}g F:{}g",
        planned.calories, planned.protein_g, planned.carbs_g, planned.fat_g
    );
    println!(
        "  EATEN:   {} kcal | P:{}g C:{}g F:{}g",
        eaten.calories, eaten.protein_g, eaten.carbs_g, eaten.fat_g
    );

    if let Some(target) = &summary.target {
        let (tcal, tp, tc, tf) = (target.calories, target.protein_g, target.carbs_g, target.fat_g);
        println!("  TARGET:  {tcal} kcal | P:{tp}g C:{tc}g F:{tf}g");
        let rcal = tcal - eaten.calories;
        let rp = tp - eaten.protein_g;
        let rc = tc - eaten.carbs_g;
        let rf = tf - eaten.fat_g;
        println!("  REMAINING: {rcal} kcal | P:{rp}g C:{rc}g F:{rf}g");
    }

    Ok(())
}

pub(crate) fn cmd_reset(service: &PlannerService, yes: bool, json: bool) -> Result<()> {
    if !yes && !confirm("Delete ALL plans, recipes, grocery lists and your profile?")? {
        eprintln!("Aborted");
        return Ok(());
    }
    service.reset_all_data()?;
    if json {
        println!("{}", serde_json::json!({ "reset": true }));
    } else {
        println!("All data deleted.");
    }
    Ok(())
}
