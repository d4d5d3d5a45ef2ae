use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use plateplan_core::mapping::UnmappedValue;
use plateplan_core::models::{
    GroceryCategory, MeasurementUnit, NewIngredient, NewIngredientLine, PlanDetail, Recipe,
    normalize_ingredient_name,
};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Parse `name:quantity:unit[:category]` into an ingredient line.
///
/// Units and categories go through the same synonym tables as generated
/// recipes, but unknown values are rejected here instead of falling back.
pub(crate) fn parse_ingredient_line(s: &str) -> Result<NewIngredientLine> {
    let parts: Vec<&str> = s.split(':').map(str::trim).collect();
    if parts.len() < 3 || parts.len() > 4 || parts[0].is_empty() {
        bail!("Invalid ingredient '{s}'. Use 'name:quantity:unit[:category]' (e.g. 'Rice:200:g:grains')");
    }
    let name = parts[0];
    let quantity: f64 = parts[1]
        .parse()
        .with_context(|| format!("Invalid quantity '{}' in '{s}'", parts[1]))?;
    if quantity <= 0.0 {
        bail!("Quantity must be greater than 0");
    }
    let unit = MeasurementUnit::match_synonym(parts[2])
        .with_context(|| format!("Unknown unit '{}' in '{s}'", parts[2]))?;
    let category = match parts.get(3) {
        Some(raw) => GroceryCategory::match_synonym(raw)
            .with_context(|| format!("Unknown category '{raw}' in '{s}'"))?,
        None => GroceryCategory::Other,
    };
    Ok(NewIngredientLine {
        ingredient: NewIngredient {
            name: name.to_string(),
            normalized_name: normalize_ingredient_name(name),
            category,
            default_unit: unit,
        },
        quantity,
        unit,
        notes: None,
    })
}

pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N]: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub(crate) fn format_quantity(qty: f64) -> String {
    if qty.fract().abs() < f64::EPSILON {
        format!("{qty:.0}")
    } else {
        let s = format!("{qty:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Report wire values that were replaced by a default during mapping.
pub(crate) fn warn_unmapped(unmapped: &[UnmappedValue]) {
    for u in unmapped {
        let (field, value, fallback) = (u.field, &u.value, &u.fallback);
        eprintln!("Note: unrecognized {field} '{value}', using '{fallback}'");
    }
}

pub(crate) fn print_recipe_table(recipes: &[Recipe]) {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Source")]
        source: String,
        #[tabled(rename = "Fav")]
        favorite: String,
        #[tabled(rename = "Kcal")]
        calories: i64,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "C")]
        carbs: String,
        #[tabled(rename = "F")]
        fat: String,
        #[tabled(rename = "Time")]
        time: String,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id,
            name: truncate(&r.name, 35),
            source: r.source.to_string(),
            favorite: if r.is_favorite { "*".into() } else { String::new() },
            calories: r.calories,
            protein: format!("{}g", r.protein_g),
            carbs: format!("{}g", r.carbs_g),
            fat: format!("{}g", r.fat_g),
            time: format!("{} min", r.total_time_min()),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_plan(detail: &PlanDetail) {
    let plan = &detail.plan;
    let (start, end) = (plan.week_start_date, detail.end_date);
    let status = if plan.is_active { "active" } else { "inactive" };
    println!("=== Plan {} ({start} to {end}, {status}) ===\n", plan.id);

    for day in &detail.days {
        let date = day.day.date;
        let weekday = date.format("%A");
        println!("  {weekday} {date}");
        if day.meals.is_empty() {
            println!("    (no meals)");
        }
        for meal in &day.meals {
            let id = meal.id;
            let meal_type = meal.meal_type.as_str().to_uppercase();
            let name = meal.recipe_name.as_deref().unwrap_or("(no recipe)");
            let cal = meal.calories.unwrap_or(0);
            let eaten = if meal.is_eaten { " [eaten]" } else { "" };
            println!("    [{id}] {meal_type:<9} {name} ({cal} kcal){eaten}");
        }
        println!();
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
