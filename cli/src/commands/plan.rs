use anyhow::{Result, bail};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use plateplan_core::service::{GenerateOptions, PlannerService};
use plateplan_core::transport::PlanTransport;

use super::helpers::{json_error, parse_date, print_plan, warn_unmapped};

pub(crate) async fn cmd_plan_generate(
    service: &PlannerService,
    transport: &dyn PlanTransport,
    options: GenerateOptions,
    json: bool,
) -> Result<()> {
    if !(1..=14).contains(&options.duration) {
        bail!("Plan duration must be between 1 and 14 days");
    }
    if !json {
        eprintln!(
            "Generating a {}-day plan from {}...",
            options.duration, options.start_date
        );
    }

    let generated = service.generate_plan(transport, &options).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&generated)?);
        return Ok(());
    }

    warn_unmapped(&generated.unmapped);
    print_plan(&generated.plan);

    let outcome = &generated.outcome;
    let deactivated = outcome.reconcile.deactivated_plans.len();
    if deactivated > 0 {
        let moved = outcome.reconcile.moved_days;
        println!("Replaced {deactivated} older plan(s); carried over {moved} day(s).");
    }
    if outcome.orphans_removed > 0 {
        let n = outcome.orphans_removed;
        println!("Removed {n} unused recipe(s).");
    }
    if outcome.catalog_cursor_reset {
        println!("Catalog recipes were removed; the next `catalog sync` starts from the beginning.");
    }
    Ok(())
}

/// Show one plan by id, or the active plan.
pub(crate) fn cmd_plan_show(service: &PlannerService, plan_id: Option<i64>, json: bool) -> Result<()> {
    let detail = match plan_id {
        Some(id) => service.get_plan_detail(id)?,
        None => {
            let Some(detail) = service.active_plan()? else {
                if json {
                    println!("{}", json_error("No active plan"));
                } else {
                    eprintln!("No active plan. Generate one with: plateplan plan generate");
                }
                process::exit(2);
            };
            detail
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        print_plan(&detail);
    }
    Ok(())
}

pub(crate) fn cmd_plan_list(service: &PlannerService, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Start")]
        start: String,
        #[tabled(rename = "End")]
        end: String,
        #[tabled(rename = "Days")]
        days: i64,
        #[tabled(rename = "Active")]
        active: String,
        #[tabled(rename = "Created")]
        created: String,
    }

    let plans = service.list_plans()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    if plans.is_empty() {
        eprintln!("No plans yet");
        process::exit(2);
    }

    let rows: Vec<PlanRow> = plans
        .iter()
        .map(|p| PlanRow {
            id: p.id,
            start: p.week_start_date.to_string(),
            end: p.end_date().to_string(),
            days: p.plan_duration,
            active: if p.is_active { "yes".into() } else { String::new() },
            created: p.created_at.chars().take(10).collect(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

/// Build generation options from CLI arguments.
#[allow(clippy::too_many_arguments)]
pub(crate) fn generate_options(
    start: Option<String>,
    days: i64,
    preferences: Option<String>,
    calories: Option<i64>,
    protein: Option<i64>,
    carbs: Option<i64>,
    fat: Option<i64>,
    exclude: Vec<String>,
) -> Result<GenerateOptions> {
    let mut options = GenerateOptions::new(parse_date(start)?, days);
    options.weekly_preferences = preferences;
    options.overrides.calories = calories;
    options.overrides.protein_g = protein;
    options.overrides.carbs_g = carbs;
    options.overrides.fat_g = fat;
    options.excluded_recipes = exclude;
    Ok(options)
}
