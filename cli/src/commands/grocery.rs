use anyhow::{Context, Result};
use std::process;

use plateplan_core::models::{GroceryCategory, GroceryList};
use plateplan_core::service::PlannerService;

use super::helpers::{format_quantity, json_error};

/// Resolve an explicit plan id or fall back to the active plan.
fn resolve_plan(service: &PlannerService, plan_id: Option<i64>) -> Result<i64> {
    match plan_id {
        Some(id) => Ok(id),
        None => service
            .active_plan()?
            .map(|detail| detail.plan.id)
            .context("No active plan. Generate one with: plateplan plan generate"),
    }
}

fn print_grocery_list(list: &GroceryList) {
    let total = list.items.len();
    let remaining = list.remaining();
    println!("=== Grocery list ({remaining} of {total} left) ===");

    for category in GroceryCategory::ALL {
        let items: Vec<_> = list.items.iter().filter(|i| i.category == *category).collect();
        if items.is_empty() {
            continue;
        }
        println!("\n  {}", category.label().to_uppercase());
        for item in items {
            let mark = if item.is_checked { "x" } else { " " };
            let lock = if item.is_locked { " (locked)" } else { "" };
            let qty = format_quantity(item.quantity);
            let (id, unit, name) = (item.id, item.unit, &item.name);
            println!("    [{mark}] [{id}] {name} - {qty} {unit}{lock}");
        }
    }
}

pub(crate) fn cmd_grocery_build(
    service: &PlannerService,
    plan_id: Option<i64>,
    json: bool,
) -> Result<()> {
    let plan_id = resolve_plan(service, plan_id)?;
    let list = service.build_grocery_list(plan_id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        print_grocery_list(&list);
    }
    Ok(())
}

pub(crate) fn cmd_grocery_show(
    service: &PlannerService,
    plan_id: Option<i64>,
    json: bool,
) -> Result<()> {
    let plan_id = resolve_plan(service, plan_id)?;
    let Some(list) = service.grocery_list(plan_id)? else {
        if json {
            println!("{}", json_error("No grocery list for this plan"));
        } else {
            eprintln!("No grocery list yet. Build one with: plateplan grocery build");
        }
        process::exit(2);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        print_grocery_list(&list);
    }
    Ok(())
}

pub(crate) fn cmd_grocery_check(
    service: &PlannerService,
    item_id: i64,
    undo: bool,
    json: bool,
) -> Result<()> {
    let item = service.set_grocery_item_checked(item_id, !undo)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else if item.is_checked {
        println!("Checked off {}", item.name);
    } else {
        println!("Unchecked {}", item.name);
    }
    Ok(())
}

pub(crate) fn cmd_grocery_lock(
    service: &PlannerService,
    item_id: i64,
    undo: bool,
    json: bool,
) -> Result<()> {
    let item = service.set_grocery_item_locked(item_id, !undo)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else if item.is_locked {
        println!("Locked {}; rebuilds will keep it as-is", item.name);
    } else {
        println!("Unlocked {}", item.name);
    }
    Ok(())
}
