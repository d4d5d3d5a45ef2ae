use anyhow::Result;
use std::process;

use plateplan_core::catalog::CatalogSource;
use plateplan_core::service::PlannerService;

use super::helpers::print_recipe_table;

pub(crate) async fn cmd_catalog_sync(
    service: &PlannerService,
    source: &dyn CatalogSource,
    page_size: usize,
    pages: usize,
    restart: bool,
    json: bool,
) -> Result<()> {
    if restart {
        service.reset_catalog_cursor()?;
    }
    let summary = service.sync_catalog(source, page_size, pages).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let (inserted, updated, pages) = (summary.inserted, summary.updated, summary.pages);
    println!("Synced {pages} page(s): {inserted} new, {updated} updated");
    if summary.exhausted {
        println!("Catalog fully synced.");
    } else if let Some(cursor) = &summary.cursor {
        println!("More recipes remain; next sync resumes after {cursor}");
    }
    Ok(())
}

pub(crate) async fn cmd_catalog_search(
    service: &PlannerService,
    source: &dyn CatalogSource,
    query: &str,
    limit: usize,
    json: bool,
) -> Result<()> {
    let recipes = service.search_catalog(source, query, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }

    if recipes.is_empty() {
        eprintln!("No catalog recipes match '{query}'");
        process::exit(2);
    }
    print_recipe_table(&recipes);
    Ok(())
}
