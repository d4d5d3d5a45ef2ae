//! Remote recipe catalog: paged sync and two-stage search.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::error::CatalogError;
use crate::mapping::{RecipePayload, map_recipe};
use crate::models::{Recipe, RecipeSource};

const CURSOR_KEY: &str = "catalog_cursor";

/// A catalog document: the recipe body plus its document id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecipe {
    pub id: String,
    #[serde(flatten)]
    pub recipe: RecipePayload,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPage {
    pub recipes: Vec<CatalogRecipe>,
    /// Id of the last document on this page; `None` once the catalog is exhausted.
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// Remote recipe store.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Page of recipes ordered by document id, starting after `after`.
    async fn fetch_page(&self, after: Option<&str>, limit: usize) -> Result<CatalogPage, CatalogError>;
    /// Recipes whose name starts with `query`.
    async fn search_prefix(&self, query: &str, limit: usize) -> Result<Vec<CatalogRecipe>, CatalogError>;
    /// Broad scan for `query` anywhere in the name.
    async fn search_scan(&self, query: &str, limit: usize) -> Result<Vec<CatalogRecipe>, CatalogError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogSyncSummary {
    pub pages: usize,
    pub inserted: usize,
    pub updated: usize,
    pub cursor: Option<String>,
    pub exhausted: bool,
}

fn store(db: &Database, doc: &CatalogRecipe) -> anyhow::Result<(Recipe, bool)> {
    let mut mapped = map_recipe(&doc.recipe, RecipeSource::Catalog);
    mapped.recipe.external_id = Some(doc.id.clone());
    db.upsert_recipe_by_external_id(&mapped.recipe, &mapped.ingredients)
}

/// Pull up to `max_pages` pages after the stored cursor and cache them locally.
///
/// The cursor is persisted after every page, so an interrupted sync resumes
/// where it stopped.
pub async fn sync_catalog(
    db: &std::sync::Mutex<Database>,
    source: &dyn CatalogSource,
    page_size: usize,
    max_pages: usize,
) -> Result<CatalogSyncSummary, CatalogError> {
    let mut summary = CatalogSyncSummary {
        cursor: lock(db).get_setting(CURSOR_KEY)?,
        ..CatalogSyncSummary::default()
    };

    while summary.pages < max_pages {
        let page = source
            .fetch_page(summary.cursor.as_deref(), page_size)
            .await?;
        summary.pages += 1;

        {
            let db = lock(db);
            db.in_transaction(|db| {
                for doc in &page.recipes {
                    let (_, inserted) = store(db, doc)?;
                    if inserted {
                        summary.inserted += 1;
                    } else {
                        summary.updated += 1;
                    }
                }
                if let Some(cursor) = &page.next_cursor {
                    db.set_setting(CURSOR_KEY, cursor)?;
                }
                Ok(())
            })?;
        }

        match page.next_cursor {
            Some(cursor) if !page.recipes.is_empty() => summary.cursor = Some(cursor),
            _ => {
                summary.exhausted = true;
                break;
            }
        }
    }

    tracing::info!(
        pages = summary.pages,
        inserted = summary.inserted,
        updated = summary.updated,
        "catalog sync finished"
    );
    Ok(summary)
}

/// Search the catalog by prefix, then by broad scan, caching every hit.
///
/// Prefix hits come first; scan hits already returned by the prefix query are
/// dropped.
pub async fn search_catalog(
    db: &std::sync::Mutex<Database>,
    source: &dyn CatalogSource,
    query: &str,
    limit: usize,
) -> Result<Vec<Recipe>, CatalogError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let mut docs = source.search_prefix(query, limit).await?;
    let scanned = source.search_scan(query, limit).await?;

    let mut seen: HashSet<String> = docs.iter().map(|d| d.id.clone()).collect();
    for doc in scanned {
        if seen.insert(doc.id.clone()) {
            docs.push(doc);
        }
    }
    docs.truncate(limit);

    let db = lock(db);
    let recipes = db.in_transaction(|db| {
        docs.iter()
            .map(|doc| store(db, doc).map(|(recipe, _)| recipe))
            .collect::<anyhow::Result<Vec<_>>>()
    })?;
    Ok(recipes)
}

/// Forget the sync cursor so the next sync starts from the first page.
pub fn reset_catalog_cursor(db: &Database) -> anyhow::Result<bool> {
    db.delete_setting(CURSOR_KEY)
}

fn lock(db: &std::sync::Mutex<Database>) -> std::sync::MutexGuard<'_, Database> {
    db.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn doc(id: &str, name: &str) -> CatalogRecipe {
        CatalogRecipe {
            id: id.to_string(),
            recipe: serde_json::from_value(serde_json::json!({
                "name": name,
                "instructions": ["Cook"],
                "prepTime": 5,
                "cookTime": 10,
                "servings": 2,
                "complexity": "easy",
                "calories": 450,
                "protein": 25,
                "carbs": 50,
                "fat": 14,
                "ingredients": [{"name": "Tofu", "quantity": 200, "unit": "g", "category": "protein"}]
            }))
            .unwrap(),
        }
    }

    struct FakeCatalog {
        docs: Vec<CatalogRecipe>,
    }

    #[async_trait]
    impl CatalogSource for FakeCatalog {
        async fn fetch_page(
            &self,
            after: Option<&str>,
            limit: usize,
        ) -> Result<CatalogPage, CatalogError> {
            let start = after
                .and_then(|a| self.docs.iter().position(|d| d.id == a))
                .map_or(0, |p| p + 1);
            let recipes: Vec<_> = self.docs.iter().skip(start).take(limit).cloned().collect();
            let next_cursor = recipes.last().map(|d| d.id.clone());
            Ok(CatalogPage {
                recipes,
                next_cursor,
            })
        }

        async fn search_prefix(
            &self,
            query: &str,
            limit: usize,
        ) -> Result<Vec<CatalogRecipe>, CatalogError> {
            let q = query.to_lowercase();
            Ok(self
                .docs
                .iter()
                .filter(|d| d.recipe.name.to_lowercase().starts_with(&q))
                .take(limit)
                .cloned()
                .collect())
        }

        async fn search_scan(
            &self,
            query: &str,
            limit: usize,
        ) -> Result<Vec<CatalogRecipe>, CatalogError> {
            let q = query.to_lowercase();
            Ok(self
                .docs
                .iter()
                .filter(|d| d.recipe.name.to_lowercase().contains(&q))
                .take(limit)
                .cloned()
                .collect())
        }
    }

    fn catalog() -> FakeCatalog {
        FakeCatalog {
            docs: vec![
                doc("a1", "Tofu Scramble"),
                doc("a2", "Crispy Tofu Bowl"),
                doc("a3", "Mapo Tofu"),
                doc("a4", "Tomato Soup"),
                doc("a5", "Tofu Tacos"),
            ],
        }
    }

    #[tokio::test]
    async fn test_sync_pages_and_persists_cursor() {
        let db = Mutex::new(Database::open_in_memory().unwrap());
        let source = catalog();

        let summary = sync_catalog(&db, &source, 2, 2).await.unwrap();
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.inserted, 4);
        assert_eq!(summary.cursor.as_deref(), Some("a4"));
        assert!(!summary.exhausted);

        // Resumes after the stored cursor
        let summary = sync_catalog(&db, &source, 2, 5).await.unwrap();
        assert_eq!(summary.inserted, 1);
        assert!(summary.exhausted);

        let db = db.lock().unwrap();
        let recipe = db.get_recipe_by_external_id("a3").unwrap().unwrap();
        assert_eq!(recipe.source, RecipeSource::Catalog);
        assert_eq!(recipe.calories, 450);
    }

    #[tokio::test]
    async fn test_resync_updates_instead_of_duplicating() {
        let db = Mutex::new(Database::open_in_memory().unwrap());
        let source = catalog();
        sync_catalog(&db, &source, 10, 1).await.unwrap();
        reset_catalog_cursor(&db.lock().unwrap()).unwrap();

        let summary = sync_catalog(&db, &source, 10, 1).await.unwrap();
        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.updated, 5);
        assert_eq!(db.lock().unwrap().list_recipes(false, None).unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_search_prefix_first_then_scan_deduped() {
        let db = Mutex::new(Database::open_in_memory().unwrap());
        let results = search_catalog(&db, &catalog(), "tofu", 10).await.unwrap();

        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Tofu Scramble", "Tofu Tacos", "Crispy Tofu Bowl", "Mapo Tofu"]
        );
        // cached locally
        assert_eq!(db.lock().unwrap().list_recipes(false, Some("tofu")).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_blank_search_is_empty() {
        let db = Mutex::new(Database::open_in_memory().unwrap());
        assert!(search_catalog(&db, &catalog(), "  ", 10).await.unwrap().is_empty());
    }
}
