use anyhow::Result;
use std::process;

use plateplan_core::models::{Complexity, CuisineType, NewIngredientLine, NewRecipe, RecipeSource};
use plateplan_core::service::PlannerService;

use super::helpers::{format_quantity, json_error, parse_ingredient_line, print_recipe_table};

/// Arguments for `recipe create`.
#[derive(Debug)]
pub(crate) struct RecipeInput {
    pub name: String,
    pub description: Option<String>,
    pub steps: Vec<String>,
    pub prep: i64,
    pub cook: i64,
    pub servings: i64,
    pub complexity: String,
    pub cuisine: Option<String>,
    pub calories: i64,
    pub protein: i64,
    pub carbs: i64,
    pub fat: i64,
    pub ingredients: Vec<String>,
}

impl RecipeInput {
    fn into_records(self) -> Result<(NewRecipe, Vec<NewIngredientLine>)> {
        let complexity: Complexity = self.complexity.parse()?;
        let cuisine: Option<CuisineType> = self.cuisine.as_deref().map(str::parse).transpose()?;
        let lines = self
            .ingredients
            .iter()
            .map(|s| parse_ingredient_line(s))
            .collect::<Result<Vec<_>>>()?;
        let recipe = NewRecipe {
            external_id: None,
            name: self.name,
            description: self.description.unwrap_or_default(),
            instructions: self.steps,
            prep_time_min: self.prep,
            cook_time_min: self.cook,
            servings: self.servings.max(1),
            complexity,
            cuisine,
            calories: self.calories,
            protein_g: self.protein,
            carbs_g: self.carbs,
            fat_g: self.fat,
            image_url: None,
            source: RecipeSource::Custom,
        };
        Ok((recipe, lines))
    }
}

pub(crate) fn cmd_recipe_create(
    service: &PlannerService,
    input: RecipeInput,
    json: bool,
) -> Result<()> {
    let (recipe, lines) = input.into_records()?;
    let detail = service.create_custom_recipe(&recipe, &lines)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        let (id, name) = (detail.recipe.id, &detail.recipe.name);
        let n = detail.ingredients.len();
        println!("Created recipe: {name} (id: {id}, {n} ingredients)");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_list(
    service: &PlannerService,
    favorites: bool,
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    let recipes = service.list_recipes(favorites, search)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }

    if recipes.is_empty() {
        eprintln!("No recipes found");
        process::exit(2);
    }
    print_recipe_table(&recipes);
    Ok(())
}

pub(crate) fn cmd_recipe_show(service: &PlannerService, recipe_id: i64, json: bool) -> Result<()> {
    let detail = service.get_recipe_detail(recipe_id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let recipe = &detail.recipe;
    let fav = if recipe.is_favorite { " *" } else { "" };
    println!("=== {}{fav} ===", recipe.name);
    if !recipe.description.is_empty() {
        println!("{}", recipe.description);
    }
    let cuisine = recipe
        .cuisine
        .map(|c| format!(" | {c}"))
        .unwrap_or_default();
    println!(
        "{} | {} min (prep {} + cook {}) | serves {}{cuisine} | {}",
        recipe.complexity,
        detail.total_time_min,
        recipe.prep_time_min,
        recipe.cook_time_min,
        recipe.servings,
        recipe.source,
    );
    let (cal, p, c, f) = (recipe.calories, recipe.protein_g, recipe.carbs_g, recipe.fat_g);
    println!("{cal} kcal | P:{p}g C:{c}g F:{f}g\n");

    if !detail.ingredients.is_empty() {
        println!("  INGREDIENTS");
        for ing in &detail.ingredients {
            let qty = format_quantity(ing.quantity);
            let (unit, name) = (ing.unit, &ing.ingredient_name);
            println!("    - {qty} {unit} {name}");
        }
        println!();
    }
    if !recipe.instructions.is_empty() {
        println!("  STEPS");
        for (i, step) in recipe.instructions.iter().enumerate() {
            println!("    {}. {step}", i + 1);
        }
    }
    Ok(())
}

pub(crate) fn cmd_recipe_favorite(
    service: &PlannerService,
    recipe_id: i64,
    remove: bool,
    json: bool,
) -> Result<()> {
    let recipe = service.set_recipe_favorite(recipe_id, !remove)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else if recipe.is_favorite {
        println!("Added {} to favorites", recipe.name);
    } else {
        println!("Removed {} from favorites", recipe.name);
    }
    Ok(())
}

pub(crate) fn cmd_recipe_delete(service: &PlannerService, recipe_id: i64, json: bool) -> Result<()> {
    if service.delete_recipe(recipe_id)? {
        if json {
            println!("{}", serde_json::json!({ "deleted": recipe_id }));
        } else {
            println!("Deleted recipe {recipe_id}");
        }
    } else {
        if json {
            println!("{}", json_error(&format!("Recipe {recipe_id} not found")));
        } else {
            eprintln!("Recipe {recipe_id} not found");
        }
        process::exit(2);
    }
    Ok(())
}
