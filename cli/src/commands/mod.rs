mod catalog;
mod grocery;
mod helpers;
mod meal;
mod plan;
mod profile;
mod recipe;
mod summary;

pub(crate) use catalog::{cmd_catalog_search, cmd_catalog_sync};
pub(crate) use grocery::{cmd_grocery_build, cmd_grocery_check, cmd_grocery_lock, cmd_grocery_show};
pub(crate) use meal::{cmd_meal_eat, cmd_meal_swap, cmd_meal_uneat};
pub(crate) use plan::{cmd_plan_generate, cmd_plan_list, cmd_plan_show, generate_options};
pub(crate) use profile::{ProfileUpdate, cmd_profile_cuisine, cmd_profile_set, cmd_profile_show};
pub(crate) use recipe::{
    RecipeInput, cmd_recipe_create, cmd_recipe_delete, cmd_recipe_favorite, cmd_recipe_list,
    cmd_recipe_show,
};
pub(crate) use summary::{cmd_reset, cmd_summary};
