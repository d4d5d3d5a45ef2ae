mod api;
mod catalog_client;
mod commands;
mod config;
mod server;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::api::HttpPlanTransport;
use crate::catalog_client::HttpCatalogClient;
use crate::commands::{
    ProfileUpdate, RecipeInput, cmd_catalog_search, cmd_catalog_sync, cmd_grocery_build,
    cmd_grocery_check, cmd_grocery_lock, cmd_grocery_show, cmd_meal_eat, cmd_meal_swap,
    cmd_meal_uneat, cmd_plan_generate, cmd_plan_list, cmd_plan_show, cmd_profile_cuisine,
    cmd_profile_set, cmd_profile_show, cmd_recipe_create, cmd_recipe_delete, cmd_recipe_favorite,
    cmd_recipe_list, cmd_recipe_show, cmd_reset, cmd_summary, generate_options,
};
use crate::config::Config;
use plateplan_core::service::PlannerService;
use plateplan_core::transport::{MockTransport, PlanTransport};

#[derive(Parser)]
#[command(
    name = "plateplan",
    version,
    about = "A local-first meal planner with generated weekly plans"
)]
struct Cli {
    /// Use the built-in offline generator instead of the remote service
    #[arg(long, global = true)]
    mock: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// View or edit your profile and dietary preferences
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Generate and browse meal plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Swap meals or mark them eaten
    Meal {
        #[command(subcommand)]
        command: MealCommands,
    },
    /// Manage saved recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Sync and search the remote recipe catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
    /// Build and tick off the grocery list for a plan
    Grocery {
        #[command(subcommand)]
        command: GroceryCommands,
    },
    /// Show planned vs eaten macros for a day
    Summary {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all local data, including the profile
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show the profile and computed daily targets
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create or update the profile (unset fields keep their value)
    Set {
        #[arg(long)]
        age: Option<i64>,
        /// male or female
        #[arg(long)]
        sex: Option<String>,
        /// Weight in kg
        #[arg(long)]
        weight: Option<f64>,
        /// Height in cm
        #[arg(long)]
        height: Option<f64>,
        /// sedentary, light, moderate, active, very_active
        #[arg(long)]
        activity: Option<String>,
        /// lose, maintain, gain
        #[arg(long)]
        goal: Option<String>,
        /// Comma-separated dietary restrictions (e.g. "vegetarian,gluten-free")
        #[arg(long, value_delimiter = ',')]
        restrictions: Option<Vec<String>>,
        /// Comma-separated allergies
        #[arg(long, value_delimiter = ',')]
        allergies: Option<Vec<String>>,
        /// Comma-separated disliked foods
        #[arg(long, value_delimiter = ',')]
        dislikes: Option<Vec<String>>,
        /// beginner, intermediate, advanced
        #[arg(long)]
        skill: Option<String>,
        /// Maximum cooking time per meal in minutes
        #[arg(long)]
        max_time: Option<i64>,
        /// minimal, average, well_stocked
        #[arg(long)]
        pantry: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a cuisine as liked, disliked or neutral
    Cuisine {
        /// Cuisine name (e.g. italian, middle_eastern)
        cuisine: String,
        /// like, dislike or neutral
        preference: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Generate a new plan; older active plans are folded into it
    Generate {
        /// First day of the plan (default: today)
        #[arg(long)]
        start: Option<String>,
        /// Number of days
        #[arg(short, long, default_value = "7")]
        days: i64,
        /// Free-text wishes for this plan (e.g. "more fish, quick lunches")
        #[arg(long)]
        preferences: Option<String>,
        /// Override the daily calorie target
        #[arg(long)]
        calories: Option<i64>,
        /// Override the daily protein target (g)
        #[arg(long)]
        protein: Option<i64>,
        /// Override the daily carbs target (g)
        #[arg(long)]
        carbs: Option<i64>,
        /// Override the daily fat target (g)
        #[arg(long)]
        fat: Option<i64>,
        /// Recipe name to avoid (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a plan (default: the active plan)
    Show {
        /// Plan ID
        id: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all plans
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MealCommands {
    /// Replace a meal's recipe with a freshly generated one
    Swap {
        /// Meal ID
        id: i64,
        /// Recipe name to avoid (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a meal as eaten
    Eat {
        /// Meal ID
        id: i64,
        /// When it was eaten (RFC 3339, default: now)
        #[arg(long)]
        at: Option<String>,
        /// Health record identifier to attach (repeatable)
        #[arg(long = "health-id")]
        health_ids: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a meal as not eaten
    Uneat {
        /// Meal ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// List saved recipes
    List {
        /// Only favorites
        #[arg(short, long)]
        favorites: bool,
        /// Filter by name
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe with ingredients and steps
    Show {
        /// Recipe ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add or remove a recipe from favorites (favorites survive cleanup)
    Favorite {
        /// Recipe ID
        id: i64,
        /// Remove from favorites instead
        #[arg(long)]
        remove: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a custom recipe
    Create {
        /// Recipe name
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Instruction step (repeatable, in order)
        #[arg(long = "step")]
        steps: Vec<String>,
        /// Prep time in minutes
        #[arg(long, default_value = "0")]
        prep: i64,
        /// Cook time in minutes
        #[arg(long, default_value = "0")]
        cook: i64,
        #[arg(long, default_value = "1")]
        servings: i64,
        /// easy, medium or hard
        #[arg(long, default_value = "medium")]
        complexity: String,
        #[arg(long)]
        cuisine: Option<String>,
        /// Calories per serving
        #[arg(long)]
        calories: i64,
        #[arg(long, default_value = "0")]
        protein: i64,
        #[arg(long, default_value = "0")]
        carbs: i64,
        #[arg(long, default_value = "0")]
        fat: i64,
        /// Ingredient as "name:quantity:unit[:category]" (repeatable)
        #[arg(long = "ingredient")]
        ingredients: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe
    Delete {
        /// Recipe ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// Pull the next pages of the catalog into the local database
    Sync {
        /// Number of pages to fetch
        #[arg(long, default_value = "1")]
        pages: usize,
        /// Start over from the first page
        #[arg(long)]
        restart: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search the catalog by name and cache the hits
    Search {
        query: String,
        /// Maximum results
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GroceryCommands {
    /// Rebuild the grocery list from uneaten meals
    Build {
        /// Plan ID (default: the active plan)
        #[arg(long)]
        plan: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the grocery list
    Show {
        /// Plan ID (default: the active plan)
        #[arg(long)]
        plan: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check off an item
    Check {
        /// Grocery item ID
        id: i64,
        /// Uncheck instead
        #[arg(long)]
        undo: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Lock an item so rebuilds leave it alone
    Lock {
        /// Grocery item ID
        id: i64,
        /// Unlock instead
        #[arg(long)]
        undo: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn plan_transport(config: &Config, mock: bool) -> Result<Arc<dyn PlanTransport>> {
    if mock {
        return Ok(Arc::new(MockTransport::new()));
    }
    let base_url = config.api_base_url.as_deref().context(
        "No generation service configured. Set api_base_url in config.toml or PLATEPLAN_API_URL, or pass --mock",
    )?;
    let transport =
        HttpPlanTransport::new(base_url, config.api_token.clone(), config.request_timeout_secs)?;
    Ok(Arc::new(transport))
}

fn catalog_source(config: &Config) -> Result<HttpCatalogClient> {
    let base_url = config.catalog_base_url.as_deref().context(
        "No recipe catalog configured. Set catalog_base_url in config.toml or PLATEPLAN_CATALOG_URL",
    )?;
    HttpCatalogClient::new(base_url, config.api_token.clone(), config.request_timeout_secs)
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let service = PlannerService::new(&config.db_path)?;

    match cli.command {
        Commands::Profile { command } => match command {
            ProfileCommands::Show { json } => cmd_profile_show(&service, json),
            ProfileCommands::Set {
                age,
                sex,
                weight,
                height,
                activity,
                goal,
                restrictions,
                allergies,
                dislikes,
                skill,
                max_time,
                pantry,
                json,
            } => {
                let update = ProfileUpdate {
                    age,
                    sex,
                    weight,
                    height,
                    activity,
                    goal,
                    restrictions,
                    allergies,
                    dislikes,
                    skill,
                    max_time,
                    pantry,
                };
                cmd_profile_set(&service, update, json)
            }
            ProfileCommands::Cuisine {
                cuisine,
                preference,
                json,
            } => cmd_profile_cuisine(&service, &cuisine, &preference, json),
        },
        Commands::Plan { command } => match command {
            PlanCommands::Generate {
                start,
                days,
                preferences,
                calories,
                protein,
                carbs,
                fat,
                exclude,
                json,
            } => {
                let options = generate_options(
                    start,
                    days,
                    preferences,
                    calories,
                    protein,
                    carbs,
                    fat,
                    exclude,
                )?;
                let transport = plan_transport(&config, cli.mock)?;
                cmd_plan_generate(&service, transport.as_ref(), options, json).await
            }
            PlanCommands::Show { id, json } => cmd_plan_show(&service, id, json),
            PlanCommands::List { json } => cmd_plan_list(&service, json),
        },
        Commands::Meal { command } => match command {
            MealCommands::Swap { id, exclude, json } => {
                let transport = plan_transport(&config, cli.mock)?;
                cmd_meal_swap(&service, transport.as_ref(), id, &exclude, json).await
            }
            MealCommands::Eat {
                id,
                at,
                health_ids,
                json,
            } => cmd_meal_eat(&service, id, at.as_deref(), &health_ids, json),
            MealCommands::Uneat { id, json } => cmd_meal_uneat(&service, id, json),
        },
        Commands::Recipe { command } => match command {
            RecipeCommands::List {
                favorites,
                search,
                json,
            } => cmd_recipe_list(&service, favorites, search.as_deref(), json),
            RecipeCommands::Show { id, json } => cmd_recipe_show(&service, id, json),
            RecipeCommands::Favorite { id, remove, json } => {
                cmd_recipe_favorite(&service, id, remove, json)
            }
            RecipeCommands::Create {
                name,
                description,
                steps,
                prep,
                cook,
                servings,
                complexity,
                cuisine,
                calories,
                protein,
                carbs,
                fat,
                ingredients,
                json,
            } => {
                let input = RecipeInput {
                    name,
                    description,
                    steps,
                    prep,
                    cook,
                    servings,
                    complexity,
                    cuisine,
                    calories,
                    protein,
                    carbs,
                    fat,
                    ingredients,
                };
                cmd_recipe_create(&service, input, json)
            }
            RecipeCommands::Delete { id, json } => cmd_recipe_delete(&service, id, json),
        },
        Commands::Catalog { command } => {
            let client = catalog_source(&config)?;
            match command {
                CatalogCommands::Sync {
                    pages,
                    restart,
                    json,
                } => {
                    cmd_catalog_sync(
                        &service,
                        &client,
                        config.catalog_page_size,
                        pages,
                        restart,
                        json,
                    )
                    .await
                }
                CatalogCommands::Search { query, limit, json } => {
                    cmd_catalog_search(&service, &client, &query, limit, json).await
                }
            }
        }
        Commands::Grocery { command } => match command {
            GroceryCommands::Build { plan, json } => cmd_grocery_build(&service, plan, json),
            GroceryCommands::Show { plan, json } => cmd_grocery_show(&service, plan, json),
            GroceryCommands::Check { id, undo, json } => {
                cmd_grocery_check(&service, id, undo, json)
            }
            GroceryCommands::Lock { id, undo, json } => cmd_grocery_lock(&service, id, undo, json),
        },
        Commands::Summary { date, json } => cmd_summary(&service, date, json),
        Commands::Reset { yes, json } => cmd_reset(&service, yes, json),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                let (key, _) = config.load_or_create_api_key()?;
                Some(key)
            };
            let transport = plan_transport(&config, cli.mock)?;
            server::start_server(service, transport, port, &bind, api_key).await
        }
    }
}
