use anyhow::Result;
use std::process;

use plateplan_core::models::{CuisinePreference, UserProfile};
use plateplan_core::service::PlannerService;

use super::helpers::json_error;

/// Fields accepted by `profile set`. Anything left `None` keeps its stored value.
#[derive(Debug, Default)]
pub(crate) struct ProfileUpdate {
    pub age: Option<i64>,
    pub sex: Option<String>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub activity: Option<String>,
    pub goal: Option<String>,
    pub restrictions: Option<Vec<String>>,
    pub allergies: Option<Vec<String>>,
    pub dislikes: Option<Vec<String>>,
    pub skill: Option<String>,
    pub max_time: Option<i64>,
    pub pantry: Option<String>,
}

impl ProfileUpdate {
    fn apply(self, profile: &mut UserProfile) -> Result<()> {
        if let Some(age) = self.age {
            profile.age = age;
        }
        if let Some(sex) = self.sex {
            profile.sex = sex.parse()?;
        }
        if let Some(weight) = self.weight {
            profile.weight_kg = weight;
        }
        if let Some(height) = self.height {
            profile.height_cm = height;
        }
        if let Some(activity) = self.activity {
            profile.activity_level = activity.parse()?;
        }
        if let Some(goal) = self.goal {
            profile.goal = goal.parse()?;
        }
        if let Some(list) = self.restrictions {
            profile.dietary_restrictions = clean_list(list);
        }
        if let Some(list) = self.allergies {
            profile.allergies = clean_list(list);
        }
        if let Some(list) = self.dislikes {
            profile.dislikes = clean_list(list);
        }
        if let Some(skill) = self.skill {
            profile.cooking_skill = skill.parse()?;
        }
        if let Some(max_time) = self.max_time {
            profile.max_cooking_time_min = max_time;
        }
        if let Some(pantry) = self.pantry {
            profile.pantry_level = pantry.parse()?;
        }
        Ok(())
    }
}

fn clean_list(list: Vec<String>) -> Vec<String> {
    list.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn print_profile(profile: &UserProfile) {
    let targets = profile.macro_targets();
    let join = |list: &[String]| {
        if list.is_empty() {
            "-".to_string()
        } else {
            list.join(", ")
        }
    };
    let mut liked = profile.cuisines_tagged(CuisinePreference::Like);
    let mut disliked = profile.cuisines_tagged(CuisinePreference::Dislike);
    liked.sort();
    disliked.sort();

    println!("  Age:            {}", profile.age);
    println!("  Sex:            {}", profile.sex);
    println!("  Weight:         {:.1} kg", profile.weight_kg);
    println!("  Height:         {:.1} cm", profile.height_cm);
    println!("  Activity:       {}", profile.activity_level);
    println!("  Goal:           {}", profile.goal);
    println!("  Restrictions:   {}", join(&profile.dietary_restrictions));
    println!("  Allergies:      {}", join(&profile.allergies));
    println!("  Dislikes:       {}", join(&profile.dislikes));
    println!("  Likes cuisines: {}", join(&liked));
    println!("  Avoids:         {}", join(&disliked));
    println!("  Cooking skill:  {}", profile.cooking_skill);
    println!("  Max cook time:  {} min", profile.max_cooking_time_min);
    println!("  Pantry:         {}", profile.pantry_level);
    println!();
    let (cal, p, c, f) = (targets.calories, targets.protein_g, targets.carbs_g, targets.fat_g);
    println!("  DAILY TARGET: {cal} kcal | P:{p}g C:{c}g F:{f}g");
}

pub(crate) fn cmd_profile_show(service: &PlannerService, json: bool) -> Result<()> {
    let Some(profile) = service.get_profile()? else {
        if json {
            println!("{}", json_error("No profile found"));
        } else {
            eprintln!("No profile found. Create one with: plateplan profile set --age 30 ...");
        }
        process::exit(2);
    };

    if json {
        #[derive(serde::Serialize)]
        struct ProfileView<'a> {
            #[serde(flatten)]
            profile: &'a UserProfile,
            targets: plateplan_core::models::MacroTargets,
        }
        let view = ProfileView {
            profile: &profile,
            targets: profile.macro_targets(),
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    print_profile(&profile);
    Ok(())
}

pub(crate) fn cmd_profile_set(
    service: &PlannerService,
    update: ProfileUpdate,
    json: bool,
) -> Result<()> {
    let mut profile = service.get_profile()?.unwrap_or_default();
    update.apply(&mut profile)?;
    let saved = service.save_profile(&profile)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    } else {
        println!("Profile saved.\n");
        print_profile(&saved);
    }
    Ok(())
}

pub(crate) fn cmd_profile_cuisine(
    service: &PlannerService,
    cuisine: &str,
    preference: &str,
    json: bool,
) -> Result<()> {
    let preference: CuisinePreference = preference.parse()?;
    let profile = service.set_cuisine_preference(cuisine, preference)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&profile.cuisine_preferences)?
        );
    } else {
        println!("Cuisine '{cuisine}' set to {preference}");
    }
    Ok(())
}
