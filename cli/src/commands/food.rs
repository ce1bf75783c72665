use anyhow::Result;
use std::process;

use fitlog_core::models::NewFoodEntry;

use super::AppSession;
use super::helpers::{json_error, parse_date, resolve_id, short_id};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_food_add(
    session: &mut AppSession<'_>,
    name: &str,
    carbs: f64,
    protein: f64,
    fat: f64,
    calories: Option<f64>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let mut entry = NewFoodEntry::from_macros(name, carbs, protein, fat);
    if let Some(calories) = calories {
        entry.calories = calories;
    }

    let created = session.add_food_entry(date, &entry)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&created)?);
    } else {
        let log = session.log(date);
        println!(
            "Logged {} ({:.0} kcal | C:{:.0}g P:{:.0}g F:{:.0}g) for {date} [{}]",
            created.name,
            created.calories,
            created.carbs,
            created.protein,
            created.fat,
            short_id(&created.id)
        );
        println!(
            "  Day total: {:.0} / {:.0} kcal",
            log.calories_intake,
            log.plan().target_calories()
        );
    }

    Ok(())
}

pub(crate) fn cmd_food_rm(
    session: &mut AppSession<'_>,
    id: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let full_id = {
        let log = session.log(date);
        resolve_id(id, log.entries.iter().map(|e| e.id.as_str()))
    }
    .unwrap_or_else(|| id.to_string());

    if !session.remove_food_entry(date, &full_id)? {
        let message = format!("No food entry '{id}' on {date}");
        if json {
            println!("{}", json_error(&message));
        } else {
            eprintln!("{message}");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::json!({ "deleted": full_id, "date": date }));
    } else {
        let log = session.log(date);
        println!(
            "Deleted food entry {} ({date} now {:.0} kcal)",
            short_id(&full_id),
            log.calories_intake
        );
    }

    Ok(())
}
