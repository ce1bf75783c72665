use anyhow::{Result, bail};
use std::process;

use fitlog_core::models::{NewWorkoutEntry, parse_weight_kg};

use super::AppSession;
use super::helpers::{json_error, parse_date, resolve_id, short_id};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_workout_add(
    session: &mut AppSession<'_>,
    exercise: &str,
    sets: i64,
    reps: i64,
    weight: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let kg = parse_weight_kg(weight);
    if kg < 0.0 {
        bail!("Weight must not be negative");
    }
    if !weight.trim().starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        eprintln!("Note: '{weight}' has no numeric load, counting as 0 kg");
    }

    let entry = NewWorkoutEntry::new(exercise, sets, reps, kg);
    let created = session.add_workout_entry(date, &entry)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&created)?);
    } else {
        let log = session.log(date);
        println!(
            "Logged {} {}x{} @ {:.1} kg (volume {:.0}) for {date} [{}]",
            created.exercise_name,
            created.sets,
            created.reps,
            created.weight,
            created.volume,
            short_id(&created.id)
        );
        println!("  Day volume: {:.0}", log.workout_volume);
    }

    Ok(())
}

pub(crate) fn cmd_workout_rm(
    session: &mut AppSession<'_>,
    id: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let full_id = {
        let log = session.log(date);
        resolve_id(id, log.workout_entries.iter().map(|e| e.id.as_str()))
    }
    .unwrap_or_else(|| id.to_string());

    if !session.remove_workout_entry(date, &full_id)? {
        let message = format!("No workout entry '{id}' on {date}");
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
            "Deleted workout entry {} ({date} volume now {:.0})",
            short_id(&full_id),
            log.workout_volume
        );
    }

    Ok(())
}
