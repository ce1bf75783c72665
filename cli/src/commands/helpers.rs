use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use fitlog_core::models::{FoodEntry, WorkoutEntry};
use fitlog_core::normalize::NutritionCandidate;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Ask a yes/no question on stderr. Anything but `y`/`yes` is a no.
pub(crate) fn prompt_confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N]: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

pub(crate) fn print_food_entries(entries: &[FoodEntry]) {
    #[derive(Tabled)]
    struct FoodRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let rows: Vec<FoodRow> = entries
        .iter()
        .map(|e| FoodRow {
            id: short_id(&e.id),
            name: truncate(&e.name, 35),
            calories: format!("{:.0}", no_neg_zero(e.calories)),
            carbs: format!("{:.1}g", e.carbs),
            protein: format!("{:.1}g", e.protein),
            fat: format!("{:.1}g", e.fat),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_workout_entries(entries: &[WorkoutEntry]) {
    #[derive(Tabled)]
    struct WorkoutRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Exercise")]
        exercise: String,
        #[tabled(rename = "Sets")]
        sets: i64,
        #[tabled(rename = "Reps")]
        reps: i64,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "Volume")]
        volume: String,
    }

    let rows: Vec<WorkoutRow> = entries
        .iter()
        .map(|e| WorkoutRow {
            id: short_id(&e.id),
            exercise: truncate(&e.exercise_name, 30),
            sets: e.sets,
            reps: e.reps,
            weight: format!("{:.1} kg", e.weight),
            volume: format!("{:.0}", e.volume),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_candidates(candidates: &[NutritionCandidate]) {
    #[derive(Tabled)]
    struct CandidateRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let rows: Vec<CandidateRow> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| CandidateRow {
            idx: i + 1,
            name: truncate(&c.name, 35),
            calories: format!("{:.0}", no_neg_zero(c.calories)),
            carbs: format!("{:.1}g", c.carbs),
            protein: format!("{:.1}g", c.protein),
            fat: format!("{:.1}g", c.fat),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// First block of a uuid, enough to tell a day's entries apart in a table.
/// Commands that take an id accept this prefix.
pub(crate) fn short_id(id: &str) -> String {
    id.split('-').next().unwrap_or(id).to_string()
}

/// Resolve a full id or a unique prefix of one among `ids`.
pub(crate) fn resolve_id<'a>(
    prefix: &str,
    ids: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    let mut matches = ids.into_iter().filter(|id| id.starts_with(prefix));
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first.to_string())
}
