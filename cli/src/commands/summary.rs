use anyhow::Result;
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use fitlog_core::models::{DailyLog, DietPlan, MacroProgress, Progress};

use super::AppSession;
use super::helpers::{no_neg_zero, parse_date, print_food_entries, print_workout_entries};

#[derive(Serialize)]
struct SummaryView<'a> {
    #[serde(flatten)]
    log: &'a DailyLog,
    target_calories: f64,
    progress: MacroProgress,
    current_weight: Option<f64>,
}

fn progress_line(label: &str, p: Progress, unit: &str) -> String {
    let intake = no_neg_zero(p.intake);
    let pct = p.fraction() * 100.0;
    let remaining = no_neg_zero(p.remaining());
    format!(
        "  {label:<9}{intake:>7.0}{unit} / {:.0}{unit}  ({pct:.0}%, {remaining:.0}{unit} left)",
        p.target
    )
}

pub(crate) fn cmd_summary(
    session: &AppSession<'_>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let log = session.log(date);

    if json {
        let view = SummaryView {
            log: &*log,
            target_calories: log.plan().target_calories(),
            progress: log.progress(),
            current_weight: session.current_weight(),
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    if !session.logs().contains_key(&date) {
        eprintln!("No entries for {date}");
        process::exit(2);
    }

    let plan = log.plan();
    println!("=== {date} · {} ===\n", plan.label);

    if !log.entries.is_empty() {
        print_food_entries(&log.entries);
        println!();
    }
    if !log.workout_entries.is_empty() {
        print_workout_entries(&log.workout_entries);
        println!();
    }

    let progress = log.progress();
    println!("{}", progress_line("Calories", progress.calories, ""));
    println!("{}", progress_line("Carbs", progress.carbs, "g"));
    println!("{}", progress_line("Protein", progress.protein, "g"));
    println!("{}", progress_line("Fat", progress.fat, "g"));

    let volume = log.workout_volume;
    println!("\n  Volume: {volume:.0}");
    if let Some(burned) = log.calories_burned {
        println!("  Burned: {burned:.0} kcal");
    }
    if let Some(weight) = log.weight {
        println!("  Weight: {weight:.1} kg");
    }

    Ok(())
}

pub(crate) fn cmd_trends(session: &AppSession<'_>, days: usize, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct TrendRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "Volume")]
        volume: String,
        #[tabled(rename = "Intake")]
        intake: String,
        #[tabled(rename = "Burned")]
        burned: String,
    }

    let points = session.trend(days.max(1));

    if json {
        println!("{}", serde_json::to_string_pretty(&points)?);
        return Ok(());
    }

    let rows: Vec<TrendRow> = points
        .iter()
        .map(|p| TrendRow {
            date: p.date.to_string(),
            weight: p.weight.map_or("-".into(), |w| format!("{w:.1} kg")),
            volume: format!("{:.0}", no_neg_zero(p.workout_volume)),
            intake: format!("{:.0}", no_neg_zero(p.calories_intake)),
            burned: format!("{:.0}", no_neg_zero(p.calories_burned)),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    if let Some(weight) = session.current_weight() {
        println!("Current weight: {weight:.1} kg");
    }

    Ok(())
}

pub(crate) fn cmd_plans(json: bool) -> Result<()> {
    #[derive(Tabled, Serialize)]
    struct PlanRow {
        #[tabled(rename = "Diet")]
        diet_type: String,
        #[tabled(rename = "Label")]
        label: String,
        #[tabled(rename = "Carbs")]
        carbs: f64,
        #[tabled(rename = "Protein")]
        protein: f64,
        #[tabled(rename = "Fat")]
        fat: f64,
        #[tabled(rename = "kcal")]
        target_calories: f64,
    }

    let rows: Vec<PlanRow> = DietPlan::all()
        .into_iter()
        .map(|p| PlanRow {
            diet_type: p.diet_type.to_string(),
            label: p.label.to_string(),
            carbs: p.targets.carbs,
            protein: p.targets.protein,
            fat: p.targets.fat,
            target_calories: p.target_calories(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}
