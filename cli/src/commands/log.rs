use anyhow::{Result, bail};

use fitlog_core::models::DietType;

use super::AppSession;
use super::helpers::{no_neg_zero, parse_date};

const LBS_PER_KG: f64 = 2.20462;
const KG_PER_LB: f64 = 0.453_592;

pub(crate) fn cmd_diet(
    session: &mut AppSession<'_>,
    diet: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let diet_type: DietType = diet.parse()?;
    let date = parse_date(date)?;
    let log = session.set_diet_type(date, diet_type)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&log)?);
    } else {
        let plan = log.plan();
        let t = plan.targets;
        println!(
            "{date}: {} ({:.0} kcal | C:{:.0}g P:{:.0}g F:{:.0}g)",
            plan.label,
            plan.target_calories(),
            t.carbs,
            t.protein,
            t.fat
        );
    }

    Ok(())
}

pub(crate) fn cmd_weight(
    session: &mut AppSession<'_>,
    value: f64,
    unit: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    if value <= 0.0 {
        bail!("Weight must be greater than 0");
    }

    let weight_kg = match unit.to_lowercase().as_str() {
        "kg" => value,
        "lbs" | "lb" => {
            let kg = no_neg_zero(value * KG_PER_LB);
            eprintln!("Converting {value:.1} lbs → {kg:.2} kg");
            kg
        }
        _ => bail!("Invalid unit '{unit}'. Use 'kg' or 'lbs'"),
    };

    let date = parse_date(date)?;
    let log = session.update_weight(date, weight_kg)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&log)?);
    } else {
        let lbs = weight_kg * LBS_PER_KG;
        println!("Logged {weight_kg:.1} kg ({lbs:.1} lbs) for {date}");
    }

    Ok(())
}

pub(crate) fn cmd_burned(
    session: &mut AppSession<'_>,
    kcal: f64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    if kcal < 0.0 {
        bail!("Calories burned must not be negative");
    }
    let date = parse_date(date)?;
    let log = session.set_calories_burned(date, kcal)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&log)?);
    } else {
        let net = log.calories_intake - kcal;
        println!("Logged {kcal:.0} kcal burned for {date} (net intake {net:.0} kcal)");
    }

    Ok(())
}
