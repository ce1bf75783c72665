use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const KCAL_PER_G_CARBS: f64 = 4.0;
pub const KCAL_PER_G_PROTEIN: f64 = 4.0;
pub const KCAL_PER_G_FAT: f64 = 9.0;

/// Energy of a macro split in kcal (4/4/9).
#[must_use]
pub fn calories_from_macros(carbs: f64, protein: f64, fat: f64) -> f64 {
    carbs * KCAL_PER_G_CARBS + protein * KCAL_PER_G_PROTEIN + fat * KCAL_PER_G_FAT
}

// --- Diet plans ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DietType {
    High,
    #[default]
    Med,
    Low,
}

impl DietType {
    pub const ALL: [DietType; 3] = [DietType::High, DietType::Med, DietType::Low];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Med => "Med",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for DietType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DietType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "med" | "medium" => Ok(Self::Med),
            "low" => Ok(Self::Low),
            _ => Err(Error::invalid(format!(
                "Invalid diet type '{s}'. Must be one of: High, Med, Low"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroTargets {
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DietPlan {
    pub diet_type: DietType,
    pub label: &'static str,
    pub targets: MacroTargets,
}

impl DietPlan {
    #[must_use]
    pub fn all() -> [DietPlan; 3] {
        DietType::ALL.map(Self::for_type)
    }

    #[must_use]
    pub fn for_type(diet_type: DietType) -> DietPlan {
        let (label, carbs, protein, fat) = match diet_type {
            DietType::High => ("High-carb day", 225.0, 100.0, 55.0),
            DietType::Med => ("Medium-carb day", 180.0, 100.0, 75.0),
            DietType::Low => ("Low-carb day", 135.0, 100.0, 95.0),
        };
        DietPlan {
            diet_type,
            label,
            targets: MacroTargets {
                carbs,
                protein,
                fat,
            },
        }
    }

    #[must_use]
    pub fn target_calories(&self) -> f64 {
        calories_from_macros(self.targets.carbs, self.targets.protein, self.targets.fat)
    }
}

// --- Ledger entries ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    pub id: String,
    pub name: String,
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFoodEntry {
    pub name: String,
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
}

impl NewFoodEntry {
    /// Manual entry: calories are derived from the macros before storage.
    pub fn from_macros(name: impl Into<String>, carbs: f64, protein: f64, fat: f64) -> Self {
        Self {
            name: name.into(),
            calories: calories_from_macros(carbs, protein, fat),
            carbs,
            protein,
            fat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutEntry {
    pub id: String,
    pub exercise_name: String,
    pub sets: i64,
    pub reps: i64,
    pub weight: f64,
    pub volume: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkoutEntry {
    pub exercise_name: String,
    pub sets: i64,
    pub reps: i64,
    pub weight: f64,
    pub volume: f64,
}

impl NewWorkoutEntry {
    /// Volume is fixed at creation as `weight * sets * reps`.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(exercise_name: impl Into<String>, sets: i64, reps: i64, weight: f64) -> Self {
        Self {
            exercise_name: exercise_name.into(),
            sets,
            reps,
            weight,
            volume: weight * sets as f64 * reps as f64,
        }
    }
}

/// Load as typed by a user: a number, or free text such as `"95kg"` / `"Bodyweight"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WeightInput {
    Kg(f64),
    Text(String),
}

impl WeightInput {
    #[must_use]
    pub fn kg(&self) -> f64 {
        match self {
            Self::Kg(v) => *v,
            Self::Text(s) => parse_weight_kg(s),
        }
    }
}

/// Read the leading number of a load string. Anything without one counts as 0 kg.
#[must_use]
pub fn parse_weight_kg(s: &str) -> f64 {
    let s = s.trim();
    let end = s
        .char_indices()
        .take_while(|&(i, c)| c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    (1..=end)
        .rev()
        .find_map(|n| s[..n].parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

// --- Daily aggregate ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLog {
    pub date: NaiveDate,
    pub diet_type: DietType,
    pub calories_intake: f64,
    pub protein_intake: f64,
    pub carbs_intake: f64,
    pub fat_intake: f64,
    pub workout_volume: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories_burned: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    pub entries: Vec<FoodEntry>,
    pub workout_entries: Vec<WorkoutEntry>,
}

impl DailyLog {
    /// What a date with no stored row looks like.
    #[must_use]
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            diet_type: DietType::default(),
            calories_intake: 0.0,
            protein_intake: 0.0,
            carbs_intake: 0.0,
            fat_intake: 0.0,
            workout_volume: 0.0,
            calories_burned: None,
            weight: None,
            entries: Vec::new(),
            workout_entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn plan(&self) -> DietPlan {
        DietPlan::for_type(self.diet_type)
    }

    /// Intake against the targets of this day's diet plan.
    #[must_use]
    pub fn progress(&self) -> MacroProgress {
        let plan = self.plan();
        MacroProgress {
            calories: Progress::new(self.calories_intake, plan.target_calories()),
            carbs: Progress::new(self.carbs_intake, plan.targets.carbs),
            protein: Progress::new(self.protein_intake, plan.targets.protein),
            fat: Progress::new(self.fat_intake, plan.targets.fat),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub intake: f64,
    pub target: f64,
}

impl Progress {
    #[must_use]
    pub fn new(intake: f64, target: f64) -> Self {
        Self { intake, target }
    }

    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.target <= 0.0 {
            0.0
        } else {
            self.intake / self.target
        }
    }

    #[must_use]
    pub fn remaining(&self) -> f64 {
        self.target - self.intake
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroProgress {
    pub calories: Progress,
    pub carbs: Progress,
    pub protein: Progress,
    pub fat: Progress,
}

/// Patch for the directly settable fields of a daily log. Derived totals are
/// not representable here.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DailyLogUpdate {
    pub diet_type: Option<DietType>,
    pub calories_burned: Option<f64>,
    pub weight: Option<f64>,
}

impl DailyLogUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diet_type.is_none() && self.calories_burned.is_none() && self.weight.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub weight: Option<f64>,
    pub workout_volume: f64,
    pub calories_intake: f64,
    pub calories_burned: f64,
}

impl From<&DailyLog> for TrendPoint {
    fn from(log: &DailyLog) -> Self {
        Self {
            date: log.date,
            weight: log.weight,
            workout_volume: log.workout_volume,
            calories_intake: log.calories_intake,
            calories_burned: log.calories_burned.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub logs_checked: usize,
    pub logs_repaired: usize,
}

// --- Validation ---

fn check_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::invalid(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(())
}

pub fn validate_food_entry(entry: &NewFoodEntry) -> Result<()> {
    if entry.name.trim().is_empty() {
        return Err(Error::invalid("Food name must not be empty"));
    }
    check_amount("calories", entry.calories)?;
    check_amount("carbs", entry.carbs)?;
    check_amount("protein", entry.protein)?;
    check_amount("fat", entry.fat)?;
    Ok(())
}

pub fn validate_workout_entry(entry: &NewWorkoutEntry) -> Result<()> {
    if entry.exercise_name.trim().is_empty() {
        return Err(Error::invalid("Exercise name must not be empty"));
    }
    if entry.sets < 1 || entry.reps < 1 {
        return Err(Error::invalid("sets and reps must be at least 1"));
    }
    check_amount("weight", entry.weight)?;
    check_amount("volume", entry.volume)?;
    Ok(())
}

pub fn validate_log_update(update: &DailyLogUpdate) -> Result<()> {
    if let Some(burned) = update.calories_burned {
        check_amount("calories_burned", burned)?;
    }
    if let Some(weight) = update.weight {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(Error::invalid("weight must be greater than 0"));
        }
    }
    Ok(())
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_calories_per_plan() {
        let med = DietPlan::for_type(DietType::Med);
        assert!((med.target_calories() - 1795.0).abs() < f64::EPSILON);
        // 225*4 + 100*4 + 55*9
        let high = DietPlan::for_type(DietType::High);
        assert!((high.target_calories() - 1795.0).abs() < f64::EPSILON);
        // 135*4 + 100*4 + 95*9
        let low = DietPlan::for_type(DietType::Low);
        assert!((low.target_calories() - 1795.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_all_plans_in_order() {
        let plans = DietPlan::all();
        assert_eq!(plans[0].diet_type, DietType::High);
        assert_eq!(plans[1].diet_type, DietType::Med);
        assert_eq!(plans[2].diet_type, DietType::Low);
        assert!((plans[1].targets.carbs - 180.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_manual_entry_computes_calories() {
        let entry = NewFoodEntry::from_macros("Oats", 50.0, 20.0, 10.0);
        assert!((entry.calories - 370.0).abs() < f64::EPSILON);
        assert_eq!(entry.name, "Oats");
    }

    #[test]
    fn test_workout_volume() {
        let entry = NewWorkoutEntry::new("Squat", 5, 4, 95.0);
        assert!((entry.volume - 1900.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_weight_kg() {
        assert!((parse_weight_kg("95kg") - 95.0).abs() < f64::EPSILON);
        assert!((parse_weight_kg("27.5kg") - 27.5).abs() < f64::EPSILON);
        assert!((parse_weight_kg(" 80 ") - 80.0).abs() < f64::EPSILON);
        assert!((parse_weight_kg("Bodyweight")).abs() < f64::EPSILON);
        assert!((parse_weight_kg("自重")).abs() < f64::EPSILON);
        assert!((parse_weight_kg("")).abs() < f64::EPSILON);
        assert!((parse_weight_kg("1.2.3kg") - 1.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weight_input_untagged() {
        let n: WeightInput = serde_json::from_str("62.5").unwrap();
        assert!((n.kg() - 62.5).abs() < f64::EPSILON);
        let s: WeightInput = serde_json::from_str("\"20kg\"").unwrap();
        assert!((s.kg() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_diet_type_from_str() {
        assert_eq!("high".parse::<DietType>().unwrap(), DietType::High);
        assert_eq!("Medium".parse::<DietType>().unwrap(), DietType::Med);
        assert_eq!("LOW".parse::<DietType>().unwrap(), DietType::Low);
        assert!("keto".parse::<DietType>().is_err());
        assert_eq!(DietType::default(), DietType::Med);
    }

    #[test]
    fn test_diet_type_serde_names() {
        assert_eq!(serde_json::to_string(&DietType::Med).unwrap(), "\"Med\"");
        let t: DietType = serde_json::from_str("\"Low\"").unwrap();
        assert_eq!(t, DietType::Low);
    }

    #[test]
    fn test_log_update_rejects_derived_fields() {
        let ok: DailyLogUpdate = serde_json::from_str(r#"{"weight": 75.2}"#).unwrap();
        assert_eq!(ok.weight, Some(75.2));
        assert!(ok.diet_type.is_none());

        let err = serde_json::from_str::<DailyLogUpdate>(r#"{"calories_intake": 10}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_validate_food_entry() {
        assert!(validate_food_entry(&NewFoodEntry::from_macros("Rice", 40.0, 4.0, 1.0)).is_ok());
        assert!(validate_food_entry(&NewFoodEntry::from_macros("  ", 1.0, 1.0, 1.0)).is_err());
        assert!(validate_food_entry(&NewFoodEntry::from_macros("Rice", -1.0, 0.0, 0.0)).is_err());
        assert!(
            validate_food_entry(&NewFoodEntry::from_macros("Rice", f64::NAN, 0.0, 0.0)).is_err()
        );
    }

    #[test]
    fn test_validate_workout_entry() {
        assert!(validate_workout_entry(&NewWorkoutEntry::new("Pull-up", 3, 15, 0.0)).is_ok());
        assert!(validate_workout_entry(&NewWorkoutEntry::new("Pull-up", 0, 15, 0.0)).is_err());
        assert!(validate_workout_entry(&NewWorkoutEntry::new("", 3, 15, 10.0)).is_err());
    }

    #[test]
    fn test_validate_log_update() {
        assert!(validate_log_update(&DailyLogUpdate::default()).is_ok());
        let bad = DailyLogUpdate {
            weight: Some(0.0),
            ..Default::default()
        };
        assert!(validate_log_update(&bad).is_err());
    }

    #[test]
    fn test_progress_against_plan() {
        let mut log = DailyLog::empty(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        log.calories_intake = 897.5;
        log.carbs_intake = 90.0;
        let progress = log.progress();
        assert!((progress.calories.fraction() - 0.5).abs() < 1e-9);
        assert!((progress.carbs.remaining() - 90.0).abs() < f64::EPSILON);
        assert!((Progress::new(5.0, 0.0).fraction()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_log_defaults() {
        let log = DailyLog::empty(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        assert_eq!(log.diet_type, DietType::Med);
        assert!(log.entries.is_empty());
        assert!(log.weight.is_none());
    }
}
