//! Derived totals of a daily log.
//!
//! Totals are always recomputed from the full live entry set of a day, never
//! adjusted by the delta of a single insert or delete. A day holds tens of
//! entries, so the linear pass is the whole cost.

use serde::Serialize;

use crate::models::{DailyLog, FoodEntry, WorkoutEntry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FoodTotals {
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
}

#[must_use]
pub fn food_totals(entries: &[FoodEntry]) -> FoodTotals {
    entries.iter().fold(FoodTotals::default(), |acc, e| FoodTotals {
        calories: acc.calories + e.calories,
        carbs: acc.carbs + e.carbs,
        protein: acc.protein + e.protein,
        fat: acc.fat + e.fat,
    })
}

#[must_use]
pub fn workout_volume(entries: &[WorkoutEntry]) -> f64 {
    entries.iter().map(|e| e.volume).sum()
}

/// Whether the stored totals of `log` disagree with its own entries.
#[must_use]
pub fn is_stale(log: &DailyLog) -> bool {
    const TOLERANCE: f64 = 1e-6;
    let food = food_totals(&log.entries);
    let volume = workout_volume(&log.workout_entries);
    [
        (food.calories, log.calories_intake),
        (food.carbs, log.carbs_intake),
        (food.protein, log.protein_intake),
        (food.fat, log.fat_intake),
        (volume, log.workout_volume),
    ]
    .iter()
    .any(|(derived, stored)| (derived - stored).abs() > TOLERANCE)
}
