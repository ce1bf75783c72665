use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;

use crate::aggregate;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{
    DailyLog, DailyLogUpdate, FoodEntry, NewFoodEntry, NewWorkoutEntry, ReconcileSummary,
    WorkoutEntry, validate_food_entry, validate_log_update, validate_workout_entry,
};

/// Per-user store of daily logs and their entries.
///
/// Every entry mutation leaves the day's derived totals equal to the sums over
/// its live entries by the time it returns `Ok`.
pub trait Ledger {
    fn load_daily_logs(&self, user_id: &str) -> Result<BTreeMap<NaiveDate, DailyLog>>;
    fn get_daily_log(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailyLog>>;

    fn add_food_entry(
        &self,
        user_id: &str,
        date: NaiveDate,
        entry: &NewFoodEntry,
    ) -> Result<FoodEntry>;
    /// `Ok(false)` when there is nothing to remove.
    fn remove_food_entry(&self, user_id: &str, date: NaiveDate, entry_id: &str) -> Result<bool>;

    fn add_workout_entry(
        &self,
        user_id: &str,
        date: NaiveDate,
        entry: &NewWorkoutEntry,
    ) -> Result<WorkoutEntry>;
    /// `Ok(false)` when there is nothing to remove.
    fn remove_workout_entry(&self, user_id: &str, date: NaiveDate, entry_id: &str)
    -> Result<bool>;

    fn update_daily_log(
        &self,
        user_id: &str,
        date: NaiveDate,
        update: &DailyLogUpdate,
    ) -> Result<DailyLog>;

    /// Delete all of a user's logs and entries. Returns the number of logs removed.
    fn reset_user_data(&self, user_id: &str) -> Result<usize>;
}

pub struct FitlogService {
    db: Database,
}

impl FitlogService {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::open(db_path.as_ref())?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    /// Recompute every aggregate of `user_id` from its entries, repairing any
    /// whose stored totals drifted.
    pub fn reconcile(&self, user_id: &str) -> Result<ReconcileSummary> {
        let tx = self.db.transaction()?;
        let logs = self.db.load_daily_logs(user_id)?;
        let mut summary = ReconcileSummary {
            logs_checked: logs.len(),
            logs_repaired: 0,
        };

        for (date, log) in &logs {
            if !aggregate::is_stale(log) {
                continue;
            }
            let Some(log_id) = self.db.find_daily_log_id(user_id, *date)? else {
                continue;
            };
            self.db.recompute_food_totals(&log_id)?;
            self.db.recompute_workout_volume(&log_id)?;
            summary.logs_repaired += 1;
            tracing::info!(user_id, %date, "repaired stale daily totals");
        }

        tx.commit()?;
        Ok(summary)
    }
}

impl Ledger for FitlogService {
    fn load_daily_logs(&self, user_id: &str) -> Result<BTreeMap<NaiveDate, DailyLog>> {
        self.db.load_daily_logs(user_id)
    }

    fn get_daily_log(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailyLog>> {
        self.db.get_daily_log(user_id, date)
    }

    fn add_food_entry(
        &self,
        user_id: &str,
        date: NaiveDate,
        entry: &NewFoodEntry,
    ) -> Result<FoodEntry> {
        validate_food_entry(entry)?;
        let tx = self.db.transaction()?;
        let log_id = self.db.get_or_create_daily_log(user_id, date)?;
        let created = self.db.insert_food_entry(&log_id, entry)?;
        self.db.recompute_food_totals(&log_id)?;
        tx.commit()?;
        Ok(created)
    }

    fn remove_food_entry(&self, user_id: &str, date: NaiveDate, entry_id: &str) -> Result<bool> {
        let tx = self.db.transaction()?;
        let Some(log_id) = self.db.find_daily_log_id(user_id, date)? else {
            return Ok(false);
        };
        if !self.db.delete_food_entry(&log_id, entry_id)? {
            return Ok(false);
        }
        self.db.recompute_food_totals(&log_id)?;
        tx.commit()?;
        Ok(true)
    }

    fn add_workout_entry(
        &self,
        user_id: &str,
        date: NaiveDate,
        entry: &NewWorkoutEntry,
    ) -> Result<WorkoutEntry> {
        validate_workout_entry(entry)?;
        let tx = self.db.transaction()?;
        let log_id = self.db.get_or_create_daily_log(user_id, date)?;
        let created = self.db.insert_workout_entry(&log_id, entry)?;
        self.db.recompute_workout_volume(&log_id)?;
        tx.commit()?;
        Ok(created)
    }

    fn remove_workout_entry(
        &self,
        user_id: &str,
        date: NaiveDate,
        entry_id: &str,
    ) -> Result<bool> {
        let tx = self.db.transaction()?;
        let Some(log_id) = self.db.find_daily_log_id(user_id, date)? else {
            return Ok(false);
        };
        if !self.db.delete_workout_entry(&log_id, entry_id)? {
            return Ok(false);
        }
        self.db.recompute_workout_volume(&log_id)?;
        tx.commit()?;
        Ok(true)
    }

    fn update_daily_log(
        &self,
        user_id: &str,
        date: NaiveDate,
        update: &DailyLogUpdate,
    ) -> Result<DailyLog> {
        validate_log_update(update)?;
        let tx = self.db.transaction()?;
        let log_id = self.db.get_or_create_daily_log(user_id, date)?;
        if !update.is_empty() {
            self.db.update_daily_log(&log_id, update)?;
        }
        let log = self
            .db
            .get_daily_log(user_id, date)?
            .ok_or_else(|| Error::NotFound {
                entity: "daily log",
                id: date.to_string(),
            })?;
        tx.commit()?;
        Ok(log)
    }

    fn reset_user_data(&self, user_id: &str) -> Result<usize> {
        let removed = self.db.delete_user_data(user_id)?;
        tracing::info!(user_id, removed, "reset user data");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DietType;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn assert_totals_match_entries(svc: &FitlogService, user: &str, date: NaiveDate) {
        let log = svc.get_daily_log(user, date).unwrap().unwrap();
        let food = aggregate::food_totals(&log.entries);
        assert!((log.calories_intake - food.calories).abs() < 1e-9);
        assert!((log.carbs_intake - food.carbs).abs() < 1e-9);
        assert!((log.protein_intake - food.protein).abs() < 1e-9);
        assert!((log.fat_intake - food.fat).abs() < 1e-9);
        let volume = aggregate::workout_volume(&log.workout_entries);
        assert!((log.workout_volume - volume).abs() < 1e-9);
    }

    #[test]
    fn test_add_food_creates_log_and_totals() {
        let svc = FitlogService::new_in_memory().unwrap();
        let entry = svc
            .add_food_entry("u1", day(15), &NewFoodEntry::from_macros("Oats", 50.0, 20.0, 10.0))
            .unwrap();
        assert!((entry.calories - 370.0).abs() < f64::EPSILON);

        let log = svc.get_daily_log("u1", day(15)).unwrap().unwrap();
        assert_eq!(log.diet_type, DietType::Med);
        assert!((log.calories_intake - 370.0).abs() < f64::EPSILON);
        assert!((log.carbs_intake - 50.0).abs() < f64::EPSILON);
        assert!((log.protein_intake - 20.0).abs() < f64::EPSILON);
        assert!((log.fat_intake - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_totals_track_every_add_remove_sequence() {
        let svc = FitlogService::new_in_memory().unwrap();
        let mut live: Vec<String> = Vec::new();
        let mut seed: u64 = 0x2545_F491;

        for step in 0..60 {
            // xorshift keeps the sequence deterministic
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let remove = !live.is_empty() && seed % 3 == 0;
            if remove {
                let idx = usize::try_from(seed % live.len() as u64).unwrap();
                let id = live.swap_remove(idx);
                assert!(svc.remove_food_entry("u1", day(15), &id).unwrap());
            } else {
                let grams = f64::from(step % 17) + 0.5;
                let created = svc
                    .add_food_entry(
                        "u1",
                        day(15),
                        &NewFoodEntry::from_macros(format!("item {step}"), grams, grams / 2.0, 1.0),
                    )
                    .unwrap();
                live.push(created.id);
            }
            assert_totals_match_entries(&svc, "u1", day(15));
        }

        for id in live.drain(..) {
            svc.remove_food_entry("u1", day(15), &id).unwrap();
        }
        let log = svc.get_daily_log("u1", day(15)).unwrap().unwrap();
        assert!(log.entries.is_empty());
        assert!(log.calories_intake.abs() < 1e-9);
    }

    #[test]
    fn test_remove_unknown_entry_leaves_totals() {
        let svc = FitlogService::new_in_memory().unwrap();
        svc.add_food_entry("u1", day(15), &NewFoodEntry::from_macros("Rice", 40.0, 4.0, 1.0))
            .unwrap();
        let before = svc.get_daily_log("u1", day(15)).unwrap().unwrap();

        assert!(!svc.remove_food_entry("u1", day(15), "missing").unwrap());
        assert!(!svc.remove_workout_entry("u1", day(15), "missing").unwrap());

        let after = svc.get_daily_log("u1", day(15)).unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_remove_without_log_creates_nothing() {
        let svc = FitlogService::new_in_memory().unwrap();
        assert!(!svc.remove_food_entry("u1", day(15), "missing").unwrap());
        assert!(svc.get_daily_log("u1", day(15)).unwrap().is_none());
    }

    #[test]
    fn test_remove_is_scoped_to_user_and_date() {
        let svc = FitlogService::new_in_memory().unwrap();
        let entry = svc
            .add_food_entry("u1", day(15), &NewFoodEntry::from_macros("Rice", 40.0, 4.0, 1.0))
            .unwrap();
        svc.add_food_entry("u2", day(15), &NewFoodEntry::from_macros("Bread", 1.0, 1.0, 1.0))
            .unwrap();
        svc.add_food_entry("u1", day(16), &NewFoodEntry::from_macros("Bread", 1.0, 1.0, 1.0))
            .unwrap();

        assert!(!svc.remove_food_entry("u2", day(15), &entry.id).unwrap());
        assert!(!svc.remove_food_entry("u1", day(16), &entry.id).unwrap());
        assert!(svc.remove_food_entry("u1", day(15), &entry.id).unwrap());
    }

    #[test]
    fn test_workout_volume_tracks_entries() {
        let svc = FitlogService::new_in_memory().unwrap();
        let squat = svc
            .add_workout_entry("u1", day(15), &NewWorkoutEntry::new("Squat", 5, 4, 95.0))
            .unwrap();
        assert!((squat.volume - 1900.0).abs() < f64::EPSILON);
        svc.add_workout_entry("u1", day(15), &NewWorkoutEntry::new("Press", 3, 10, 30.0))
            .unwrap();
        assert_totals_match_entries(&svc, "u1", day(15));

        assert!(svc.remove_workout_entry("u1", day(15), &squat.id).unwrap());
        let log = svc.get_daily_log("u1", day(15)).unwrap().unwrap();
        assert!((log.workout_volume - 900.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_entry_writes_nothing() {
        let svc = FitlogService::new_in_memory().unwrap();
        let err = svc
            .add_food_entry("u1", day(15), &NewFoodEntry::from_macros("", 1.0, 1.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
        let err = svc
            .add_workout_entry("u1", day(15), &NewWorkoutEntry::new("Row", 0, 10, 20.0))
            .unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
        assert!(svc.get_daily_log("u1", day(15)).unwrap().is_none());
    }

    #[test]
    fn test_update_daily_log_merges_fields() {
        let svc = FitlogService::new_in_memory().unwrap();
        let log = svc
            .update_daily_log(
                "u1",
                day(15),
                &DailyLogUpdate {
                    diet_type: Some(DietType::High),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(log.diet_type, DietType::High);

        let log = svc
            .update_daily_log(
                "u1",
                day(15),
                &DailyLogUpdate {
                    weight: Some(72.5),
                    calories_burned: Some(350.0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(log.diet_type, DietType::High);
        assert_eq!(log.weight, Some(72.5));
        assert_eq!(log.calories_burned, Some(350.0));
    }

    #[test]
    fn test_empty_update_creates_default_log() {
        let svc = FitlogService::new_in_memory().unwrap();
        let log = svc
            .update_daily_log("u1", day(15), &DailyLogUpdate::default())
            .unwrap();
        assert_eq!(log, DailyLog::empty(day(15)));
    }

    #[test]
    fn test_update_rejects_bad_weight() {
        let svc = FitlogService::new_in_memory().unwrap();
        let err = svc
            .update_daily_log(
                "u1",
                day(15),
                &DailyLogUpdate {
                    weight: Some(-3.0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn test_reconcile_repairs_drift() {
        let svc = FitlogService::new_in_memory().unwrap();
        svc.add_food_entry("u1", day(14), &NewFoodEntry::from_macros("Rice", 40.0, 4.0, 1.0))
            .unwrap();
        svc.add_workout_entry("u1", day(15), &NewWorkoutEntry::new("Squat", 5, 4, 95.0))
            .unwrap();

        let clean = svc.reconcile("u1").unwrap();
        assert_eq!(clean.logs_checked, 2);
        assert_eq!(clean.logs_repaired, 0);

        let log_id = svc.db.find_daily_log_id("u1", day(15)).unwrap().unwrap();
        svc.db.force_totals(&log_id, 9999.0, 1.0).unwrap();

        let repaired = svc.reconcile("u1").unwrap();
        assert_eq!(repaired.logs_repaired, 1);
        assert_totals_match_entries(&svc, "u1", day(15));
        assert_totals_match_entries(&svc, "u1", day(14));
    }

    #[test]
    fn test_reset_user_data() {
        let svc = FitlogService::new_in_memory().unwrap();
        svc.add_food_entry("u1", day(14), &NewFoodEntry::from_macros("Rice", 40.0, 4.0, 1.0))
            .unwrap();
        svc.add_food_entry("u1", day(15), &NewFoodEntry::from_macros("Rice", 40.0, 4.0, 1.0))
            .unwrap();
        svc.add_food_entry("u2", day(15), &NewFoodEntry::from_macros("Rice", 40.0, 4.0, 1.0))
            .unwrap();

        assert_eq!(svc.reset_user_data("u1").unwrap(), 2);
        assert!(svc.load_daily_logs("u1").unwrap().is_empty());
        assert_eq!(svc.load_daily_logs("u2").unwrap().len(), 1);
        assert_eq!(svc.reset_user_data("u1").unwrap(), 0);
    }
}
