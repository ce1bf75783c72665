//! A user's working view of their logs.
//!
//! The session owns a cache of every daily log for one user. Mutations go to the
//! ledger first and then reload the whole cache, so what the session shows is
//! what the store holds. A mutation that committed returns `Ok` even when the
//! reload after it fails; the cache then stays stale until the next `reload`.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{Local, NaiveDate};

use crate::error::Result;
use crate::models::{
    DailyLog, DailyLogUpdate, DietType, FoodEntry, NewFoodEntry, NewWorkoutEntry, TrendPoint,
    WorkoutEntry,
};
use crate::service::Ledger;

pub struct Session<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    user_id: String,
    logs: BTreeMap<NaiveDate, DailyLog>,
    opened_on: NaiveDate,
    selected_date: NaiveDate,
    current_weight: Option<f64>,
}

impl<'a, L: Ledger + ?Sized> Session<'a, L> {
    pub fn open(ledger: &'a L, user_id: impl Into<String>) -> Result<Self> {
        let user_id = user_id.into();
        let logs = ledger.load_daily_logs(&user_id)?;
        let today = Local::now().date_naive();
        tracing::debug!(user_id = %user_id, days = logs.len(), "opened session");
        Ok(Self {
            ledger,
            current_weight: latest_weight(&logs),
            user_id,
            logs,
            opened_on: today,
            selected_date: today,
        })
    }

    /// End the session, discarding the cache.
    pub fn close(self) {
        tracing::debug!(user_id = %self.user_id, "closed session");
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn logs(&self) -> &BTreeMap<NaiveDate, DailyLog> {
        &self.logs
    }

    /// The log for `date`, or an empty `Med` day when nothing was recorded.
    #[must_use]
    pub fn log(&self, date: NaiveDate) -> Cow<'_, DailyLog> {
        match self.logs.get(&date) {
            Some(log) => Cow::Borrowed(log),
            None => Cow::Owned(DailyLog::empty(date)),
        }
    }

    #[must_use]
    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    pub fn select_date(&mut self, date: NaiveDate) {
        self.selected_date = date;
    }

    #[must_use]
    pub fn selected_log(&self) -> Cow<'_, DailyLog> {
        self.log(self.selected_date)
    }

    #[must_use]
    pub fn current_weight(&self) -> Option<f64> {
        self.current_weight
    }

    /// Replace the cache with a fresh read of the ledger. The old cache survives
    /// a failed read.
    pub fn reload(&mut self) -> Result<()> {
        self.logs = self.ledger.load_daily_logs(&self.user_id)?;
        Ok(())
    }

    fn refresh_after_write(&mut self) {
        if let Err(e) = self.reload() {
            tracing::warn!(user_id = %self.user_id, error = %e, "write committed but reload failed");
        }
    }

    pub fn add_food_entry(&mut self, date: NaiveDate, entry: &NewFoodEntry) -> Result<FoodEntry> {
        let created = self.ledger.add_food_entry(&self.user_id, date, entry)?;
        self.refresh_after_write();
        Ok(created)
    }

    pub fn remove_food_entry(&mut self, date: NaiveDate, entry_id: &str) -> Result<bool> {
        let removed = self.ledger.remove_food_entry(&self.user_id, date, entry_id)?;
        self.refresh_after_write();
        Ok(removed)
    }

    pub fn add_workout_entry(
        &mut self,
        date: NaiveDate,
        entry: &NewWorkoutEntry,
    ) -> Result<WorkoutEntry> {
        let created = self.ledger.add_workout_entry(&self.user_id, date, entry)?;
        self.refresh_after_write();
        Ok(created)
    }

    pub fn remove_workout_entry(&mut self, date: NaiveDate, entry_id: &str) -> Result<bool> {
        let removed = self
            .ledger
            .remove_workout_entry(&self.user_id, date, entry_id)?;
        self.refresh_after_write();
        Ok(removed)
    }

    pub fn set_diet_type(&mut self, date: NaiveDate, diet_type: DietType) -> Result<DailyLog> {
        self.update(
            date,
            &DailyLogUpdate {
                diet_type: Some(diet_type),
                ..Default::default()
            },
        )
    }

    /// Record a weigh-in for `date`; it also becomes the current weight.
    pub fn update_weight(&mut self, date: NaiveDate, kg: f64) -> Result<DailyLog> {
        let log = self.update(
            date,
            &DailyLogUpdate {
                weight: Some(kg),
                ..Default::default()
            },
        )?;
        self.current_weight = Some(kg);
        Ok(log)
    }

    pub fn set_calories_burned(&mut self, date: NaiveDate, kcal: f64) -> Result<DailyLog> {
        self.update(
            date,
            &DailyLogUpdate {
                calories_burned: Some(kcal),
                ..Default::default()
            },
        )
    }

    fn update(&mut self, date: NaiveDate, update: &DailyLogUpdate) -> Result<DailyLog> {
        let log = self.ledger.update_daily_log(&self.user_id, date, update)?;
        self.refresh_after_write();
        Ok(log)
    }

    /// The last `days` logged dates, oldest first. With no logs at all the
    /// series is a single zero point for today.
    #[must_use]
    pub fn trend(&self, days: usize) -> Vec<TrendPoint> {
        if self.logs.is_empty() {
            return vec![TrendPoint::from(&DailyLog::empty(self.opened_on))];
        }
        let mut points: Vec<TrendPoint> = self
            .logs
            .values()
            .rev()
            .take(days)
            .map(TrendPoint::from)
            .collect();
        points.reverse();
        points
    }
}

fn latest_weight(logs: &BTreeMap<NaiveDate, DailyLog>) -> Option<f64> {
    logs.values().rev().find_map(|log| log.weight)
}
