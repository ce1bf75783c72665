use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use uuid::Uuid;

use crate::aggregate::{self, FoodTotals};
use crate::error::Result;
use crate::models::{
    DailyLog, DailyLogUpdate, DietType, FoodEntry, NewFoodEntry, NewWorkoutEntry, WorkoutEntry,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct Database {
    conn: Connection,
}

fn now() -> String {
    // Fixed-width UTC timestamps sort lexically in creation order.
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn date_str(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS daily_logs (
                    id TEXT PRIMARY KEY NOT NULL,
                    user_id TEXT NOT NULL,
                    log_date TEXT NOT NULL,
                    diet_type TEXT NOT NULL DEFAULT 'Med',
                    calories_intake REAL NOT NULL DEFAULT 0,
                    protein_intake REAL NOT NULL DEFAULT 0,
                    carbs_intake REAL NOT NULL DEFAULT 0,
                    fat_intake REAL NOT NULL DEFAULT 0,
                    workout_volume REAL NOT NULL DEFAULT 0,
                    calories_burned REAL,
                    weight REAL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    UNIQUE (user_id, log_date)
                );

                CREATE TABLE IF NOT EXISTS food_entries (
                    id TEXT PRIMARY KEY NOT NULL,
                    daily_log_id TEXT NOT NULL REFERENCES daily_logs(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    calories REAL NOT NULL,
                    carbs REAL NOT NULL,
                    protein REAL NOT NULL,
                    fat REAL NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS workout_entries (
                    id TEXT PRIMARY KEY NOT NULL,
                    daily_log_id TEXT NOT NULL REFERENCES daily_logs(id) ON DELETE CASCADE,
                    exercise_name TEXT NOT NULL,
                    sets INTEGER NOT NULL,
                    reps INTEGER NOT NULL,
                    weight REAL NOT NULL,
                    volume REAL NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_daily_logs_user ON daily_logs(user_id, log_date);
                CREATE INDEX IF NOT EXISTS idx_food_entries_log ON food_entries(daily_log_id);
                CREATE INDEX IF NOT EXISTS idx_workout_entries_log ON workout_entries(daily_log_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    /// Start a transaction on the shared connection. Every `Database` call made
    /// before `commit` joins it; dropping it uncommitted rolls everything back.
    pub fn transaction(&self) -> Result<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    // --- Row mapping helpers ---

    // Expects columns:
    // 0: id, 1: log_date, 2: diet_type, 3: calories_intake, 4: protein_intake,
    // 5: carbs_intake, 6: fat_intake, 7: workout_volume, 8: calories_burned, 9: weight
    fn daily_log_from_row(row: &rusqlite::Row) -> rusqlite::Result<(String, DailyLog)> {
        let date_text: String = row.get(1)?;
        let date = NaiveDate::parse_from_str(&date_text, DATE_FORMAT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let diet_type: String = row.get(2)?;
        Ok((
            row.get(0)?,
            DailyLog {
                date,
                diet_type: diet_type.parse::<DietType>().unwrap_or_default(),
                calories_intake: row.get(3)?,
                protein_intake: row.get(4)?,
                carbs_intake: row.get(5)?,
                fat_intake: row.get(6)?,
                workout_volume: row.get(7)?,
                calories_burned: row.get(8)?,
                weight: row.get(9)?,
                entries: Vec::new(),
                workout_entries: Vec::new(),
            },
        ))
    }

    // 0: id, 1: name, 2: calories, 3: carbs, 4: protein, 5: fat, 6: created_at
    fn food_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodEntry> {
        Ok(FoodEntry {
            id: row.get(0)?,
            name: row.get(1)?,
            calories: row.get(2)?,
            carbs: row.get(3)?,
            protein: row.get(4)?,
            fat: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    // 0: id, 1: exercise_name, 2: sets, 3: reps, 4: weight, 5: volume, 6: created_at
    fn workout_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<WorkoutEntry> {
        Ok(WorkoutEntry {
            id: row.get(0)?,
            exercise_name: row.get(1)?,
            sets: row.get(2)?,
            reps: row.get(3)?,
            weight: row.get(4)?,
            volume: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    // --- Daily logs ---

    pub fn find_daily_log_id(&self, user_id: &str, date: NaiveDate) -> Result<Option<String>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM daily_logs WHERE user_id = ?1 AND log_date = ?2",
                params![user_id, date_str(date)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Find the log for `(user_id, date)`, creating an empty `Med` day if absent.
    pub fn get_or_create_daily_log(&self, user_id: &str, date: NaiveDate) -> Result<String> {
        let now = now();
        self.conn.execute(
            "INSERT INTO daily_logs (id, user_id, log_date, diet_type, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT (user_id, log_date) DO NOTHING",
            params![
                Uuid::new_v4().to_string(),
                user_id,
                date_str(date),
                DietType::default().as_str(),
                now
            ],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM daily_logs WHERE user_id = ?1 AND log_date = ?2",
            params![user_id, date_str(date)],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Apply only the fields present in `update`; absent fields keep their value.
    pub fn update_daily_log(&self, daily_log_id: &str, update: &DailyLogUpdate) -> Result<()> {
        self.conn.execute(
            "UPDATE daily_logs SET
                diet_type = COALESCE(?1, diet_type),
                calories_burned = COALESCE(?2, calories_burned),
                weight = COALESCE(?3, weight),
                updated_at = ?4
             WHERE id = ?5",
            params![
                update.diet_type.map(DietType::as_str),
                update.calories_burned,
                update.weight,
                now(),
                daily_log_id
            ],
        )?;
        Ok(())
    }

    pub fn get_daily_log(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailyLog>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, log_date, diet_type, calories_intake, protein_intake, carbs_intake,
                        fat_intake, workout_volume, calories_burned, weight
                 FROM daily_logs WHERE user_id = ?1 AND log_date = ?2",
                params![user_id, date_str(date)],
                Self::daily_log_from_row,
            )
            .optional()?;
        let Some((id, mut log)) = row else {
            return Ok(None);
        };
        log.entries = self.food_entries_for_log(&id)?;
        log.workout_entries = self.workout_entries_for_log(&id)?;
        Ok(Some(log))
    }

    /// Every log of a user with its entries, keyed by date.
    pub fn load_daily_logs(&self, user_id: &str) -> Result<BTreeMap<NaiveDate, DailyLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, log_date, diet_type, calories_intake, protein_intake, carbs_intake,
                    fat_intake, workout_volume, calories_burned, weight
             FROM daily_logs WHERE user_id = ?1 ORDER BY log_date",
        )?;
        let logs = stmt
            .query_map(params![user_id], Self::daily_log_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut foods = self.food_entries_for_user(user_id)?;
        let mut workouts = self.workout_entries_for_user(user_id)?;

        Ok(logs
            .into_iter()
            .map(|(id, mut log)| {
                log.entries = foods.remove(&id).unwrap_or_default();
                log.workout_entries = workouts.remove(&id).unwrap_or_default();
                (log.date, log)
            })
            .collect())
    }

    /// Remove every log of a user; entries go with them via `ON DELETE CASCADE`.
    pub fn delete_user_data(&self, user_id: &str) -> Result<usize> {
        let rows = self
            .conn
            .execute("DELETE FROM daily_logs WHERE user_id = ?1", params![user_id])?;
        Ok(rows)
    }

    // --- Food entries ---

    pub fn insert_food_entry(&self, daily_log_id: &str, entry: &NewFoodEntry) -> Result<FoodEntry> {
        let created = FoodEntry {
            id: Uuid::new_v4().to_string(),
            name: entry.name.trim().to_string(),
            calories: entry.calories,
            carbs: entry.carbs,
            protein: entry.protein,
            fat: entry.fat,
            created_at: now(),
        };
        self.conn.execute(
            "INSERT INTO food_entries (id, daily_log_id, name, calories, carbs, protein, fat, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                created.id,
                daily_log_id,
                created.name,
                created.calories,
                created.carbs,
                created.protein,
                created.fat,
                created.created_at,
            ],
        )?;
        Ok(created)
    }

    pub fn delete_food_entry(&self, daily_log_id: &str, entry_id: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM food_entries WHERE id = ?1 AND daily_log_id = ?2",
            params![entry_id, daily_log_id],
        )?;
        Ok(rows > 0)
    }

    pub fn food_entries_for_log(&self, daily_log_id: &str) -> Result<Vec<FoodEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, calories, carbs, protein, fat, created_at
             FROM food_entries WHERE daily_log_id = ?1
             ORDER BY created_at, rowid",
        )?;
        let entries = stmt
            .query_map(params![daily_log_id], Self::food_entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn food_entries_for_user(&self, user_id: &str) -> Result<HashMap<String, Vec<FoodEntry>>> {
        let mut stmt = self.conn.prepare(
            "SELECT fe.id, fe.name, fe.calories, fe.carbs, fe.protein, fe.fat, fe.created_at,
                    fe.daily_log_id
             FROM food_entries fe
             JOIN daily_logs dl ON fe.daily_log_id = dl.id
             WHERE dl.user_id = ?1
             ORDER BY fe.created_at, fe.rowid",
        )?;
        let mut grouped: HashMap<String, Vec<FoodEntry>> = HashMap::new();
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((row.get::<_, String>(7)?, Self::food_entry_from_row(row)?))
        })?;
        for row in rows {
            let (log_id, entry) = row?;
            grouped.entry(log_id).or_default().push(entry);
        }
        Ok(grouped)
    }

    /// Re-derive the four intake columns from the log's live food entries.
    pub fn recompute_food_totals(&self, daily_log_id: &str) -> Result<FoodTotals> {
        let totals = aggregate::food_totals(&self.food_entries_for_log(daily_log_id)?);
        self.conn.execute(
            "UPDATE daily_logs SET
                calories_intake = ?1, carbs_intake = ?2, protein_intake = ?3, fat_intake = ?4,
                updated_at = ?5
             WHERE id = ?6",
            params![
                totals.calories,
                totals.carbs,
                totals.protein,
                totals.fat,
                now(),
                daily_log_id
            ],
        )?;
        Ok(totals)
    }

    // --- Workout entries ---

    pub fn insert_workout_entry(
        &self,
        daily_log_id: &str,
        entry: &NewWorkoutEntry,
    ) -> Result<WorkoutEntry> {
        let created = WorkoutEntry {
            id: Uuid::new_v4().to_string(),
            exercise_name: entry.exercise_name.trim().to_string(),
            sets: entry.sets,
            reps: entry.reps,
            weight: entry.weight,
            volume: entry.volume,
            created_at: now(),
        };
        self.conn.execute(
            "INSERT INTO workout_entries (id, daily_log_id, exercise_name, sets, reps, weight, volume, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                created.id,
                daily_log_id,
                created.exercise_name,
                created.sets,
                created.reps,
                created.weight,
                created.volume,
                created.created_at,
            ],
        )?;
        Ok(created)
    }

    pub fn delete_workout_entry(&self, daily_log_id: &str, entry_id: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM workout_entries WHERE id = ?1 AND daily_log_id = ?2",
            params![entry_id, daily_log_id],
        )?;
        Ok(rows > 0)
    }

    pub fn workout_entries_for_log(&self, daily_log_id: &str) -> Result<Vec<WorkoutEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, exercise_name, sets, reps, weight, volume, created_at
             FROM workout_entries WHERE daily_log_id = ?1
             ORDER BY created_at, rowid",
        )?;
        let entries = stmt
            .query_map(params![daily_log_id], Self::workout_entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn workout_entries_for_user(
        &self,
        user_id: &str,
    ) -> Result<HashMap<String, Vec<WorkoutEntry>>> {
        let mut stmt = self.conn.prepare(
            "SELECT we.id, we.exercise_name, we.sets, we.reps, we.weight, we.volume, we.created_at,
                    we.daily_log_id
             FROM workout_entries we
             JOIN daily_logs dl ON we.daily_log_id = dl.id
             WHERE dl.user_id = ?1
             ORDER BY we.created_at, we.rowid",
        )?;
        let mut grouped: HashMap<String, Vec<WorkoutEntry>> = HashMap::new();
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((row.get::<_, String>(7)?, Self::workout_entry_from_row(row)?))
        })?;
        for row in rows {
            let (log_id, entry) = row?;
            grouped.entry(log_id).or_default().push(entry);
        }
        Ok(grouped)
    }

    /// Re-derive `workout_volume` from the log's live workout entries.
    pub fn recompute_workout_volume(&self, daily_log_id: &str) -> Result<f64> {
        let volume = aggregate::workout_volume(&self.workout_entries_for_log(daily_log_id)?);
        self.conn.execute(
            "UPDATE daily_logs SET workout_volume = ?1, updated_at = ?2 WHERE id = ?3",
            params![volume, now(), daily_log_id],
        )?;
        Ok(volume)
    }

    /// Overwrite stored totals without touching entries. Only used to simulate
    /// drift in tests of the reconciler.
    #[cfg(test)]
    pub(crate) fn force_totals(&self, daily_log_id: &str, calories: f64, volume: f64) -> Result<()> {
        self.conn.execute(
            "UPDATE daily_logs SET calories_intake = ?1, workout_volume = ?2 WHERE id = ?3",
            params![calories, volume, daily_log_id],
        )?;
        Ok(())
    }
}
