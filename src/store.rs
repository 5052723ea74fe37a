use std::path::Path;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

use crate::error::{AnalyticsError, Result};
use crate::models::{
    Achievement, DailyNutrition, NewNutrition, NewSession, NewWeight, UserHistory, WeightEntry,
    WorkoutSession,
};

/// How long a writer waits for another connection's lock before giving up
const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS workout_sessions (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id          INTEGER NOT NULL,
    workout_id       INTEGER NOT NULL,
    category         TEXT,
    level            TEXT,
    start_time       TEXT,
    end_time         TEXT,
    duration_minutes INTEGER,
    calories_burned  INTEGER,
    rating           INTEGER,
    completed        INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON workout_sessions (user_id, start_time);

CREATE TABLE IF NOT EXISTS weight_entries (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL,
    recorded_at TEXT,
    weight_kg   REAL
);
CREATE INDEX IF NOT EXISTS idx_weights_user ON weight_entries (user_id, recorded_at);

CREATE TABLE IF NOT EXISTS achievements (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL,
    name        TEXT NOT NULL,
    unlocked_at TEXT NOT NULL,
    UNIQUE (user_id, name)
);

CREATE TABLE IF NOT EXISTS nutrition_entries (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id   INTEGER NOT NULL,
    date      TEXT NOT NULL,
    calories  INTEGER NOT NULL DEFAULT 0,
    carbs_g   REAL NOT NULL DEFAULT 0,
    protein_g REAL NOT NULL DEFAULT 0,
    fat_g     REAL NOT NULL DEFAULT 0,
    UNIQUE (user_id, date)
);
";

const SESSION_COLUMNS: &str = "user_id, workout_id, category, level, start_time, end_time, \
     duration_minutes, calories_burned, rating, completed";

/// Raw session row; every nullable column stays optional until validated
type SessionRow = (
    i64,
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    i64,
);

/// SQLite-backed store for sessions, weights, achievements and daily nutrition.
/// Sessions are immutable once written; weights are append-only.
pub struct SessionStore {
    conn: Connection,
}

impl SessionStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "session store opened");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Everything the analytics pipeline needs for one user
    pub fn load_history(&self, user_id: i64) -> Result<UserHistory> {
        Ok(UserHistory {
            sessions: self.completed_sessions(user_id)?,
            weights: self.weight_history(user_id)?,
            achievements: self.achievements(user_id)?,
        })
    }

    /// Completed sessions for a user, oldest first. Malformed rows are skipped.
    pub fn completed_sessions(&self, user_id: i64) -> Result<Vec<WorkoutSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM workout_sessions \
             WHERE user_id = ?1 AND completed = 1 ORDER BY start_time, id"
        );
        self.query_sessions(&sql, params![user_id])
    }

    /// Completed sessions whose start date falls in `[from, to]`
    pub fn sessions_between(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<WorkoutSession>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM workout_sessions \
             WHERE user_id = ?1 AND completed = 1 \
             AND date(start_time) >= date(?2) AND date(start_time) <= date(?3) \
             ORDER BY start_time, id"
        );
        self.query_sessions(
            &sql,
            params![user_id, from.to_string(), to.to_string()],
        )
    }

    fn query_sessions(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<WorkoutSession>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| -> rusqlite::Result<SessionRow> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
            ))
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            let Some(raw) = skip_bad_column(row, "workout_sessions")? else {
                continue;
            };
            match session_from_row(raw) {
                Ok(session) => sessions.push(session),
                Err(reason) => {
                    tracing::warn!(table = "workout_sessions", %reason, "skipping malformed row");
                }
            }
        }
        Ok(sessions)
    }

    /// Weight entries for a user, oldest first. Malformed rows are skipped.
    pub fn weight_history(&self, user_id: i64) -> Result<Vec<WeightEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, recorded_at, weight_kg FROM weight_entries \
             WHERE user_id = ?1 ORDER BY recorded_at, id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<f64>>(2)?,
            ))
        })?;

        let mut weights = Vec::new();
        for row in rows {
            let Some((user_id, recorded_at, weight_kg)) = skip_bad_column(row, "weight_entries")?
            else {
                continue;
            };
            let entry = match (recorded_at.as_deref().and_then(parse_timestamp), weight_kg) {
                (Some(recorded_at), Some(weight_kg))
                    if weight_kg.is_finite() && weight_kg > 0.0 =>
                {
                    WeightEntry {
                        user_id,
                        recorded_at,
                        weight_kg,
                    }
                }
                _ => {
                    tracing::warn!(
                        table = "weight_entries",
                        ?recorded_at,
                        ?weight_kg,
                        "skipping malformed row"
                    );
                    continue;
                }
            };
            weights.push(entry);
        }
        Ok(weights)
    }

    pub fn achievements(&self, user_id: i64) -> Result<Vec<Achievement>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, name, unlocked_at FROM achievements \
             WHERE user_id = ?1 ORDER BY unlocked_at, id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut achievements = Vec::new();
        for row in rows {
            let Some((user_id, name, unlocked_at)) = skip_bad_column(row, "achievements")? else {
                continue;
            };
            match parse_timestamp(&unlocked_at) {
                Some(unlocked_at) => achievements.push(Achievement {
                    user_id,
                    name,
                    unlocked_at,
                }),
                None => {
                    tracing::warn!(table = "achievements", %unlocked_at, "skipping malformed row");
                }
            }
        }
        Ok(achievements)
    }

    /// Store a completed session. The end time is derived from the duration.
    pub fn record_session(&self, user_id: i64, session: &NewSession) -> Result<i64> {
        validate_session(session)?;
        let end_time = session.start_time + Duration::minutes(i64::from(session.duration_minutes));
        self.conn.execute(
            "INSERT INTO workout_sessions \
             (user_id, workout_id, category, level, start_time, end_time, \
              duration_minutes, calories_burned, rating, completed) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1)",
            params![
                user_id,
                session.workout_id,
                session.category.trim(),
                session.level.trim(),
                session.start_time,
                end_time,
                session.duration_minutes,
                session.calories_burned,
                session.rating,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::info!(
            user_id,
            session_id = id,
            workout_id = session.workout_id,
            "session recorded"
        );
        Ok(id)
    }

    /// Append a weight sample; `now` is used when the entry carries no timestamp
    pub fn record_weight(
        &self,
        user_id: i64,
        entry: &NewWeight,
        now: NaiveDateTime,
    ) -> Result<i64> {
        if !entry.weight_kg.is_finite() || entry.weight_kg <= 0.0 {
            return Err(AnalyticsError::invalid_input(format!(
                "weight must be a positive number, got {}",
                entry.weight_kg
            )));
        }
        let recorded_at = entry.recorded_at.unwrap_or(now);
        self.conn.execute(
            "INSERT INTO weight_entries (user_id, recorded_at, weight_kg) VALUES (?1, ?2, ?3)",
            params![user_id, recorded_at, entry.weight_kg],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::info!(user_id, weight_id = id, "weight recorded");
        Ok(id)
    }

    /// Grant an achievement once. Returns `false` if the user already had it,
    /// including when another connection granted it first.
    pub fn grant_achievement(&self, user_id: i64, name: &str, at: NaiveDateTime) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO achievements (user_id, name, unlocked_at) VALUES (?1, ?2, ?3)",
            params![user_id, name, at],
        )?;
        if inserted == 1 {
            tracing::info!(user_id, achievement = name, "achievement unlocked");
        }
        Ok(inserted == 1)
    }

    /// Add a meal's intake to the user's total for its day (`today` when undated).
    /// Returns the day's new totals.
    pub fn record_nutrition(
        &self,
        user_id: i64,
        entry: &NewNutrition,
        today: NaiveDate,
    ) -> Result<DailyNutrition> {
        validate_nutrition(entry)?;
        let date = entry.date.unwrap_or(today);
        self.conn.execute(
            "INSERT INTO nutrition_entries (user_id, date, calories, carbs_g, protein_g, fat_g) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT (user_id, date) DO UPDATE SET \
                 calories = calories + excluded.calories, \
                 carbs_g = carbs_g + excluded.carbs_g, \
                 protein_g = protein_g + excluded.protein_g, \
                 fat_g = fat_g + excluded.fat_g",
            params![
                user_id,
                date.to_string(),
                entry.calories,
                entry.carbs_g,
                entry.protein_g,
                entry.fat_g,
            ],
        )?;
        tracing::info!(user_id, %date, calories = entry.calories, "nutrition recorded");

        self.daily_nutrition(user_id, date)?.ok_or_else(|| {
            AnalyticsError::Internal(format!("no nutrition row for {date} after write"))
        })
    }

    /// Totals logged for one day, or `None` if nothing was logged
    pub fn daily_nutrition(&self, user_id: i64, date: NaiveDate) -> Result<Option<DailyNutrition>> {
        Ok(self.nutrition_between(user_id, date, date)?.into_iter().next())
    }

    /// Daily totals in `[from, to]`, oldest first. Malformed rows are skipped.
    pub fn nutrition_between(
        &self,
        user_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyNutrition>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, date, calories, carbs_g, protein_g, fat_g FROM nutrition_entries \
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3 ORDER BY date",
        )?;
        let rows = stmt.query_map(params![user_id, from.to_string(), to.to_string()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, f64>(5)?,
            ))
        })?;

        let mut days = Vec::new();
        for row in rows {
            let Some((user_id, date, calories, carbs_g, protein_g, fat_g)) =
                skip_bad_column(row, "nutrition_entries")?
            else {
                continue;
            };
            match (NaiveDate::parse_from_str(&date, "%Y-%m-%d"), u32::try_from(calories)) {
                (Ok(date), Ok(calories)) => days.push(DailyNutrition {
                    user_id,
                    date,
                    calories,
                    carbs_g,
                    protein_g,
                    fat_g,
                }),
                _ => {
                    tracing::warn!(
                        table = "nutrition_entries",
                        %date,
                        calories,
                        "skipping malformed row"
                    );
                }
            }
        }
        Ok(days)
    }

    /// Run `f` inside one write transaction. The lock is taken up front so two
    /// writers queue on the busy timeout instead of failing mid-transaction.
    /// Any error rolls back everything `f` wrote.
    pub fn write_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Column type mismatches only spoil one row; anything else means the store is unreadable
fn skip_bad_column<T>(row: rusqlite::Result<T>, table: &'static str) -> Result<Option<T>> {
    match row {
        Ok(value) => Ok(Some(value)),
        Err(
            e @ (rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)),
        ) => {
            tracing::warn!(table, error = %e, "skipping unreadable row");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn validate_session(session: &NewSession) -> Result<()> {
    if !(1..=5).contains(&session.rating) {
        return Err(AnalyticsError::invalid_input(format!(
            "rating must be between 1 and 5, got {}",
            session.rating
        )));
    }
    if session.category.trim().is_empty() || session.level.trim().is_empty() {
        return Err(AnalyticsError::invalid_input("category and level are required"));
    }
    Ok(())
}

fn validate_nutrition(entry: &NewNutrition) -> Result<()> {
    let grams = [
        ("carbs_g", entry.carbs_g),
        ("protein_g", entry.protein_g),
        ("fat_g", entry.fat_g),
    ];
    for (field, value) in grams {
        if !value.is_finite() || value < 0.0 {
            return Err(AnalyticsError::invalid_input(format!(
                "{field} must be a non-negative number, got {value}"
            )));
        }
    }
    Ok(())
}

fn session_from_row(raw: SessionRow) -> std::result::Result<WorkoutSession, String> {
    let (user_id, workout_id, category, level, start, end, duration, calories, rating, completed) =
        raw;

    let start_raw = start.ok_or("start_time is NULL")?;
    let start_time = parse_timestamp(&start_raw)
        .ok_or_else(|| format!("unparseable start_time '{start_raw}'"))?;
    let end_time = match end {
        Some(end_raw) => parse_timestamp(&end_raw)
            .ok_or_else(|| format!("unparseable end_time '{end_raw}'"))?,
        None => start_time,
    };
    let category = category
        .filter(|c| !c.trim().is_empty())
        .ok_or("category is NULL")?;
    let level = level.filter(|l| !l.trim().is_empty()).ok_or("level is NULL")?;

    let duration_minutes = non_negative(duration, "duration_minutes")?;
    let calories_burned = non_negative(calories, "calories_burned")?;
    let rating = rating.ok_or("rating is NULL")?;
    if !(1..=5).contains(&rating) {
        return Err(format!("rating {rating} outside 1-5"));
    }

    Ok(WorkoutSession {
        user_id,
        workout_id,
        category,
        level,
        start_time,
        end_time,
        duration_minutes,
        calories_burned,
        rating: rating as u8,
        completed: completed == 1,
    })
}

fn non_negative(value: Option<i64>, column: &str) -> std::result::Result<u32, String> {
    let value = value.ok_or_else(|| format!("{column} is NULL"))?;
    u32::try_from(value).map_err(|_| format!("{column} out of range: {value}"))
}

/// Accepts `YYYY-MM-DD HH:MM:SS[.fff]`, the `T`-separated form, or a bare date (midnight)
pub(crate) fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}
