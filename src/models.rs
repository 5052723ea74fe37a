use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One completed (or abandoned) workout, as stored by the session store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub user_id: i64,
    pub workout_id: i64,
    pub category: String,
    pub level: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub duration_minutes: u32,
    pub calories_burned: u32,
    /// 1..=5
    pub rating: u8,
    pub completed: bool,
}

impl WorkoutSession {
    /// Calendar day the session started on
    pub fn date(&self) -> NaiveDate {
        self.start_time.date()
    }
}

/// Body weight sample (append-only per user)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub user_id: i64,
    pub recorded_at: NaiveDateTime,
    pub weight_kg: f64,
}

/// Achievement granted to a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub user_id: i64,
    pub name: String,
    pub unlocked_at: NaiveDateTime,
}

/// Snapshot of everything the analytics need for one user.
/// Sessions and weights are ordered by time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserHistory {
    pub sessions: Vec<WorkoutSession>,
    pub weights: Vec<WeightEntry>,
    pub achievements: Vec<Achievement>,
}

impl UserHistory {
    /// Completed sessions in start-time order (stable for equal timestamps)
    pub fn completed_sessions(&self) -> Vec<&WorkoutSession> {
        let mut completed: Vec<&WorkoutSession> =
            self.sessions.iter().filter(|s| s.completed).collect();
        completed.sort_by_key(|s| s.start_time);
        completed
    }

    /// Weight entries in recording order
    pub fn ordered_weights(&self) -> Vec<&WeightEntry> {
        let mut weights: Vec<&WeightEntry> = self.weights.iter().collect();
        weights.sort_by_key(|w| w.recorded_at);
        weights
    }
}

/// Scalar metrics derived from a user's history
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FitnessMetrics {
    pub total_workouts: u32,
    pub total_calories: u64,
    pub total_minutes: u64,
    pub average_duration: f64,
    pub calories_per_minute: f64,
    /// Sessions per week
    pub workout_frequency: f64,
    pub streak_days: u32,
    /// First weight minus last weight; positive means loss
    pub weight_loss: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyProgress {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub workouts_completed: u32,
    pub calories_burned: u64,
    pub minutes_trained: u64,
    pub average_rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyReport {
    pub month: String,
    pub year: i32,
    pub total_workouts: u32,
    pub total_calories: u64,
    pub total_minutes: u64,
    pub weight_change: f64,
    pub achievements_unlocked: u32,
    pub favorite_category: String,
    pub improvement_areas: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// Direction of each linear fit; a field is absent when there were too few points
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrendAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories_trend: Option<TrendDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_trend: Option<TrendDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_trend: Option<TrendDirection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatternAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_active_day: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_active_hour: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_frequent_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_common_level: Option<String>,
}

/// Full report bundle handed to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitnessReport {
    pub user_id: i64,
    pub generated_at: NaiveDateTime,
    pub metrics: FitnessMetrics,
    pub weekly_progress: Vec<WeeklyProgress>,
    pub monthly_reports: Vec<MonthlyReport>,
    pub trend_analysis: TrendAnalysis,
    pub pattern_analysis: PatternAnalysis,
    pub recommendations: Vec<String>,
    pub summary: String,
}

/// Dashboard counters: lifetime totals plus today's activity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserStats {
    pub total_workouts: u32,
    pub total_calories: u64,
    pub total_minutes: u64,
    pub today_calories: u64,
    pub today_minutes: u64,
    pub weight_progress: Vec<(NaiveDate, f64)>,
    pub achievements: Vec<String>,
}

/// Completed session submitted through the API
#[derive(Debug, Clone, Deserialize)]
pub struct NewSession {
    pub workout_id: i64,
    pub category: String,
    pub level: String,
    pub start_time: NaiveDateTime,
    pub duration_minutes: u32,
    pub calories_burned: u32,
    pub rating: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWeight {
    pub recorded_at: Option<NaiveDateTime>,
    pub weight_kg: f64,
}

/// One meal or snack; intake is summed per calendar day
#[derive(Debug, Clone, Deserialize)]
pub struct NewNutrition {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub calories: u32,
    #[serde(default)]
    pub carbs_g: f64,
    #[serde(default)]
    pub protein_g: f64,
    #[serde(default)]
    pub fat_g: f64,
}

/// Everything a user logged for one day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyNutrition {
    pub user_id: i64,
    pub date: NaiveDate,
    pub calories: u32,
    pub carbs_g: f64,
    pub protein_g: f64,
    pub fat_g: f64,
}

/// API Response
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}
