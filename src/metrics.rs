use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::models::{FitnessMetrics, UserHistory, UserStats, WeightEntry, WorkoutSession};

/// Computes scalar metrics from one user's history.
/// Only completed sessions count; nothing is cached between calls.
pub struct MetricsAggregator<'a> {
    sessions: Vec<&'a WorkoutSession>,
    weights: Vec<&'a WeightEntry>,
    history: &'a UserHistory,
}

impl<'a> MetricsAggregator<'a> {
    pub fn new(history: &'a UserHistory) -> Self {
        Self {
            sessions: history.completed_sessions(),
            weights: history.ordered_weights(),
            history,
        }
    }

    pub fn calculate_fitness_metrics(&self, today: NaiveDate) -> FitnessMetrics {
        if self.sessions.is_empty() {
            return FitnessMetrics::default();
        }

        let total_workouts = self.sessions.len() as u32;
        let total_calories = total_calories(&self.sessions);
        let total_minutes = total_minutes(&self.sessions);
        let average_duration = total_minutes as f64 / f64::from(total_workouts);

        FitnessMetrics {
            total_workouts,
            total_calories,
            total_minutes,
            average_duration: round_to(average_duration, 1),
            calories_per_minute: round_to(calories_per_minute(total_calories, total_minutes), 2),
            workout_frequency: round_to(self.workout_frequency(), 1),
            streak_days: calculate_streak(&self.sessions, today),
            weight_loss: round_to(weight_loss(&self.weights), 2),
        }
    }

    /// Sessions per week, extrapolated from the span between the first and last session day
    fn workout_frequency(&self) -> f64 {
        if self.sessions.len() < 2 {
            return 0.0;
        }
        let dates = self.sessions.iter().map(|s| s.date());
        let (Some(first), Some(last)) = (dates.clone().min(), dates.max()) else {
            return 0.0;
        };
        let span_days = (last - first).num_days().max(1);
        self.sessions.len() as f64 / span_days as f64 * 7.0
    }

    /// Lifetime totals plus today's activity, for dashboard counters
    pub fn user_stats(&self, today: NaiveDate) -> UserStats {
        let todays: Vec<&WorkoutSession> = self
            .sessions
            .iter()
            .copied()
            .filter(|s| s.date() == today)
            .collect();

        UserStats {
            total_workouts: self.sessions.len() as u32,
            total_calories: total_calories(&self.sessions),
            total_minutes: total_minutes(&self.sessions),
            today_calories: total_calories(&todays),
            today_minutes: total_minutes(&todays),
            weight_progress: self
                .weights
                .iter()
                .map(|w| (w.recorded_at.date(), w.weight_kg))
                .collect(),
            achievements: self
                .history
                .achievements
                .iter()
                .rev()
                .map(|a| a.name.clone())
                .collect(),
        }
    }
}

pub(crate) fn total_calories(sessions: &[&WorkoutSession]) -> u64 {
    sessions.iter().map(|s| u64::from(s.calories_burned)).sum()
}

pub(crate) fn total_minutes(sessions: &[&WorkoutSession]) -> u64 {
    sessions.iter().map(|s| u64::from(s.duration_minutes)).sum()
}

/// Zero when no minutes were trained
pub(crate) fn calories_per_minute(total_calories: u64, total_minutes: u64) -> f64 {
    if total_minutes == 0 {
        0.0
    } else {
        total_calories as f64 / total_minutes as f64
    }
}

/// Consecutive days with a session, walking back from `today`.
/// If nothing was logged today yet the walk starts at yesterday, so the streak
/// survives until a full day is missed.
pub fn calculate_streak(sessions: &[&WorkoutSession], today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = sessions.iter().map(|s| s.date()).collect();
    if days.is_empty() {
        return 0;
    }

    let mut cursor = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) => yesterday,
            None => return 0,
        }
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        match cursor.pred_opt() {
            Some(prev) => cursor = prev,
            None => break,
        }
    }
    streak
}

/// First recorded weight minus the last; zero with fewer than two entries
pub(crate) fn weight_loss(weights: &[&WeightEntry]) -> f64 {
    match (weights.first(), weights.last()) {
        (Some(first), Some(last)) if weights.len() > 1 => first.weight_kg - last.weight_kg,
        _ => 0.0,
    }
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDateTime};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session(start: NaiveDateTime, minutes: u32, calories: u32) -> WorkoutSession {
        WorkoutSession {
            user_id: 1,
            workout_id: 1,
            category: "cardio".to_string(),
            level: "beginner".to_string(),
            start_time: start,
            end_time: start + Duration::minutes(i64::from(minutes)),
            duration_minutes: minutes,
            calories_burned: calories,
            rating: 4,
            completed: true,
        }
    }

    fn on(date: NaiveDate, minutes: u32, calories: u32) -> WorkoutSession {
        session(date.and_hms_opt(8, 0, 0).unwrap(), minutes, calories)
    }

    fn weight(date: NaiveDate, kg: f64) -> WeightEntry {
        WeightEntry {
            user_id: 1,
            recorded_at: date.and_hms_opt(7, 0, 0).unwrap(),
            weight_kg: kg,
        }
    }

    #[test]
    fn test_empty_history_is_all_zero() {
        let history = UserHistory::default();
        let metrics = MetricsAggregator::new(&history).calculate_fitness_metrics(day(2024, 1, 10));
        assert_eq!(metrics, FitnessMetrics::default());
    }

    #[test]
    fn test_totals_only_count_completed_sessions() {
        let mut abandoned = on(day(2024, 1, 3), 10, 5000);
        abandoned.completed = false;
        let history = UserHistory {
            sessions: vec![
                on(day(2024, 1, 1), 25, 200),
                on(day(2024, 1, 2), 35, 280),
                abandoned,
                on(day(2024, 1, 3), 25, 120),
            ],
            ..Default::default()
        };

        let metrics = MetricsAggregator::new(&history).calculate_fitness_metrics(day(2024, 1, 3));
        assert_eq!(metrics.total_workouts, 3);
        assert_eq!(metrics.total_calories, 600);
        assert_eq!(metrics.total_minutes, 85);
        assert_eq!(metrics.average_duration, 28.3);
        assert_eq!(metrics.calories_per_minute, 7.06);
        // 3 sessions over a 2-day span
        assert_eq!(metrics.workout_frequency, 10.5);
        assert_eq!(metrics.streak_days, 3);
    }

    #[test]
    fn test_zero_minutes_gives_zero_rate() {
        let history = UserHistory {
            sessions: vec![on(day(2024, 1, 1), 0, 150)],
            ..Default::default()
        };
        let metrics = MetricsAggregator::new(&history).calculate_fitness_metrics(day(2024, 1, 1));
        assert_eq!(metrics.total_minutes, 0);
        assert_eq!(metrics.calories_per_minute, 0.0);
        assert_eq!(calories_per_minute(150, 0), 0.0);
    }

    #[test]
    fn test_single_session_has_no_frequency() {
        let history = UserHistory {
            sessions: vec![on(day(2024, 1, 1), 30, 200)],
            ..Default::default()
        };
        let metrics = MetricsAggregator::new(&history).calculate_fitness_metrics(day(2024, 1, 1));
        assert_eq!(metrics.workout_frequency, 0.0);
    }

    #[test]
    fn test_same_day_sessions_use_one_day_span() {
        let date = day(2024, 1, 1);
        let history = UserHistory {
            sessions: vec![
                session(date.and_hms_opt(8, 0, 0).unwrap(), 20, 100),
                session(date.and_hms_opt(18, 0, 0).unwrap(), 20, 100),
            ],
            ..Default::default()
        };
        let metrics = MetricsAggregator::new(&history).calculate_fitness_metrics(date);
        assert_eq!(metrics.workout_frequency, 14.0);
    }

    #[test]
    fn test_streak_stops_at_first_gap() {
        let today = day(2024, 3, 10);
        let sessions = [
            on(today, 30, 200),
            on(today - Duration::days(1), 30, 200),
            on(today - Duration::days(3), 30, 200),
        ];
        let refs: Vec<&WorkoutSession> = sessions.iter().collect();
        assert_eq!(calculate_streak(&refs, today), 2);
    }

    #[test]
    fn test_streak_counts_from_yesterday_when_today_is_empty() {
        let today = day(2024, 3, 10);
        let sessions = [
            on(today - Duration::days(1), 30, 200),
            on(today - Duration::days(2), 30, 200),
        ];
        let refs: Vec<&WorkoutSession> = sessions.iter().collect();
        assert_eq!(calculate_streak(&refs, today), 2);

        let stale = [on(today - Duration::days(2), 30, 200)];
        let refs: Vec<&WorkoutSession> = stale.iter().collect();
        assert_eq!(calculate_streak(&refs, today), 0);
    }

    #[test]
    fn test_multiple_sessions_per_day_count_once() {
        let today = day(2024, 3, 10);
        let sessions = [
            session(today.and_hms_opt(7, 0, 0).unwrap(), 20, 100),
            session(today.and_hms_opt(19, 0, 0).unwrap(), 20, 100),
        ];
        let refs: Vec<&WorkoutSession> = sessions.iter().collect();
        assert_eq!(calculate_streak(&refs, today), 1);
    }

    #[test]
    fn test_weight_loss_first_minus_last() {
        let history = UserHistory {
            sessions: vec![on(day(2024, 1, 30), 30, 200)],
            weights: vec![weight(day(2024, 1, 30), 78.0), weight(day(2024, 1, 1), 80.0)],
            ..Default::default()
        };
        let metrics = MetricsAggregator::new(&history).calculate_fitness_metrics(day(2024, 1, 30));
        assert_eq!(metrics.weight_loss, 2.0);

        let single = [weight(day(2024, 1, 1), 80.0)];
        let refs: Vec<&WeightEntry> = single.iter().collect();
        assert_eq!(weight_loss(&refs), 0.0);
    }

    #[test]
    fn test_aggregation_is_idempotent() {
        let history = UserHistory {
            sessions: vec![
                on(day(2024, 1, 1), 25, 200),
                on(day(2024, 1, 4), 40, 410),
            ],
            weights: vec![weight(day(2024, 1, 1), 75.5), weight(day(2024, 1, 4), 75.2)],
            ..Default::default()
        };
        let today = day(2024, 1, 4);
        let aggregate = || MetricsAggregator::new(&history).calculate_fitness_metrics(today);
        let first = serde_json::to_string(&aggregate()).unwrap();
        let second = serde_json::to_string(&aggregate()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_user_stats_today() {
        let today = day(2024, 1, 5);
        let history = UserHistory {
            sessions: vec![on(day(2024, 1, 4), 30, 250), on(today, 15, 140)],
            weights: vec![weight(day(2024, 1, 1), 75.5)],
            achievements: vec![],
        };
        let stats = MetricsAggregator::new(&history).user_stats(today);
        assert_eq!(stats.total_workouts, 2);
        assert_eq!(stats.total_calories, 390);
        assert_eq!(stats.today_calories, 140);
        assert_eq!(stats.today_minutes, 15);
        assert_eq!(stats.weight_progress, vec![(day(2024, 1, 1), 75.5)]);
    }
}
