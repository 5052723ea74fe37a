use std::collections::BTreeSet;

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime};

use crate::config::{DEFAULT_MONTHLY_WINDOW, DEFAULT_WEEKLY_WINDOW};
use crate::metrics::{self, MetricsAggregator};
use crate::models::{
    FitnessMetrics, FitnessReport, MonthlyReport, UserHistory, WeeklyProgress, WeightEntry,
    WorkoutSession,
};
use crate::trends::{self, TrendAnalyzer};

pub const FIRST_WORKOUT_TIP: &str = "Start by logging your first workouts";
pub const NO_ACTIVITY_SUMMARY: &str = "Start your fitness journey by logging your first workout.";

pub const WELLNESS_TIPS: [&str; 3] = [
    "Stay well hydrated throughout the day",
    "Aim for 7-9 hours of sleep for optimal recovery",
    "Log your workouts regularly to keep track of your progress",
];

/// Request-scoped inputs for one report
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub user_id: i64,
    pub now: NaiveDateTime,
    pub weekly_window: usize,
    pub monthly_window: usize,
}

impl ReportContext {
    pub fn new(user_id: i64, now: NaiveDateTime) -> Self {
        Self {
            user_id,
            now,
            weekly_window: DEFAULT_WEEKLY_WINDOW,
            monthly_window: DEFAULT_MONTHLY_WINDOW,
        }
    }

    pub fn with_windows(mut self, weekly_window: usize, monthly_window: usize) -> Self {
        self.weekly_window = weekly_window;
        self.monthly_window = monthly_window;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }
}

/// Combines metrics, rollups, trends and patterns into a `FitnessReport`
pub struct ReportComposer<'a> {
    history: &'a UserHistory,
    sessions: Vec<&'a WorkoutSession>,
    weights: Vec<&'a WeightEntry>,
}

impl<'a> ReportComposer<'a> {
    pub fn new(history: &'a UserHistory) -> Self {
        Self {
            history,
            sessions: history.completed_sessions(),
            weights: history.ordered_weights(),
        }
    }

    pub fn generate_report(&self, ctx: &ReportContext) -> FitnessReport {
        let today = ctx.today();
        let metrics = MetricsAggregator::new(self.history).calculate_fitness_metrics(today);
        let analyzer = TrendAnalyzer::new(self.history);

        let report = FitnessReport {
            user_id: ctx.user_id,
            generated_at: ctx.now,
            weekly_progress: self.weekly_progress(today, ctx.weekly_window),
            monthly_reports: self.monthly_reports(today, ctx.monthly_window),
            trend_analysis: analyzer.analyze_trends(),
            pattern_analysis: analyzer.analyze_patterns(),
            recommendations: self.recommendations(&metrics),
            summary: self.summary(&metrics),
            metrics,
        };

        tracing::debug!(
            user_id = ctx.user_id,
            workouts = report.metrics.total_workouts,
            weeks = report.weekly_progress.len(),
            months = report.monthly_reports.len(),
            "report generated"
        );
        report
    }

    /// Seven-day windows ending at `today`, newest first. Week 0 covers `today - 6 ..= today`.
    /// Weeks without sessions are left out. Stops early at the start of the calendar.
    pub fn weekly_progress(&self, today: NaiveDate, weeks: usize) -> Vec<WeeklyProgress> {
        (0..weeks)
            .map_while(|i| {
                let week_end = today.checked_sub_signed(Duration::days(7 * i as i64))?;
                let week_start = week_end.checked_sub_signed(Duration::days(6))?;
                Some((week_start, week_end))
            })
            .filter_map(|(week_start, week_end)| {
                let in_week = self.sessions_in(week_start, week_end);
                if in_week.is_empty() {
                    return None;
                }

                let ratings: u64 = in_week.iter().map(|s| u64::from(s.rating)).sum();
                Some(WeeklyProgress {
                    week_start,
                    week_end,
                    workouts_completed: in_week.len() as u32,
                    calories_burned: metrics::total_calories(&in_week),
                    minutes_trained: metrics::total_minutes(&in_week),
                    average_rating: metrics::round_to(ratings as f64 / in_week.len() as f64, 1),
                })
            })
            .collect()
    }

    /// Calendar months counting back from the current one, newest first.
    /// The current month ends at `today`; months without sessions are left out.
    /// Stops early at the start of the calendar.
    pub fn monthly_reports(&self, today: NaiveDate, months: usize) -> Vec<MonthlyReport> {
        let Some(current_month) = today.with_day(1) else {
            return Vec::new();
        };

        (0..months)
            .map_while(|i| {
                let month_start =
                    current_month.checked_sub_months(Months::new(u32::try_from(i).ok()?))?;
                let month_end = if i == 0 {
                    today
                } else {
                    month_start.checked_add_months(Months::new(1))?.pred_opt()?
                };
                Some((month_start, month_end))
            })
            .filter_map(|(month_start, month_end)| {
                let in_month = self.sessions_in(month_start, month_end);
                if in_month.is_empty() {
                    return None;
                }

                Some(MonthlyReport {
                    month: month_start.format("%B").to_string(),
                    year: month_start.year(),
                    total_workouts: in_month.len() as u32,
                    total_calories: metrics::total_calories(&in_month),
                    total_minutes: metrics::total_minutes(&in_month),
                    weight_change: self.weight_change_between(month_start, month_end),
                    achievements_unlocked: self
                        .history
                        .achievements
                        .iter()
                        .filter(|a| (month_start..=month_end).contains(&a.unlocked_at.date()))
                        .count() as u32,
                    favorite_category: trends::mode(in_month.iter().map(|s| s.category.as_str()))
                        .unwrap_or("N/A")
                        .to_string(),
                    improvement_areas: improvement_areas(&in_month),
                })
            })
            .collect()
    }

    /// Threshold-based suggestions followed by the fixed wellness tips
    pub fn recommendations(&self, metrics: &FitnessMetrics) -> Vec<String> {
        let mut recommendations = Vec::new();

        if self.sessions.is_empty() {
            recommendations.push(FIRST_WORKOUT_TIP.to_string());
        } else {
            if metrics.workout_frequency < 3.0 {
                recommendations
                    .push("Try to train at least 3 times a week for better results".to_string());
            }
            if metrics.average_duration < 20.0 {
                recommendations
                    .push("Consider extending your workouts to 20-30 minutes".to_string());
            }
            if metrics.calories_per_minute < 8.0 {
                recommendations.push(
                    "Increase the intensity of your workouts to burn more calories".to_string(),
                );
            }
            if distinct_categories(&self.sessions) < 3 {
                recommendations
                    .push("Vary your workouts by including different categories".to_string());
            }
            if let Some(change) = self.weight_change() {
                if change.abs() < 0.5 {
                    recommendations.push(
                        "Consider adjusting your nutrition plan to speed up your progress"
                            .to_string(),
                    );
                }
            }
        }

        recommendations.extend(WELLNESS_TIPS.iter().map(|tip| tip.to_string()));
        recommendations
    }

    /// Plain-language summary; sentences with nothing to report are left out.
    /// Without completed sessions the weight history alone says nothing.
    pub fn summary(&self, metrics: &FitnessMetrics) -> String {
        if self.sessions.is_empty() {
            return NO_ACTIVITY_SUMMARY.to_string();
        }

        let workouts = if metrics.total_workouts == 1 {
            "workout"
        } else {
            "workouts"
        };
        let mut parts = vec![format!(
            "You have completed {} {workouts}, burning a total of {} calories \
             in {} minutes of activity.",
            metrics.total_workouts,
            group_thousands(metrics.total_calories),
            group_thousands(metrics.total_minutes),
        )];

        if let Some(change) = self.weight_change() {
            if change > 0.0 {
                parts.push(format!("Your weight has increased by {:.1} kg.", change.abs()));
            } else if change < 0.0 {
                parts.push(format!("Great work! You have lost {:.1} kg.", change.abs()));
            } else {
                parts.push("Your weight has remained stable.".to_string());
            }
        }

        if metrics.streak_days > 0 {
            parts.push(format!(
                "You are on a streak of {} consecutive days.",
                metrics.streak_days
            ));
        }

        parts.join(" ")
    }

    fn sessions_in(&self, start: NaiveDate, end: NaiveDate) -> Vec<&'a WorkoutSession> {
        self.sessions
            .iter()
            .copied()
            .filter(|s| (start..=end).contains(&s.date()))
            .collect()
    }

    /// Last weight minus first; `None` with fewer than two entries
    fn weight_change(&self) -> Option<f64> {
        weight_delta(&self.weights)
    }

    fn weight_change_between(&self, start: NaiveDate, end: NaiveDate) -> f64 {
        let in_window: Vec<&WeightEntry> = self
            .weights
            .iter()
            .copied()
            .filter(|w| (start..=end).contains(&w.recorded_at.date()))
            .collect();
        weight_delta(&in_window)
            .map(|delta| metrics::round_to(delta, 2))
            .unwrap_or(0.0)
    }
}

/// Convenience wrapper over `ReportComposer::generate_report`
pub fn generate_report(history: &UserHistory, ctx: &ReportContext) -> FitnessReport {
    ReportComposer::new(history).generate_report(ctx)
}

fn weight_delta(weights: &[&WeightEntry]) -> Option<f64> {
    match (weights.first(), weights.last()) {
        (Some(first), Some(last)) if weights.len() > 1 => Some(last.weight_kg - first.weight_kg),
        _ => None,
    }
}

fn distinct_categories(sessions: &[&WorkoutSession]) -> usize {
    sessions
        .iter()
        .map(|s| s.category.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Areas to work on within one month of sessions
pub fn improvement_areas(sessions: &[&WorkoutSession]) -> Vec<String> {
    let mut areas = Vec::new();
    if sessions.is_empty() {
        return areas;
    }

    let total_minutes = metrics::total_minutes(sessions);
    let average_duration = total_minutes as f64 / sessions.len() as f64;
    if average_duration < 20.0 {
        areas.push("Increase workout duration".to_string());
    }
    if sessions.len() < 3 {
        areas.push("Increase workout frequency".to_string());
    }
    if distinct_categories(sessions) < 2 {
        areas.push("Vary workout types".to_string());
    }
    if metrics::calories_per_minute(metrics::total_calories(sessions), total_minutes) < 8.0 {
        areas.push("Increase workout intensity".to_string());
    }
    areas
}

/// `1234567` -> `"1,234,567"`
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
