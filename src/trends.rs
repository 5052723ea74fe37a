use chrono::Timelike;

use crate::models::{PatternAnalysis, TrendAnalysis, TrendDirection, UserHistory, WorkoutSession};

/// Slopes smaller than this are treated as flat
const FLAT_SLOPE: f64 = 1e-9;

/// Fits linear trends and finds recurring patterns in completed sessions
pub struct TrendAnalyzer<'a> {
    sessions: Vec<&'a WorkoutSession>,
}

impl<'a> TrendAnalyzer<'a> {
    pub fn new(history: &'a UserHistory) -> Self {
        Self {
            sessions: history.completed_sessions(),
        }
    }

    pub fn analyze_trends(&self) -> TrendAnalysis {
        TrendAnalysis {
            calories_trend: trend_direction(&self.series(|s| f64::from(s.calories_burned))),
            duration_trend: trend_direction(&self.series(|s| f64::from(s.duration_minutes))),
            rating_trend: trend_direction(&self.series(|s| f64::from(s.rating))),
        }
    }

    /// One value per session, in session order
    fn series(&self, value: impl Fn(&WorkoutSession) -> f64) -> Vec<f64> {
        self.sessions.iter().map(|s| value(*s)).collect()
    }

    pub fn analyze_patterns(&self) -> PatternAnalysis {
        PatternAnalysis {
            most_active_day: heaviest(
                self.sessions
                    .iter()
                    .map(|s| (s.start_time.format("%A").to_string(), s.calories_burned)),
            ),
            most_active_hour: heaviest(
                self.sessions
                    .iter()
                    .map(|s| (s.start_time.hour(), s.calories_burned)),
            ),
            most_frequent_category: mode(self.sessions.iter().map(|s| s.category.as_str()))
                .map(str::to_string),
            most_common_level: mode(self.sessions.iter().map(|s| s.level.as_str()))
                .map(str::to_string),
        }
    }
}

/// Least-squares slope of `values` against their index. `None` below two points.
pub fn linear_slope(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;

    let (covariance, variance) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(cov, var), (i, y)| {
            let dx = i as f64 - mean_x;
            (cov + dx * (y - mean_y), var + dx * dx)
        });

    Some(covariance / variance)
}

pub fn trend_direction(values: &[f64]) -> Option<TrendDirection> {
    linear_slope(values).map(|slope| {
        if slope.abs() < FLAT_SLOPE {
            TrendDirection::Stable
        } else if slope > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        }
    })
}

/// Key with the largest summed weight; ties go to the key seen first
fn heaviest<K: PartialEq>(items: impl Iterator<Item = (K, u32)>) -> Option<K> {
    let mut totals: Vec<(K, u64)> = Vec::new();
    for (key, weight) in items {
        match totals.iter_mut().find(|(k, _)| *k == key) {
            Some((_, total)) => *total += u64::from(weight),
            None => totals.push((key, u64::from(weight))),
        }
    }

    let mut best: Option<(K, u64)> = None;
    for (key, total) in totals {
        if best.as_ref().map_or(true, |(_, top)| total > *top) {
            best = Some((key, total));
        }
    }
    best.map(|(key, _)| key)
}

/// Most frequent value; ties go to the value seen first
pub fn mode<'v>(values: impl Iterator<Item = &'v str>) -> Option<&'v str> {
    heaviest(values.map(|v| (v, 1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn session(
        start: NaiveDateTime,
        category: &str,
        level: &str,
        calories: u32,
        rating: u8,
    ) -> WorkoutSession {
        WorkoutSession {
            user_id: 1,
            workout_id: 1,
            category: category.to_string(),
            level: level.to_string(),
            start_time: start,
            end_time: start + Duration::minutes(30),
            duration_minutes: 30,
            calories_burned: calories,
            rating,
            completed: true,
        }
    }

    fn at(d: u32, h: u32) -> NaiveDateTime {
        // January 2024: the 1st is a Monday
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_linear_slope() {
        assert_eq!(linear_slope(&[]), None);
        assert_eq!(linear_slope(&[5.0]), None);
        assert_eq!(linear_slope(&[1.0, 3.0]), Some(2.0));
        let slope = linear_slope(&[10.0, 8.0, 6.0, 4.0]).unwrap();
        assert!((slope + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_trend_directions() {
        let history = UserHistory {
            sessions: vec![
                session(at(1, 8), "cardio", "beginner", 200, 5),
                session(at(2, 8), "cardio", "beginner", 250, 4),
                session(at(3, 8), "cardio", "beginner", 300, 3),
            ],
            ..Default::default()
        };
        let trends = TrendAnalyzer::new(&history).analyze_trends();
        assert_eq!(trends.calories_trend, Some(TrendDirection::Increasing));
        assert_eq!(trends.duration_trend, Some(TrendDirection::Stable));
        assert_eq!(trends.rating_trend, Some(TrendDirection::Decreasing));
    }

    #[test]
    fn test_single_session_omits_trends() {
        let history = UserHistory {
            sessions: vec![session(at(1, 8), "cardio", "beginner", 200, 5)],
            ..Default::default()
        };
        let trends = TrendAnalyzer::new(&history).analyze_trends();
        assert_eq!(trends, TrendAnalysis::default());
        assert_eq!(serde_json::to_value(&trends).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_patterns() {
        let history = UserHistory {
            sessions: vec![
                session(at(1, 8), "cardio", "beginner", 200, 4),
                session(at(2, 18), "strength", "advanced", 280, 5),
                session(at(3, 7), "cardio", "beginner", 120, 4),
                session(at(8, 8), "yoga", "intermediate", 150, 5),
            ],
            ..Default::default()
        };
        let patterns = TrendAnalyzer::new(&history).analyze_patterns();
        // Mondays: 200 + 150
        assert_eq!(patterns.most_active_day.as_deref(), Some("Monday"));
        // 08:00: 200 + 150
        assert_eq!(patterns.most_active_hour, Some(8));
        assert_eq!(patterns.most_frequent_category.as_deref(), Some("cardio"));
        assert_eq!(patterns.most_common_level.as_deref(), Some("beginner"));
    }

    #[test]
    fn test_ties_go_to_first_seen() {
        let values = ["strength", "cardio", "cardio", "strength"];
        assert_eq!(mode(values.iter().copied()), Some("strength"));

        let history = UserHistory {
            sessions: vec![
                session(at(2, 18), "yoga", "advanced", 100, 4),
                session(at(1, 7), "cardio", "beginner", 100, 4),
            ],
            ..Default::default()
        };
        let patterns = TrendAnalyzer::new(&history).analyze_patterns();
        // Sessions are ordered by start time, so Monday the 1st comes first
        assert_eq!(patterns.most_active_day.as_deref(), Some("Monday"));
        assert_eq!(patterns.most_active_hour, Some(7));
        assert_eq!(patterns.most_frequent_category.as_deref(), Some("cardio"));
    }

    #[test]
    fn test_empty_history_omits_everything() {
        let history = UserHistory::default();
        let analyzer = TrendAnalyzer::new(&history);
        assert_eq!(analyzer.analyze_trends(), TrendAnalysis::default());
        assert_eq!(analyzer.analyze_patterns(), PatternAnalysis::default());
    }
}
