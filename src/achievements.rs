use chrono::NaiveDateTime;

use crate::error::Result;
use crate::metrics::MetricsAggregator;
use crate::models::NewSession;
use crate::store::SessionStore;

/// What a user has to reach to unlock an achievement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    Workouts(u32),
    Calories(u64),
}

#[derive(Debug, Clone, Copy)]
pub struct AchievementRule {
    pub name: &'static str,
    pub threshold: Threshold,
}

pub const ACHIEVEMENT_RULES: [AchievementRule; 4] = [
    AchievementRule {
        name: "First Step",
        threshold: Threshold::Workouts(1),
    },
    AchievementRule {
        name: "Consistency",
        threshold: Threshold::Workouts(10),
    },
    AchievementRule {
        name: "Marathoner",
        threshold: Threshold::Workouts(50),
    },
    AchievementRule {
        name: "Calorie Burner",
        threshold: Threshold::Calories(1000),
    },
];

/// Names of every achievement the given totals qualify for
pub fn earned(total_workouts: u32, total_calories: u64) -> Vec<&'static str> {
    ACHIEVEMENT_RULES
        .iter()
        .filter(|rule| match rule.threshold {
            Threshold::Workouts(min) => total_workouts >= min,
            Threshold::Calories(min) => total_calories >= min,
        })
        .map(|rule| rule.name)
        .collect()
}

/// Re-evaluate a user's totals and grant anything newly earned.
/// Returns the names unlocked by this call.
pub fn check_and_grant(
    store: &SessionStore,
    user_id: i64,
    now: NaiveDateTime,
) -> Result<Vec<String>> {
    let history = store.load_history(user_id)?;
    let stats = MetricsAggregator::new(&history).user_stats(now.date());

    let mut unlocked = Vec::new();
    for name in earned(stats.total_workouts, stats.total_calories) {
        if store.grant_achievement(user_id, name, now)? {
            unlocked.push(name.to_string());
        }
    }
    Ok(unlocked)
}

/// Store a session and grant what it unlocked as one unit: either both land or neither does
pub fn record_and_grant(
    store: &SessionStore,
    user_id: i64,
    session: &NewSession,
    now: NaiveDateTime,
) -> Result<(i64, Vec<String>)> {
    store.write_transaction(|store| {
        let session_id = store.record_session(user_id, session)?;
        let unlocked = check_and_grant(store, user_id, now)?;
        Ok((session_id, unlocked))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at_nine() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn hour_of_cardio(start: NaiveDateTime) -> NewSession {
        NewSession {
            workout_id: 1,
            category: "cardio".to_string(),
            level: "beginner".to_string(),
            start_time: start,
            duration_minutes: 60,
            calories_burned: 600,
            rating: 5,
        }
    }

    #[test]
    fn test_earned_thresholds() {
        assert!(earned(0, 0).is_empty());
        assert_eq!(earned(1, 200), vec!["First Step"]);
        assert_eq!(earned(10, 999), vec!["First Step", "Consistency"]);
        assert_eq!(earned(3, 1000), vec!["First Step", "Calorie Burner"]);
        assert_eq!(earned(50, 5000).len(), 4);
    }

    #[test]
    fn test_check_and_grant_only_unlocks_once() {
        let store = SessionStore::open_in_memory().unwrap();
        let now = at_nine();
        let session = hour_of_cardio(now);

        store.record_session(1, &session).unwrap();
        assert_eq!(check_and_grant(&store, 1, now).unwrap(), vec!["First Step"]);

        store.record_session(1, &session).unwrap();
        assert_eq!(check_and_grant(&store, 1, now).unwrap(), vec!["Calorie Burner"]);
        assert!(check_and_grant(&store, 1, now).unwrap().is_empty());

        assert_eq!(store.achievements(1).unwrap().len(), 2);
    }

    #[test]
    fn test_record_and_grant() {
        let store = SessionStore::open_in_memory().unwrap();
        let now = at_nine();

        let (first_id, unlocked) = record_and_grant(&store, 1, &hour_of_cardio(now), now).unwrap();
        assert_eq!(unlocked, vec!["First Step"]);

        // Already holding "First Step" is not an error
        let (second_id, unlocked) =
            record_and_grant(&store, 1, &hour_of_cardio(now), now).unwrap();
        assert!(second_id > first_id);
        assert_eq!(unlocked, vec!["Calorie Burner"]);
    }

    #[test]
    fn test_record_and_grant_keeps_nothing_on_failure() {
        let store = SessionStore::open_in_memory().unwrap();
        let now = at_nine();
        store
            .connection()
            .execute_batch("DROP TABLE achievements;")
            .unwrap();

        assert!(record_and_grant(&store, 1, &hour_of_cardio(now), now).is_err());
        assert!(store.completed_sessions(1).unwrap().is_empty());
    }
}
