use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{AnalyticsError, Result};

pub const DEFAULT_WEEKLY_WINDOW: usize = 8;
pub const DEFAULT_MONTHLY_WINDOW: usize = 6;
/// Ten years of rollups either way
pub const MAX_WEEKLY_WINDOW: usize = 520;
pub const MAX_MONTHLY_WINDOW: usize = 120;

/// Runtime configuration, read from `FITHOME_*` environment variables
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database holding sessions, weights and achievements
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    /// Number of weekly rollups in a report
    pub weekly_window: usize,
    /// Number of monthly rollups in a report
    pub monthly_window: usize,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("fithome.db"),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            weekly_window: DEFAULT_WEEKLY_WINDOW,
            monthly_window: DEFAULT_MONTHLY_WINDOW,
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Config` if a variable is set but cannot be parsed
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = lookup("FITHOME_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let bind_addr = match lookup("FITHOME_BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|e| {
                AnalyticsError::Config(format!("FITHOME_BIND_ADDR '{raw}': {e}"))
            })?,
            None => defaults.bind_addr,
        };

        let weekly_window = parse_window(
            &lookup,
            "FITHOME_WEEKLY_WINDOW",
            defaults.weekly_window,
            MAX_WEEKLY_WINDOW,
        )?;
        let monthly_window = parse_window(
            &lookup,
            "FITHOME_MONTHLY_WINDOW",
            defaults.monthly_window,
            MAX_MONTHLY_WINDOW,
        )?;

        let log_json = lookup("FITHOME_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(defaults.log_json);

        Ok(Self {
            db_path,
            bind_addr,
            weekly_window,
            monthly_window,
            log_json,
        })
    }
}

fn parse_window<F>(lookup: &F, key: &str, default: usize, max: usize) -> Result<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(AnalyticsError::Config(format!("{key} must be at least 1"))),
        Ok(value) if value > max => Err(AnalyticsError::Config(format!(
            "{key} must be at most {max}, got {value}"
        ))),
        Ok(value) => Ok(value),
        Err(e) => Err(AnalyticsError::Config(format!("{key} '{raw}': {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("fithome.db"));
        assert_eq!(config.weekly_window, 8);
        assert_eq!(config.monthly_window, 6);
        assert!(!config.log_json);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("FITHOME_DB_PATH", "/tmp/fit.db"),
            ("FITHOME_BIND_ADDR", "0.0.0.0:9000"),
            ("FITHOME_WEEKLY_WINDOW", "12"),
            ("FITHOME_LOG_FORMAT", "JSON"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/fit.db"));
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.weekly_window, 12);
        assert_eq!(config.monthly_window, 6);
        assert!(config.log_json);
    }

    #[test]
    fn test_rejects_bad_values() {
        let zero = AppConfig::from_lookup(lookup_from(&[("FITHOME_MONTHLY_WINDOW", "0")]));
        assert!(matches!(zero, Err(AnalyticsError::Config(_))));

        let addr = AppConfig::from_lookup(lookup_from(&[("FITHOME_BIND_ADDR", "nowhere")]));
        assert!(matches!(addr, Err(AnalyticsError::Config(_))));
    }

    #[test]
    fn test_window_upper_bounds() {
        let weeks = AppConfig::from_lookup(lookup_from(&[(
            "FITHOME_WEEKLY_WINDOW",
            "18446744073709551615",
        )]));
        assert!(matches!(weeks, Err(AnalyticsError::Config(_))));

        let months = AppConfig::from_lookup(lookup_from(&[("FITHOME_MONTHLY_WINDOW", "121")]));
        assert!(matches!(months, Err(AnalyticsError::Config(_))));

        let config = AppConfig::from_lookup(lookup_from(&[
            ("FITHOME_WEEKLY_WINDOW", "520"),
            ("FITHOME_MONTHLY_WINDOW", "120"),
        ]))
        .unwrap();
        assert_eq!(config.weekly_window, MAX_WEEKLY_WINDOW);
        assert_eq!(config.monthly_window, MAX_MONTHLY_WINDOW);
    }
}
