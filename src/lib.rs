//! Fitness analytics core: a SQLite session store, a metrics aggregator,
//! trend/pattern analysis and a report composer. All analytics are pure
//! functions of a user's history snapshot.

pub mod achievements;
pub mod body;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod report;
pub mod store;
pub mod trends;

pub use error::{AnalyticsError, Result};
pub use metrics::MetricsAggregator;
pub use report::{generate_report, ReportComposer, ReportContext};
pub use store::SessionStore;
pub use trends::TrendAnalyzer;
