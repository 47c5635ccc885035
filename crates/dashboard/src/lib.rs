//! Dashboard crate.
//!
//! Caches city datasets and forecasts, runs the trend forecaster, and
//! aggregates the structures served to the dashboard.

pub mod aggregator;
pub mod cache;
pub mod forecast;

pub use aggregator::{
    current_stats, filter_window, hourly_distribution, pollutant_trends, radar_data,
    CurrentStats, DashboardAggregator, DashboardPayload, DashboardRequest, HourlyAverage,
    PollutantTrend, RadarPoint, TrendDirection,
};
pub use cache::{spawn_sweep_task, CacheEntry, CacheKey, CacheKind, CachePayload, DataCache};
pub use forecast::{ForecastResult, TrendForecaster};
