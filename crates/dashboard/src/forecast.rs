//! Weighted-trend forecaster.
//!
//! Predicts `horizon` hourly values from the last 12 readings of one
//! pollutant. Each step carries Gaussian jitter proportional to the base
//! value, so output is only reproducible with an identically seeded RNG.

use common::{Error, Pollutant, Reading, Result};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;

/// Value emitted for every step when there is too little history.
pub const FALLBACK_VALUE: f64 = 25.0;

/// Readings considered by the weighted average.
pub const WINDOW: usize = 12;

const MIN_READINGS: usize = 3;

/// Oldest → newest. A window of `n < 12` readings uses the first `n`.
const WEIGHTS: [f64; WINDOW] = [
    0.1, 0.1, 0.1, 0.1, 0.15, 0.15, 0.2, 0.2, 0.25, 0.25, 0.3, 0.3,
];

const TREND_DAMPING: f64 = 0.3;
const JITTER_FRACTION: f64 = 0.05;
const FLOOR: f64 = 1.0;

/// Forecast for a single pollutant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResult {
    pub pollutant: Pollutant,
    pub values: Vec<f64>,
    pub base_value: f64,
    pub trend: f64,
    /// True when `values` is the flat fallback rather than a real forecast.
    pub degraded: bool,
}

impl ForecastResult {
    pub fn fallback(pollutant: Pollutant, horizon: usize) -> Self {
        Self {
            pollutant,
            values: vec![FALLBACK_VALUE; horizon],
            base_value: FALLBACK_VALUE,
            trend: 0.0,
            degraded: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrendForecaster;

impl TrendForecaster {
    pub fn new() -> Self {
        Self
    }

    pub fn forecast<R: Rng + ?Sized>(
        &self,
        series: &[Reading],
        pollutant: Pollutant,
        horizon: usize,
        rng: &mut R,
    ) -> Result<ForecastResult> {
        if series.len() < MIN_READINGS {
            return Ok(ForecastResult::fallback(pollutant, horizon));
        }

        let start = series.len().saturating_sub(WINDOW);
        let recent: Vec<f64> = series[start..].iter().map(|r| pollutant.value(r)).collect();
        if let Some(bad) = recent.iter().find(|v| !v.is_finite()) {
            return Err(Error::Computation(format!(
                "non-finite {pollutant} value {bad} in forecast window"
            )));
        }

        let base_value = weighted_base(&recent);
        let trend = linear_trend(&recent);

        let jitter = Normal::new(0.0, base_value.abs() * JITTER_FRACTION)
            .map_err(|e| Error::Computation(format!("forecast jitter: {e}")))?;

        let values = (1..=horizon)
            .map(|step| {
                let predicted =
                    base_value + trend * step as f64 * TREND_DAMPING + jitter.sample(&mut *rng);
                round2(predicted.max(FLOOR))
            })
            .collect();

        Ok(ForecastResult {
            pollutant,
            values,
            base_value,
            trend,
            degraded: false,
        })
    }
}

/// Weighted mean of up to [`WINDOW`] values, heavier toward the newest.
pub fn weighted_base(values: &[f64]) -> f64 {
    let weights = &WEIGHTS[..values.len().min(WINDOW)];
    let total: f64 = weights.iter().sum();
    values
        .iter()
        .zip(weights)
        .map(|(v, w)| v * w / total)
        .sum()
}

/// Half the change over the last two steps; zero with fewer than 3 values.
pub fn linear_trend(values: &[f64]) -> f64 {
    match values {
        [.., a, _, c] => (c - a) / 2.0,
        _ => 0.0,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn series_of(values: &[f64]) -> Vec<Reading> {
        let start = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| Reading {
                datetime: start + Duration::hours(i as i64),
                hour: (i % 24) as u32,
                day: 10,
                pm25: v,
                pm10: v * 2.0,
                so2: 5.0,
                no2: 20.0,
                co: 500.0,
                o3: 40.0,
                temp: 25.0,
                humidity: 50.0,
                pressure: 1013.0,
                wind_speed: 3.0,
                aqi: 50,
            })
            .collect()
    }

    #[test]
    fn test_short_series_falls_back_flat() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = TrendForecaster::new()
            .forecast(&series_of(&[40.0, 45.0]), Pollutant::Pm25, 24, &mut rng)
            .unwrap();
        assert!(result.degraded);
        assert_eq!(result.values, vec![25.0; 24]);
    }

    #[test]
    fn test_constant_series_stays_near_base() {
        let mut rng = StdRng::seed_from_u64(99);
        let result = TrendForecaster::new()
            .forecast(&series_of(&[30.0; 24]), Pollutant::Pm25, 24, &mut rng)
            .unwrap();

        assert!(!result.degraded);
        assert_eq!(result.trend, 0.0);
        assert!((result.base_value - 30.0).abs() < 1e-9);
        assert_eq!(result.values.len(), 24);

        let sigma = 0.05 * 30.0;
        for v in &result.values {
            assert!(
                (30.0 - 5.0 * sigma..=30.0 + 5.0 * sigma).contains(v),
                "forecast {v} outside 5σ band"
            );
        }
    }

    #[test]
    fn test_same_seed_same_forecast() {
        let series = series_of(&[20.0, 25.0, 31.0, 28.0, 35.0]);
        let a = TrendForecaster::new()
            .forecast(&series, Pollutant::Pm10, 12, &mut StdRng::seed_from_u64(7))
            .unwrap();
        let b = TrendForecaster::new()
            .forecast(&series, Pollutant::Pm10, 12, &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_weights_renormalize_for_short_windows() {
        // Five values use weights [0.1, 0.1, 0.1, 0.1, 0.15] / 0.55.
        let base = weighted_base(&[10.0, 10.0, 10.0, 10.0, 20.0]);
        assert!((base - 7.0 / 0.55).abs() < 1e-9, "base = {base}");
    }

    #[test]
    fn test_only_last_twelve_readings_count() {
        let mut values = vec![1000.0; 10];
        values.extend([30.0; 12]);
        let mut rng = StdRng::seed_from_u64(3);
        let result = TrendForecaster::new()
            .forecast(&series_of(&values), Pollutant::Pm25, 4, &mut rng)
            .unwrap();
        assert!((result.base_value - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_uses_last_three_points() {
        assert_eq!(linear_trend(&[1.0, 2.0, 10.0, 11.0, 14.0]), 2.0);
        assert_eq!(linear_trend(&[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_rising_series_forecasts_upward() {
        let values: Vec<f64> = (0..12).map(|i| 20.0 + 10.0 * i as f64).collect();
        let mut rng = StdRng::seed_from_u64(11);
        let result = TrendForecaster::new()
            .forecast(&series_of(&values), Pollutant::Pm25, 24, &mut rng)
            .unwrap();
        assert_eq!(result.trend, 10.0);
        // Drift over 23 steps (69) dwarfs the jitter σ (~5% of base).
        assert!(result.values[23] > result.values[0]);
    }

    #[test]
    fn test_values_are_floored() {
        let mut rng = StdRng::seed_from_u64(5);
        let falling = [50.0, 20.0, 0.5, 0.4, 0.3, 0.2];
        let result = TrendForecaster::new()
            .forecast(&series_of(&falling), Pollutant::Pm25, 24, &mut rng)
            .unwrap();
        assert!(result.values.iter().all(|v| *v >= 1.0));
    }

    #[test]
    fn test_non_finite_input_is_computation_error() {
        let mut rng = StdRng::seed_from_u64(5);
        let err = TrendForecaster::new()
            .forecast(&series_of(&[10.0, f64::NAN, 12.0]), Pollutant::Pm25, 3, &mut rng)
            .unwrap_err();
        assert_eq!(err.code(), "E008");
    }
}
