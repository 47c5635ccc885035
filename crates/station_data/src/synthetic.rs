//! Synthetic pollutant series.
//!
//! Stand-in data for cities without a usable station file. Output depends
//! only on `(city, n_samples, seed)` and the clock's current hour, so two
//! calls within the same hour are bit-identical and safe to cache.

use chrono::{Datelike, Duration, DurationRound, TimeDelta, Timelike};
use common::config::{default_city_profiles, CityProfile};
use common::{Error, Reading, Result, Series, SharedClock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp, Normal};
use std::f64::consts::PI;

use crate::aqi;

const DEFAULT_POLLUTION: f64 = 1.0;
const DEFAULT_TEMP_BASE: f64 = 25.0;

/// Per-channel model: `offset + scale * pollution_base + N(0, sigma)`,
/// floored at `floor`.
struct Channel {
    offset: f64,
    scale: f64,
    sigma: f64,
    floor: f64,
}

const PM25: Channel = Channel { offset: 0.0, scale: 1.0, sigma: 15.0, floor: 5.0 };
const PM10: Channel = Channel { offset: 0.0, scale: 1.8, sigma: 25.0, floor: 10.0 };
const SO2: Channel = Channel { offset: 0.0, scale: 0.4, sigma: 8.0, floor: 2.0 };
const NO2: Channel = Channel { offset: 0.0, scale: 0.9, sigma: 12.0, floor: 8.0 };
const CO: Channel = Channel { offset: 0.0, scale: 20.0, sigma: 500.0, floor: 200.0 };
// Ozone runs opposite to the primary pollutants.
const O3: Channel = Channel { offset: 120.0, scale: -0.6, sigma: 25.0, floor: 15.0 };

/// Deterministic generator of hourly readings.
#[derive(Clone)]
pub struct SyntheticSeriesGenerator {
    profiles: Vec<CityProfile>,
    clock: SharedClock,
}

impl SyntheticSeriesGenerator {
    pub fn new(profiles: Vec<CityProfile>, clock: SharedClock) -> Self {
        Self { profiles, clock }
    }

    /// Generator with the built-in city table.
    pub fn with_default_profiles(clock: SharedClock) -> Self {
        Self::new(default_city_profiles(), clock)
    }

    pub fn profiles(&self) -> &[CityProfile] {
        &self.profiles
    }

    /// `(pollution multiplier, temperature baseline)` for a city.
    pub fn profile_for(&self, city: Option<&str>) -> (f64, f64) {
        city.and_then(|name| self.profiles.iter().find(|p| p.name == name))
            .map(|p| (p.pollution, p.temp_base))
            .unwrap_or((DEFAULT_POLLUTION, DEFAULT_TEMP_BASE))
    }

    pub fn generate(&self, city: Option<&str>, n_samples: usize, seed: u64) -> Result<Series> {
        if n_samples == 0 {
            return Err(Error::InvalidParameter("n_samples must be > 0".into()));
        }

        let (pollution, temp_base) = self.profile_for(city);
        let mut rng = StdRng::seed_from_u64(seed);

        let end = self
            .clock
            .now()
            .duration_trunc(Duration::hours(1))
            .map_err(|e| Error::Computation(format!("timestamp truncation failed: {e}")))?;
        let start = i64::try_from(n_samples - 1)
            .ok()
            .and_then(TimeDelta::try_hours)
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| {
                Error::InvalidParameter(format!("n_samples {n_samples} exceeds the timestamp range"))
            })?;

        let phase: Vec<f64> = (0..n_samples)
            .map(|i| i as f64 * 2.0 * PI / 24.0)
            .collect();
        let pollution_base: Vec<f64> = phase
            .iter()
            .map(|p| (p.sin() * 20.0 + 50.0) * pollution)
            .collect();

        // Draw order is part of the output contract: changing it changes
        // every cached synthetic series.
        let pm25 = draw_channel(&PM25, &pollution_base, &mut rng)?;
        let pm10 = draw_channel(&PM10, &pollution_base, &mut rng)?;
        let so2 = draw_channel(&SO2, &pollution_base, &mut rng)?;
        let no2 = draw_channel(&NO2, &pollution_base, &mut rng)?;
        let co = draw_channel(&CO, &pollution_base, &mut rng)?;
        let o3 = draw_channel(&O3, &pollution_base, &mut rng)?;

        let temp_noise = draw_normal(3.0, n_samples, &mut rng)?;
        let humidity_noise = draw_normal(10.0, n_samples, &mut rng)?;
        let pressure_noise = draw_normal(15.0, n_samples, &mut rng)?;
        let wind = Exp::new(1.0_f64 / 3.0)
            .map_err(|e| Error::Computation(format!("wind distribution: {e}")))?;
        let wind_speed: Vec<f64> = (0..n_samples)
            .map(|_| wind.sample(&mut rng).max(0.5))
            .collect();

        let series = (0..n_samples)
            .map(|i| {
                let datetime = start + Duration::hours(i as i64);
                let temp = temp_base + phase[i].sin() * 8.0 + temp_noise[i];
                let humidity =
                    (50.0 + (phase[i] + PI).sin() * 20.0 + humidity_noise[i]).clamp(20.0, 95.0);
                Reading {
                    datetime,
                    hour: datetime.hour(),
                    day: datetime.day(),
                    pm25: pm25[i],
                    pm10: pm10[i],
                    so2: so2[i],
                    no2: no2[i],
                    co: co[i],
                    o3: o3[i],
                    temp,
                    humidity,
                    pressure: 1013.0 + pressure_noise[i],
                    wind_speed: wind_speed[i],
                    aqi: aqi::score(pm25[i]),
                }
            })
            .collect();

        Ok(series)
    }
}

fn draw_normal(sigma: f64, n: usize, rng: &mut StdRng) -> Result<Vec<f64>> {
    let dist = Normal::new(0.0, sigma)
        .map_err(|e| Error::Computation(format!("normal(0, {sigma}): {e}")))?;
    Ok((0..n).map(|_| dist.sample(&mut *rng)).collect())
}

fn draw_channel(channel: &Channel, base: &[f64], rng: &mut StdRng) -> Result<Vec<f64>> {
    let noise = draw_normal(channel.sigma, base.len(), rng)?;
    Ok(base
        .iter()
        .zip(noise)
        .map(|(b, n)| (channel.offset + channel.scale * b + n).max(channel.floor))
        .collect())
}
