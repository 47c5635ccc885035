//! Dashboard aggregation.
//!
//! Resolves a city's dataset through the cache (station CSV first,
//! synthetic series as the fallback), slices it to the requested window,
//! and derives everything the dashboard renders.

use common::{
    DataOrigin, Dataset, Error, MonitorConfig, Pollutant, Reading, Result, SharedClock,
    TimeRange, TIMESTAMP_FORMAT,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use station_data::{
    load_city_series, write_series_csv, StationDirectory, StationInfo, SyntheticSeriesGenerator,
    STATIONS_FILE_NAME,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::cache::{CacheKey, CachePayload, DataCache};
use crate::forecast::{ForecastResult, TrendForecaster};

// ── Derived structures ────────────────────────────────────────────────

/// Snapshot of the latest reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStats {
    pub aqi: i64,
    pub category: String,
    pub color: String,
    pub icon: String,
    pub pm25: f64,
    pub pm10: f64,
    pub so2: f64,
    pub no2: f64,
    pub co: f64,
    pub o3: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
}

impl Default for CurrentStats {
    fn default() -> Self {
        let info = station_data::categorize(station_data::aqi::FALLBACK_AQI);
        Self {
            aqi: station_data::aqi::FALLBACK_AQI,
            category: info.category,
            color: info.color,
            icon: info.icon,
            pm25: 10.0,
            pm10: 20.0,
            so2: 2.0,
            no2: 8.0,
            co: 200.0,
            o3: 15.0,
            temperature: 25.0,
            humidity: 50.0,
            wind_speed: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollutantTrend {
    pub current: f64,
    pub change: f64,
    pub trend: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarPoint {
    pub subject: Pollutant,
    /// Percentage of the pollutant's ceiling, capped at 100.
    pub value: f64,
    pub full_mark: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyAverage {
    pub hour: u32,
    pub average: f64,
}

/// Parameters of a dashboard request. `city: None` means the configured
/// default city.
#[derive(Debug, Clone, Default)]
pub struct DashboardRequest {
    pub city: Option<String>,
    pub time_range: TimeRange,
    pub pollutant: Pollutant,
}

/// Everything served by `/api/dashboard`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardPayload {
    pub filtered_data: Vec<Reading>,
    pub radar_data: Vec<RadarPoint>,
    pub hourly_distributions: BTreeMap<Pollutant, Vec<HourlyAverage>>,
    pub future_predictions: BTreeMap<Pollutant, Vec<f64>>,
    pub pollutants: Vec<Pollutant>,
    pub selected_pollutant: Pollutant,
    pub stats: CurrentStats,
    pub trends: BTreeMap<Pollutant, PollutantTrend>,
    pub selected_city: String,
    pub data_source: DataOrigin,
    pub timestamp: String,
}

// ── Pure derivations ──────────────────────────────────────────────────

const RADAR_FULL_MARK: u32 = 100;

fn radar_ceiling(pollutant: Pollutant) -> f64 {
    match pollutant {
        Pollutant::Pm25 => 250.0,
        Pollutant::Pm10 => 420.0,
        Pollutant::So2 => 80.0,
        Pollutant::No2 => 180.0,
        Pollutant::Co => 30000.0,
        Pollutant::O3 => 240.0,
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// The most recent `min(hours, len)` readings.
pub fn filter_window(series: &[Reading], range: TimeRange) -> Result<&[Reading]> {
    if series.is_empty() {
        return Err(Error::InsufficientData(format!("no data for {range}")));
    }
    let start = series.len().saturating_sub(range.hours());
    Ok(&series[start..])
}

/// Stats for the latest reading, or the safe default for an empty slice.
pub fn current_stats(readings: &[Reading]) -> CurrentStats {
    let Some(latest) = readings.last() else {
        return CurrentStats::default();
    };
    let info = station_data::categorize(latest.aqi);
    CurrentStats {
        aqi: latest.aqi,
        category: info.category,
        color: info.color,
        icon: info.icon,
        pm25: round_to(latest.pm25, 2),
        pm10: round_to(latest.pm10, 2),
        so2: round_to(latest.so2, 2),
        no2: round_to(latest.no2, 2),
        co: round_to(latest.co, 2),
        o3: round_to(latest.o3, 2),
        temperature: round_to(latest.temp, 2),
        humidity: round_to(latest.humidity, 2),
        wind_speed: round_to(latest.wind_speed, 2),
    }
}

/// Change between the two latest readings for every pollutant.
pub fn pollutant_trends(readings: &[Reading]) -> Result<BTreeMap<Pollutant, PollutantTrend>> {
    let [.., previous, latest] = readings else {
        return Err(Error::InsufficientData("need at least 2 readings for trends".into()));
    };

    Ok(Pollutant::ALL
        .iter()
        .map(|&p| {
            let current = p.value(latest);
            let change = current - p.value(previous);
            let trend = if change > 0.0 {
                TrendDirection::Up
            } else if change < 0.0 {
                TrendDirection::Down
            } else {
                TrendDirection::Stable
            };
            let entry = PollutantTrend {
                current: round_to(current, 2),
                change: round_to(change, 2),
                trend,
            };
            (p, entry)
        })
        .collect())
}

/// Latest reading as a percentage of each pollutant's ceiling.
pub fn radar_data(readings: &[Reading]) -> Result<Vec<RadarPoint>> {
    let latest = readings
        .last()
        .ok_or_else(|| Error::InsufficientData("no data for radar chart".into()))?;
    Ok(Pollutant::ALL
        .iter()
        .map(|&p| RadarPoint {
            subject: p,
            value: (p.value(latest) / radar_ceiling(p) * 100.0).min(100.0),
            full_mark: RADAR_FULL_MARK,
        })
        .collect())
}

/// Average of `pollutant` per hour of day. Always 24 entries; hours
/// without readings average to 0.
pub fn hourly_distribution(readings: &[Reading], pollutant: Pollutant) -> Result<Vec<HourlyAverage>> {
    if readings.is_empty() {
        return Err(Error::InsufficientData(
            "no data for hourly distribution".into(),
        ));
    }

    let mut buckets = [(0.0f64, 0usize); 24];
    for r in readings {
        if let Some(bucket) = buckets.get_mut(r.hour as usize) {
            bucket.0 += pollutant.value(r);
            bucket.1 += 1;
        }
    }

    Ok(buckets
        .iter()
        .enumerate()
        .map(|(hour, &(total, count))| HourlyAverage {
            hour: hour as u32,
            average: if count == 0 {
                0.0
            } else {
                round_to(total / count as f64, 1)
            },
        })
        .collect())
}

// ── Aggregator ────────────────────────────────────────────────────────

/// Owns the data sources and the forecaster; shares the cache with the
/// sweep task.
pub struct DashboardAggregator {
    directory: Option<StationDirectory>,
    generator: SyntheticSeriesGenerator,
    forecaster: TrendForecaster,
    cache: Arc<DataCache>,
    clock: SharedClock,
    rng: Mutex<StdRng>,
    default_city: String,
    horizon: usize,
    n_samples: usize,
    synthetic_seed: u64,
}

impl DashboardAggregator {
    /// Build from config, reading the station directory from disk. A missing
    /// or malformed directory is logged and every city falls back to
    /// synthetic data.
    pub fn new(config: &MonitorConfig, cache: Arc<DataCache>, clock: SharedClock) -> Self {
        let directory =
            match StationDirectory::load(&config.data.stations_file, &config.data.data_dir) {
                Ok(dir) => {
                    info!(
                        "Station directory loaded: {} stations, {} cities",
                        dir.stations().len(),
                        dir.cities().len()
                    );
                    Some(dir)
                }
                Err(e) => {
                    warn!("Station directory unavailable, using synthetic data: {}", e);
                    None
                }
            };
        Self::with_directory(config, directory, cache, clock)
    }

    pub fn with_directory(
        config: &MonitorConfig,
        directory: Option<StationDirectory>,
        cache: Arc<DataCache>,
        clock: SharedClock,
    ) -> Self {
        let rng = match config.forecast.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            directory,
            generator: SyntheticSeriesGenerator::new(config.cities.clone(), clock.clone()),
            forecaster: TrendForecaster::new(),
            cache,
            clock,
            rng: Mutex::new(rng),
            default_city: config.data.default_city.clone(),
            horizon: config.forecast.horizon,
            n_samples: config.synthetic.n_samples,
            synthetic_seed: config.synthetic.seed,
        }
    }

    pub fn cache(&self) -> &Arc<DataCache> {
        &self.cache
    }

    pub fn default_city(&self) -> &str {
        &self.default_city
    }

    /// Cities from the station directory, or the built-in profile cities
    /// when no directory is available.
    pub fn cities(&self) -> Vec<String> {
        match &self.directory {
            Some(dir) if !dir.stations().is_empty() => dir.cities(),
            _ => self
                .generator
                .profiles()
                .iter()
                .map(|p| p.name.clone())
                .collect(),
        }
    }

    /// Dataset for `city`, from cache when possible.
    pub fn load_city(&self, city: &str) -> Result<Arc<Dataset>> {
        self.cache.activate_city(city);

        let raw_key = CacheKey::raw_data(city);
        if let Some(ds) = self.cache.get_dataset(&raw_key) {
            debug!("Loaded data from cache for {}", city);
            return Ok(ds);
        }
        let synthetic_key = CacheKey::synthetic_data(city);
        if let Some(ds) = self.cache.get_dataset(&synthetic_key) {
            debug!("Loaded synthetic data from cache for {}", city);
            return Ok(ds);
        }

        match self.load_station(city) {
            Ok(ds) => {
                let ds = Arc::new(ds);
                self.cache.put(raw_key, CachePayload::Dataset(ds.clone()));
                Ok(ds)
            }
            Err(e) => {
                warn!("No usable station data for {} ({}), creating sample data", city, e);
                let ds = Arc::new(self.synthesize(city)?);
                self.cache
                    .put(synthetic_key, CachePayload::Dataset(ds.clone()));
                Ok(ds)
            }
        }
    }

    fn load_station(&self, city: &str) -> Result<Dataset> {
        let directory = self
            .directory
            .as_ref()
            .ok_or_else(|| Error::DataLoad("no station directory".into()))?;
        let station = directory
            .find(city)
            .ok_or_else(|| Error::DataLoad(format!("no station found for city '{city}'")))?;
        let series = load_city_series(directory, city)?;
        Ok(Dataset {
            city: Some(city.to_string()),
            origin: DataOrigin::Station {
                file_name: station.file_name.clone(),
            },
            series,
            pollutants: Pollutant::ALL.to_vec(),
        })
    }

    fn synthesize(&self, city: &str) -> Result<Dataset> {
        let series = self
            .generator
            .generate(Some(city), self.n_samples, self.synthetic_seed)?;
        info!("Sample data created for {}: {} readings", city, series.len());
        Ok(Dataset {
            city: Some(city.to_string()),
            origin: DataOrigin::Synthetic {
                seed: self.synthetic_seed,
            },
            series,
            pollutants: Pollutant::ALL.to_vec(),
        })
    }

    /// Forecast for `pollutant` over `readings`, cached per window length.
    /// Failures are logged and replaced by the flat fallback.
    pub fn forecast(
        &self,
        city: &str,
        readings: &[Reading],
        pollutant: Pollutant,
    ) -> Arc<ForecastResult> {
        let key = CacheKey::forecast(city, pollutant, readings.len());
        if let Some(cached) = self.cache.get_forecast(&key) {
            debug!("Loaded predictions from cache for {} {}", city, pollutant);
            return cached;
        }

        let outcome = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            self.forecaster
                .forecast(readings, pollutant, self.horizon, &mut *rng)
        };

        match outcome {
            Ok(result) if result.degraded => {
                debug!(
                    "Insufficient data for {} {} predictions ({} readings)",
                    city,
                    pollutant,
                    readings.len()
                );
                Arc::new(result)
            }
            Ok(result) => {
                let result = Arc::new(result);
                self.cache
                    .put(key, CachePayload::Forecast(result.clone()));
                result
            }
            Err(e) => {
                error!("Prediction error for {} {}: {}", city, pollutant, e);
                Arc::new(ForecastResult::fallback(pollutant, self.horizon))
            }
        }
    }

    /// Forecast for one pollutant over the requested window of a city.
    pub fn forecast_for(
        &self,
        city: Option<&str>,
        pollutant: Pollutant,
        range: TimeRange,
    ) -> Result<Arc<ForecastResult>> {
        let city = city.unwrap_or(&self.default_city);
        let dataset = self.load_city(city)?;
        let window = filter_window(&dataset.series, range)?;
        Ok(self.forecast(city, window, pollutant))
    }

    /// Full dashboard aggregate. Only loading and windowing can fail; the
    /// derived sections degrade to empty or default values.
    pub fn dashboard(&self, request: &DashboardRequest) -> Result<DashboardPayload> {
        let city = request.city.as_deref().unwrap_or(&self.default_city);
        let dataset = self.load_city(city)?;
        let window = filter_window(&dataset.series, request.time_range)?;

        let radar = radar_data(window).unwrap_or_else(|e| {
            warn!("Radar data unavailable for {}: {}", city, e);
            Vec::new()
        });
        let trends = pollutant_trends(window).unwrap_or_else(|e| {
            warn!("Trends unavailable for {}: {}", city, e);
            BTreeMap::new()
        });

        let mut hourly = BTreeMap::new();
        let mut predictions = BTreeMap::new();
        for &pollutant in &dataset.pollutants {
            let dist = hourly_distribution(window, pollutant).unwrap_or_else(|e| {
                warn!("Hourly distribution unavailable for {}: {}", pollutant, e);
                Vec::new()
            });
            hourly.insert(pollutant, dist);
            let forecast = self.forecast(city, window, pollutant);
            predictions.insert(pollutant, forecast.values.clone());
        }

        Ok(DashboardPayload {
            filtered_data: window.to_vec(),
            radar_data: radar,
            hourly_distributions: hourly,
            future_predictions: predictions,
            pollutants: dataset.pollutants.clone(),
            selected_pollutant: request.pollutant,
            stats: current_stats(window),
            trends,
            selected_city: city.to_string(),
            data_source: dataset.origin.clone(),
            timestamp: self.clock.now().format(TIMESTAMP_FORMAT).to_string(),
        })
    }

    /// Write one synthetic CSV per known city into `out_dir`, named after
    /// the station directory's file names. Without a station directory a
    /// `Stations_Info.csv` listing the profile cities is written alongside,
    /// so `out_dir` can serve as the data directory afterwards. Returns the
    /// written paths.
    pub fn write_samples(&self, out_dir: &Path, n_samples: usize) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(out_dir)?;
        let mut written = Vec::new();

        let directory = match &self.directory {
            Some(dir) if !dir.stations().is_empty() => dir.clone(),
            _ => {
                let stations = self
                    .generator
                    .profiles()
                    .iter()
                    .map(|p| {
                        let state = if p.state.trim().is_empty() { &p.name } else { &p.state };
                        StationInfo::for_city(state, &p.name)
                    })
                    .collect();
                let dir = StationDirectory::new(stations, out_dir);
                let path = out_dir.join(STATIONS_FILE_NAME);
                dir.write_csv(&path)?;
                info!("Station directory saved as {}", path.display());
                written.push(path);
                dir
            }
        };

        for city in directory.cities() {
            let Some(station) = directory.find(&city) else {
                continue;
            };
            let series = self
                .generator
                .generate(Some(&city), n_samples, self.synthetic_seed)?;
            let path = out_dir.join(&station.file_name);
            write_series_csv(&path, &series)?;
            info!("Sample data saved as {} for {}", path.display(), city);
            written.push(path);
        }
        Ok(written)
    }
}
