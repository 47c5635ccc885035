//! Monitor configuration types.

use serde::{Deserialize, Serialize};

/// Top-level monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Station directory and per-city CSV locations.
    #[serde(default)]
    pub data: DataConfig,

    /// Cache expiry and sweep cadence.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Trend forecaster parameters.
    #[serde(default)]
    pub forecast: ForecastConfig,

    /// Synthetic fallback series parameters.
    #[serde(default)]
    pub synthetic: SyntheticConfig,

    /// City profiles shaping synthetic series.
    #[serde(default = "default_city_profiles")]
    pub cities: Vec<CityProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Station directory CSV (state, city, file_name, ...).
    #[serde(default = "default_stations_file")]
    pub stations_file: String,

    /// Directory that per-city `file_name` entries resolve against.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// City used when a request does not name one.
    #[serde(default = "default_city")]
    pub default_city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Entries older than this are removed by the sweep.
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,

    /// Interval between background sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Number of hourly steps to predict.
    #[serde(default = "default_horizon")]
    pub horizon: usize,

    /// Seed for the forecast jitter RNG. Unset means entropy-seeded.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Upper bound on generated readings per city (about 114 years hourly).
pub const MAX_SYNTHETIC_SAMPLES: usize = 1_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    #[serde(default = "default_n_samples")]
    pub n_samples: usize,
    #[serde(default = "default_synthetic_seed")]
    pub seed: u64,
}

/// Pollution multiplier and temperature baseline for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityProfile {
    pub name: String,
    #[serde(default)]
    pub state: String,
    pub pollution: f64,
    /// Baseline temperature in °C.
    pub temp_base: f64,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}

fn default_stations_file() -> String {
    "Stations_Info.csv".into()
}
fn default_data_dir() -> String {
    ".".into()
}
fn default_city() -> String {
    "Delhi".into()
}

fn default_max_age() -> u64 {
    3600
}
fn default_sweep_interval() -> u64 {
    1800
}

fn default_horizon() -> usize {
    24
}

fn default_n_samples() -> usize {
    72
}
fn default_synthetic_seed() -> u64 {
    42
}

pub fn default_city_profiles() -> Vec<CityProfile> {
    [
        ("Delhi", "Delhi", 1.5, 25.0),
        ("Mumbai", "Maharashtra", 1.2, 28.0),
        ("Bengaluru", "Karnataka", 0.8, 22.0),
        ("Chennai", "Tamil Nadu", 1.0, 30.0),
        ("Kolkata", "West Bengal", 1.3, 26.0),
        ("Hyderabad", "Telangana", 1.1, 24.0),
    ]
    .into_iter()
    .map(|(name, state, pollution, temp_base)| CityProfile {
        name: name.into(),
        state: state.into(),
        pollution,
        temp_base,
    })
    .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            stations_file: default_stations_file(),
            data_dir: default_data_dir(),
            default_city: default_city(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_max_age(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: default_horizon(),
            seed: None,
        }
    }
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_samples: default_n_samples(),
            seed: default_synthetic_seed(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            data: DataConfig::default(),
            cache: CacheConfig::default(),
            forecast: ForecastConfig::default(),
            synthetic: SyntheticConfig::default(),
            cities: default_city_profiles(),
        }
    }
}
