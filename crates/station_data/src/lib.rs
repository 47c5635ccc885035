//! Station data crate.
//!
//! Loads per-city readings from the station directory, scores PM2.5 into
//! AQI, and synthesizes stand-in series when real data is unavailable.

pub mod aqi;
pub mod loader;
pub mod stations;
pub mod synthetic;

pub use aqi::{categorize, categorize_str, score, score_str};
pub use loader::{load_city_series, write_series_csv, REQUIRED_COLUMNS};
pub use stations::{StationDirectory, StationInfo, STATIONS_FILE_NAME};
pub use synthetic::SyntheticSeriesGenerator;
