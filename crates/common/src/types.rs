//! Domain types shared across the monitor.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

// ── Pollutants ────────────────────────────────────────────────────────

/// The six pollutant channels carried by every reading.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Pollutant {
    #[default]
    #[serde(rename = "PM2.5")]
    Pm25,
    #[serde(rename = "PM10")]
    Pm10,
    #[serde(rename = "SO2")]
    So2,
    #[serde(rename = "NO2")]
    No2,
    #[serde(rename = "CO")]
    Co,
    #[serde(rename = "O3")]
    O3,
}

impl Pollutant {
    pub const ALL: [Pollutant; 6] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::So2,
        Pollutant::No2,
        Pollutant::Co,
        Pollutant::O3,
    ];

    /// Column label used in CSV files and JSON payloads.
    pub fn label(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::So2 => "SO2",
            Pollutant::No2 => "NO2",
            Pollutant::Co => "CO",
            Pollutant::O3 => "O3",
        }
    }

    /// Concentration of this pollutant in `reading`.
    pub fn value(self, reading: &Reading) -> f64 {
        match self {
            Pollutant::Pm25 => reading.pm25,
            Pollutant::Pm10 => reading.pm10,
            Pollutant::So2 => reading.so2,
            Pollutant::No2 => reading.no2,
            Pollutant::Co => reading.co,
            Pollutant::O3 => reading.o3,
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Pollutant {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PM2.5" | "PM25" => Ok(Pollutant::Pm25),
            "PM10" => Ok(Pollutant::Pm10),
            "SO2" => Ok(Pollutant::So2),
            "NO2" => Ok(Pollutant::No2),
            "CO" => Ok(Pollutant::Co),
            "O3" => Ok(Pollutant::O3),
            _ => Err(Error::InvalidParameter(format!("unknown pollutant '{raw}'"))),
        }
    }
}

// ── Time ranges ───────────────────────────────────────────────────────

/// Dashboard window selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "12h")]
    TwelveHours,
    #[default]
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "3d")]
    ThreeDays,
    #[serde(rename = "7d")]
    Week,
}

impl TimeRange {
    pub fn hours(self) -> usize {
        match self {
            TimeRange::SixHours => 6,
            TimeRange::TwelveHours => 12,
            TimeRange::Day => 24,
            TimeRange::ThreeDays => 72,
            TimeRange::Week => 168,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            TimeRange::SixHours => "6h",
            TimeRange::TwelveHours => "12h",
            TimeRange::Day => "24h",
            TimeRange::ThreeDays => "3d",
            TimeRange::Week => "7d",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "6h" => Ok(TimeRange::SixHours),
            "12h" => Ok(TimeRange::TwelveHours),
            "24h" => Ok(TimeRange::Day),
            "3d" => Ok(TimeRange::ThreeDays),
            "7d" => Ok(TimeRange::Week),
            _ => Err(Error::InvalidParameter(format!(
                "unknown time range '{raw}' (expected one of 6h, 12h, 24h, 3d, 7d)"
            ))),
        }
    }
}

// ── Readings ──────────────────────────────────────────────────────────

/// One hourly observation for a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(with = "timestamp_format")]
    pub datetime: DateTime<Utc>,
    pub hour: u32,
    pub day: u32,
    #[serde(rename = "PM2.5")]
    pub pm25: f64,
    #[serde(rename = "PM10")]
    pub pm10: f64,
    #[serde(rename = "SO2")]
    pub so2: f64,
    #[serde(rename = "NO2")]
    pub no2: f64,
    #[serde(rename = "CO")]
    pub co: f64,
    #[serde(rename = "O3")]
    pub o3: f64,
    /// Temperature in °C.
    #[serde(rename = "TEMP")]
    pub temp: f64,
    /// Relative humidity in %.
    #[serde(rename = "HUMIDITY")]
    pub humidity: f64,
    /// Pressure in hPa.
    #[serde(rename = "PRESSURE")]
    pub pressure: f64,
    /// Wind speed in m/s.
    #[serde(rename = "WIND_SPEED")]
    pub wind_speed: f64,
    pub aqi: i64,
}

/// Readings for one city, oldest first.
pub type Series = Vec<Reading>;

/// Where a dataset came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataOrigin {
    Station { file_name: String },
    Synthetic { seed: u64 },
}

/// A loaded or generated series plus its provenance.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub city: Option<String>,
    pub origin: DataOrigin,
    pub series: Series,
    pub pollutants: Vec<Pollutant>,
}

impl Dataset {
    pub fn is_synthetic(&self) -> bool {
        matches!(self.origin, DataOrigin::Synthetic { .. })
    }
}

// ── AQI categories ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AqiCategory {
    Good,
    Moderate,
    #[serde(rename = "Unhealthy for Sensitive Groups")]
    UnhealthyForSensitiveGroups,
    Unhealthy,
    #[serde(rename = "Very Unhealthy")]
    VeryUnhealthy,
    Hazardous,
    Unknown,
}

impl AqiCategory {
    pub fn label(self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
            AqiCategory::Unknown => "Unknown",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            AqiCategory::Good => "#00e400",
            AqiCategory::Moderate => "#ffff00",
            AqiCategory::UnhealthyForSensitiveGroups => "#ff7e00",
            AqiCategory::Unhealthy => "#ff0000",
            AqiCategory::VeryUnhealthy => "#8f3f97",
            AqiCategory::Hazardous => "#7e0023",
            AqiCategory::Unknown => "#666666",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            AqiCategory::Good => "CheckCircle",
            AqiCategory::Moderate | AqiCategory::Unknown => "AlertCircle",
            AqiCategory::UnhealthyForSensitiveGroups => "AlertTriangle",
            AqiCategory::Unhealthy | AqiCategory::VeryUnhealthy | AqiCategory::Hazardous => {
                "XCircle"
            }
        }
    }

    pub fn info(self) -> CategoryInfo {
        CategoryInfo {
            category: self.label().to_string(),
            color: self.color().to_string(),
            icon: self.icon().to_string(),
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Category/color/icon triple as consumed by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub category: String,
    pub color: String,
    pub icon: String,
}

// ── Timestamps ────────────────────────────────────────────────────────

/// Canonical timestamp layout for CSV files and JSON payloads.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse the timestamp layouts found in station CSVs. Naive values are
/// taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in [
        TIMESTAMP_FORMAT,
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub mod timestamp_format {
    use super::{parse_timestamp, TIMESTAMP_FORMAT};
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&dt.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("unrecognized timestamp '{raw}'")))
    }
}
