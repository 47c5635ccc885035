//! Per-city CSV loading and writing.

use chrono::{Datelike, Timelike};
use common::{parse_timestamp, Error, Reading, Result, Series};
use serde::Deserialize;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::aqi;
use crate::stations::StationDirectory;

/// Columns a station file must carry to be usable.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "PM2.5",
    "PM10",
    "SO2",
    "NO2",
    "CO",
    "O3",
    "TEMP",
    "HUMIDITY",
    "PRESSURE",
    "WIND_SPEED",
];

/// A raw CSV row. Unparseable cells become `None` and the row is dropped.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    datetime: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    hour: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    day: Option<f64>,
    #[serde(rename = "PM2.5", deserialize_with = "csv::invalid_option")]
    pm25: Option<f64>,
    #[serde(rename = "PM10", deserialize_with = "csv::invalid_option")]
    pm10: Option<f64>,
    #[serde(rename = "SO2", deserialize_with = "csv::invalid_option")]
    so2: Option<f64>,
    #[serde(rename = "NO2", deserialize_with = "csv::invalid_option")]
    no2: Option<f64>,
    #[serde(rename = "CO", deserialize_with = "csv::invalid_option")]
    co: Option<f64>,
    #[serde(rename = "O3", deserialize_with = "csv::invalid_option")]
    o3: Option<f64>,
    #[serde(rename = "TEMP", deserialize_with = "csv::invalid_option")]
    temp: Option<f64>,
    #[serde(rename = "HUMIDITY", deserialize_with = "csv::invalid_option")]
    humidity: Option<f64>,
    #[serde(rename = "PRESSURE", deserialize_with = "csv::invalid_option")]
    pressure: Option<f64>,
    #[serde(rename = "WIND_SPEED", deserialize_with = "csv::invalid_option")]
    wind_speed: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    aqi: Option<f64>,
}

impl RawRecord {
    fn into_reading(self) -> Option<Reading> {
        let datetime = parse_timestamp(self.datetime.as_deref()?)?;
        let concentrations = [self.pm25?, self.pm10?, self.so2?, self.no2?, self.co?, self.o3?];
        if concentrations.iter().any(|c| !c.is_finite() || *c < 0.0) {
            return None;
        }
        let [pm25, pm10, so2, no2, co, o3] = concentrations;
        let aqi = match self.aqi {
            Some(v) if v.is_finite() => v as i64,
            _ => aqi::score(pm25),
        };
        Some(Reading {
            datetime,
            hour: self
                .hour
                .filter(|h| (0.0..24.0).contains(h))
                .map_or(datetime.hour(), |h| h as u32),
            day: self
                .day
                .filter(|d| (1.0..32.0).contains(d))
                .map_or(datetime.day(), |d| d as u32),
            pm25,
            pm10,
            so2,
            no2,
            co,
            o3,
            temp: self.temp?,
            humidity: self.humidity?,
            pressure: self.pressure?,
            wind_speed: self.wind_speed?,
            aqi,
        })
    }
}

/// Parse a station CSV into a series sorted oldest-first.
///
/// Fails with `DataLoad` when required columns are missing or no row
/// survives cleaning.
pub fn read_series<R: Read>(reader: R) -> Result<Series> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();

    let mut missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h.trim() == *col))
        .collect();
    if !headers.iter().any(|h| h.trim() == "datetime") {
        missing.push("datetime");
    }
    if !missing.is_empty() {
        return Err(Error::DataLoad(format!(
            "missing columns: {}",
            missing.join(", ")
        )));
    }

    let mut series = Series::new();
    let mut dropped = 0usize;
    for record in rdr.deserialize::<RawRecord>() {
        match record.ok().and_then(RawRecord::into_reading) {
            Some(reading) => series.push(reading),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!("Dropped {} incomplete rows", dropped);
    }
    if series.is_empty() {
        return Err(Error::DataLoad("no usable rows after cleaning".into()));
    }

    series.sort_by_key(|r| r.datetime);
    Ok(series)
}

/// Load the series for `city` via the station directory.
pub fn load_city_series(directory: &StationDirectory, city: &str) -> Result<Series> {
    let path = directory.data_path(city)?;
    let file = std::fs::File::open(&path)
        .map_err(|e| Error::DataLoad(format!("{}: {}", path.display(), e)))?;
    let series = read_series(file)?;
    info!(
        "Data loaded from {} for {}: {} readings",
        path.display(),
        city,
        series.len()
    );
    Ok(series)
}

pub fn write_series<W: Write>(writer: W, series: &[Reading]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for reading in series {
        wtr.serialize(reading)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `series` to `path` in the station CSV layout.
pub fn write_series_csv(path: impl AsRef<Path>, series: &[Reading]) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_series(file, series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stations::StationInfo;
    use chrono::{TimeZone, Utc};

    const HEADER: &str =
        "datetime,hour,day,PM2.5,PM10,SO2,NO2,CO,O3,TEMP,HUMIDITY,PRESSURE,WIND_SPEED,aqi,wd";

    #[test]
    fn test_read_sorts_and_keeps_aqi() {
        let csv = format!(
            "{HEADER}\n\
             2024-01-05 08:00:00,8,5,41.0,80,9,30,900,60,24,55,1010,2.5,114,N\n\
             2024-01-05 07:00:00,7,5,10.0,20,2,8,200,15,25,50,1013,5.0,41,NE\n"
        );
        let series = read_series(csv.as_bytes()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].hour, 7);
        assert_eq!(series[1].aqi, 114);
        assert_eq!(
            series[1].datetime,
            Utc.with_ymd_and_hms(2024, 1, 5, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_rows_with_gaps_are_dropped() {
        let csv = format!(
            "{HEADER}\n\
             2024-01-05 07:00:00,7,5,,20,2,8,200,15,25,50,1013,5.0,41,N\n\
             2024-01-05 08:00:00,8,5,abc,20,2,8,200,15,25,50,1013,5.0,41,N\n\
             2024-01-05 09:00:00,9,5,-3,20,2,8,200,15,25,50,1013,5.0,41,N\n\
             2024-01-05 10:00:00,10,5,12.0,20,2,8,200,15,25,50,1013,5.0,50,N\n"
        );
        let series = read_series(csv.as_bytes()).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].hour, 10);
    }

    #[test]
    fn test_derives_missing_hour_day_and_aqi() {
        let csv = "datetime,PM2.5,PM10,SO2,NO2,CO,O3,TEMP,HUMIDITY,PRESSURE,WIND_SPEED\n\
                   2024-02-03T17:00:00,35.4,20,2,8,200,15,25,50,1013,5.0\n";
        let series = read_series(csv.as_bytes()).unwrap();
        assert_eq!(series[0].hour, 17);
        assert_eq!(series[0].day, 3);
        assert_eq!(series[0].aqi, 100);
    }

    #[test]
    fn test_missing_columns_rejected() {
        let csv = "datetime,PM2.5,PM10\n2024-01-05 07:00:00,10,20\n";
        let err = read_series(csv.as_bytes()).unwrap_err();
        match err {
            Error::DataLoad(msg) => {
                assert!(msg.contains("SO2"));
                assert!(msg.contains("WIND_SPEED"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_after_cleaning_rejected() {
        let csv = format!("{HEADER}\n");
        assert!(matches!(
            read_series(csv.as_bytes()),
            Err(Error::DataLoad(_))
        ));
    }

    #[test]
    fn test_written_series_reads_back() {
        let tmp = tempfile::tempdir().unwrap();
        let reading = Reading {
            datetime: Utc.with_ymd_and_hms(2024, 1, 5, 7, 0, 0).unwrap(),
            hour: 7,
            day: 5,
            pm25: 41.0,
            pm10: 80.0,
            so2: 9.0,
            no2: 30.0,
            co: 900.0,
            o3: 60.0,
            temp: 24.0,
            humidity: 55.0,
            pressure: 1010.0,
            wind_speed: 2.5,
            aqi: 114,
        };
        let path = tmp.path().join("delhi_data.csv");
        write_series_csv(&path, std::slice::from_ref(&reading)).unwrap();

        let directory = StationDirectory::new(
            vec![StationInfo {
                state: "Delhi".into(),
                city: "Delhi".into(),
                file_name: "delhi_data.csv".into(),
                agency: "CPCB".into(),
                station_location: "Delhi Station".into(),
                start_month: "January".into(),
                start_month_num: Some(1.0),
                start_year: Some(2015.0),
            }],
            tmp.path(),
        );
        let loaded = load_city_series(&directory, "Delhi").unwrap();
        assert_eq!(loaded, vec![reading]);
    }

    #[test]
    fn test_missing_file_is_data_load_error() {
        let tmp = tempfile::tempdir().unwrap();
        let directory = StationDirectory::new(
            vec![StationInfo {
                state: "Maharashtra".into(),
                city: "Mumbai".into(),
                file_name: "mumbai_data.csv".into(),
                agency: String::new(),
                station_location: String::new(),
                start_month: String::new(),
                start_month_num: None,
                start_year: None,
            }],
            tmp.path(),
        );
        let err = load_city_series(&directory, "Mumbai").unwrap_err();
        assert_eq!(err.code(), "E001");
    }
}
