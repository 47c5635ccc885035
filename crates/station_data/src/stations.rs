//! Station directory (`Stations_Info.csv`).

use common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Conventional name of the station directory file.
pub const STATIONS_FILE_NAME: &str = "Stations_Info.csv";

/// One row of the station directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationInfo {
    pub state: String,
    pub city: String,
    pub file_name: String,
    #[serde(default)]
    pub agency: String,
    #[serde(default)]
    pub station_location: String,
    #[serde(default)]
    pub start_month: String,
    /// Written as `1.0` by some exporters, hence the float.
    #[serde(default)]
    pub start_month_num: Option<f64>,
    #[serde(default)]
    pub start_year: Option<f64>,
}

impl StationInfo {
    /// Directory row for a city whose data file follows the naming
    /// convention of [`StationDirectory::file_name_for`].
    pub fn for_city(state: &str, city: &str) -> Self {
        Self {
            state: state.to_string(),
            city: city.to_string(),
            file_name: StationDirectory::file_name_for(city),
            agency: "CPCB".into(),
            station_location: format!("{city} Station"),
            start_month: "January".into(),
            start_month_num: Some(1.0),
            start_year: Some(2015.0),
        }
    }
}

/// Parsed station directory plus the directory its file names resolve in.
#[derive(Debug, Clone, Default)]
pub struct StationDirectory {
    stations: Vec<StationInfo>,
    data_dir: PathBuf,
}

impl StationDirectory {
    pub fn new(stations: Vec<StationInfo>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            stations,
            data_dir: data_dir.into(),
        }
    }

    /// Load the directory CSV at `path`; per-city files resolve in `data_dir`.
    pub fn load(path: impl AsRef<Path>, data_dir: impl Into<PathBuf>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            Error::DataLoad(format!("station directory {}: {}", path.display(), e))
        })?;
        let dir = Self::from_reader(file, data_dir)?;
        debug!(
            "Loaded {} stations from {}",
            dir.stations.len(),
            path.display()
        );
        Ok(dir)
    }

    pub fn from_reader<R: Read>(reader: R, data_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut stations = Vec::new();
        for record in rdr.deserialize::<StationInfo>() {
            stations.push(record?);
        }
        Ok(Self::new(stations, data_dir))
    }

    /// Write the directory as CSV with the same columns [`Self::load`] reads.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        self.write_to(file)?;
        debug!(
            "Wrote {} stations to {}",
            self.stations.len(),
            path.display()
        );
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for station in &self.stations {
            wtr.serialize(station)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn stations(&self) -> &[StationInfo] {
        &self.stations
    }

    /// City names in directory order. Duplicate names (the same city in
    /// two states) are listed once.
    pub fn cities(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.stations
            .iter()
            .filter(|s| seen.insert(s.city.as_str()))
            .map(|s| s.city.clone())
            .collect()
    }

    /// First station registered for `city`.
    pub fn find(&self, city: &str) -> Option<&StationInfo> {
        self.stations.iter().find(|s| s.city == city)
    }

    /// Absolute-or-relative path of the data file for `city`.
    pub fn data_path(&self, city: &str) -> Result<PathBuf> {
        let station = self
            .find(city)
            .ok_or_else(|| Error::DataLoad(format!("no station found for city '{city}'")))?;
        Ok(self.data_dir.join(&station.file_name))
    }

    /// Conventional data file name for a city (`Navi Mumbai` → `navi_mumbai_data.csv`).
    pub fn file_name_for(city: &str) -> String {
        format!("{}_data.csv", city.to_lowercase().replace(' ', "_"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTORY: &str = "\
state,city,file_name,agency,station_location,start_month,start_month_num,start_year
Delhi,Delhi,delhi_data.csv,CPCB,Delhi Station,January,1.0,2015.0
Maharashtra,Mumbai,mumbai_data.csv,CPCB,Mumbai Station,January,1,2015
Bihar,Aurangabad,aurangabad_data.csv,CPCB,Aurangabad Station,January,1,2015
Maharashtra,Aurangabad,aurangabad_data.csv,CPCB,Aurangabad Station,January,1,2015
";

    #[test]
    fn test_parse_directory() {
        let dir = StationDirectory::from_reader(DIRECTORY.as_bytes(), "/data").unwrap();
        assert_eq!(dir.stations().len(), 4);
        assert_eq!(dir.cities(), vec!["Delhi", "Mumbai", "Aurangabad"]);

        let delhi = dir.find("Delhi").unwrap();
        assert_eq!(delhi.agency, "CPCB");
        assert_eq!(delhi.start_year, Some(2015.0));
    }

    #[test]
    fn test_data_path_resolves_in_data_dir() {
        let dir = StationDirectory::from_reader(DIRECTORY.as_bytes(), "/data").unwrap();
        assert_eq!(
            dir.data_path("Mumbai").unwrap(),
            PathBuf::from("/data/mumbai_data.csv")
        );

        let err = dir.data_path("Atlantis").unwrap_err();
        assert_eq!(err.code(), "E001");
    }

    #[test]
    fn test_missing_directory_is_data_load_error() {
        let err = StationDirectory::load("/nonexistent/Stations_Info.csv", ".").unwrap_err();
        assert!(matches!(err, Error::DataLoad(_)));
    }

    #[test]
    fn test_file_name_convention() {
        assert_eq!(StationDirectory::file_name_for("Navi Mumbai"), "navi_mumbai_data.csv");
        assert_eq!(StationDirectory::file_name_for("Delhi"), "delhi_data.csv");
    }

    #[test]
    fn test_written_directory_reloads() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(STATIONS_FILE_NAME);
        let dir = StationDirectory::new(
            vec![
                StationInfo::for_city("Maharashtra", "Navi Mumbai"),
                StationInfo::for_city("Delhi", "Delhi"),
            ],
            tmp.path(),
        );
        dir.write_csv(&path).unwrap();

        let reloaded = StationDirectory::load(&path, tmp.path()).unwrap();
        assert_eq!(reloaded.stations(), dir.stations());
        assert_eq!(reloaded.cities(), vec!["Navi Mumbai", "Delhi"]);
        assert_eq!(
            reloaded.data_path("Navi Mumbai").unwrap(),
            tmp.path().join("navi_mumbai_data.csv")
        );
        assert_eq!(reloaded.find("Delhi").unwrap().agency, "CPCB");
    }
}
