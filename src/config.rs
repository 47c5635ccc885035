//! Configuration loader: defaults, then config.toml, then `.env` and
//! `AQI_*` environment overrides.

use common::config::MAX_SYNTHETIC_SAMPLES;
use common::{Error, MonitorConfig};
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn parse_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer >= 0")))
}

fn non_empty(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn validate_config(config: &MonitorConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.server.host.trim().is_empty() {
        issues.push("server.host must not be empty".into());
    }

    if config.data.stations_file.trim().is_empty() {
        issues.push("data.stations_file must not be empty".into());
    }
    if config.data.default_city.trim().is_empty() {
        issues.push("data.default_city must not be empty".into());
    }

    if config.cache.max_age_secs == 0 {
        issues.push("cache.max_age_secs must be > 0".into());
    }
    if config.cache.sweep_interval_secs == 0 {
        issues.push("cache.sweep_interval_secs must be > 0".into());
    }

    if config.forecast.horizon == 0 {
        issues.push("forecast.horizon must be > 0".into());
    }
    if config.forecast.horizon > 168 {
        issues.push("forecast.horizon must be <= 168".into());
    }

    if config.synthetic.n_samples == 0 {
        issues.push("synthetic.n_samples must be > 0".into());
    }
    if config.synthetic.n_samples > MAX_SYNTHETIC_SAMPLES {
        issues.push(format!(
            "synthetic.n_samples must be <= {MAX_SYNTHETIC_SAMPLES}"
        ));
    }

    if config.cities.is_empty() {
        issues.push("cities must contain at least one city profile".into());
    }
    for city in &config.cities {
        if city.name.trim().is_empty() {
            issues.push("cities[].name must not be empty".into());
        }
        if !city.pollution.is_finite() || city.pollution < 0.0 {
            issues.push(format!("cities.{}.pollution must be >= 0", city.name));
        }
        if !city.temp_base.is_finite() {
            issues.push(format!("cities.{}.temp_base must be finite", city.name));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Apply `AQI_*` overrides read through `lookup`.
fn apply_env_overrides<F>(config: &mut MonitorConfig, lookup: F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("AQI_HOST").and_then(non_empty) {
        config.server.host = host;
    }
    if let Some(raw) = lookup("AQI_PORT") {
        config.server.port = raw
            .trim()
            .parse::<u16>()
            .map_err(|_| Error::Config("AQI_PORT must be a port number".into()))?;
    }
    if let Some(path) = lookup("AQI_STATIONS_FILE").and_then(non_empty) {
        config.data.stations_file = path;
    }
    if let Some(dir) = lookup("AQI_DATA_DIR").and_then(non_empty) {
        config.data.data_dir = dir;
    }
    if let Some(city) = lookup("AQI_DEFAULT_CITY").and_then(non_empty) {
        config.data.default_city = city;
    }
    if let Some(raw) = lookup("AQI_CACHE_MAX_AGE_SECS") {
        config.cache.max_age_secs = parse_positive_u64(&raw, "AQI_CACHE_MAX_AGE_SECS")?;
    }
    if let Some(raw) = lookup("AQI_CACHE_SWEEP_SECS") {
        config.cache.sweep_interval_secs = parse_positive_u64(&raw, "AQI_CACHE_SWEEP_SECS")?;
    }
    if let Some(raw) = lookup("AQI_FORECAST_HORIZON") {
        config.forecast.horizon = parse_positive_u64(&raw, "AQI_FORECAST_HORIZON")? as usize;
    }
    if let Some(raw) = lookup("AQI_FORECAST_SEED") {
        config.forecast.seed = match raw.trim() {
            "" | "none" | "random" => None,
            seed => Some(parse_u64(seed, "AQI_FORECAST_SEED")?),
        };
    }
    if let Some(raw) = lookup("AQI_SYNTHETIC_SAMPLES") {
        config.synthetic.n_samples = parse_positive_u64(&raw, "AQI_SYNTHETIC_SAMPLES")? as usize;
    }
    if let Some(raw) = lookup("AQI_SYNTHETIC_SEED") {
        config.synthetic.seed = parse_u64(&raw, "AQI_SYNTHETIC_SEED")?;
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<MonitorConfig, Error> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&contents)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Load monitor configuration.
///
/// An explicit `path` must exist; without one, `config.toml` in the working
/// directory is used when present.
pub fn load_config(path: Option<&Path>) -> Result<MonitorConfig, Error> {
    // 1. Load .env so its values reach the override step.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Defaults, replaced by the config file when there is one.
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                read_config_file(default_path)?
            } else {
                MonitorConfig::default()
            }
        }
    };

    // 3. Environment overrides (highest priority).
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&MonitorConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let mut config = MonitorConfig::default();
        config.cache.sweep_interval_secs = 0;
        config.synthetic.n_samples = 0;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("cache.sweep_interval_secs must be > 0"), "{err}");
        assert!(err.contains("synthetic.n_samples must be > 0"), "{err}");
    }

    #[test]
    fn test_oversized_sample_count_rejected() {
        let mut config = MonitorConfig::default();
        apply_env_overrides(&mut config, env_of(&[("AQI_SYNTHETIC_SAMPLES", "3000000000")]))
            .unwrap();

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("synthetic.n_samples must be <= 1000000"), "{err}");

        config.synthetic.n_samples = MAX_SYNTHETIC_SAMPLES;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut config = MonitorConfig::default();
        let env = env_of(&[
            ("AQI_PORT", "8080"),
            ("AQI_DEFAULT_CITY", "Mumbai"),
            ("AQI_CACHE_MAX_AGE_SECS", "120"),
            ("AQI_FORECAST_SEED", "99"),
            ("AQI_DATA_DIR", "   "),
        ]);
        apply_env_overrides(&mut config, env).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.data.default_city, "Mumbai");
        assert_eq!(config.cache.max_age_secs, 120);
        assert_eq!(config.forecast.seed, Some(99));
        // Blank values leave the default in place.
        assert_eq!(config.data.data_dir, ".");
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let mut config = MonitorConfig::default();
        let err = apply_env_overrides(&mut config, env_of(&[("AQI_CACHE_SWEEP_SECS", "0")]))
            .unwrap_err();
        assert_eq!(err.code(), "E011");

        let err = apply_env_overrides(&mut config, env_of(&[("AQI_PORT", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("AQI_PORT"));
    }

    #[test]
    fn test_config_file_sections_merge_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 9000\n\n[forecast]\nseed = 5\n\n[[cities]]\nname = \"Pune\"\npollution = 0.9\ntemp_base = 27.0\n"
        )
        .unwrap();

        let config = read_config_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.forecast.seed, Some(5));
        assert_eq!(config.forecast.horizon, 24);
        assert_eq!(config.cities.len(), 1);
        assert_eq!(config.cities[0].name, "Pune");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = read_config_file(Path::new("/nonexistent/aqi.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
