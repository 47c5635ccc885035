//! PM2.5 → AQI scoring.
//!
//! US-EPA style breakpoint interpolation. The result is truncated toward
//! zero, not rounded, so a concentration just below a breakpoint stays in
//! the lower band.

use common::{AqiCategory, CategoryInfo};

/// AQI returned when the input cannot be scored.
pub const FALLBACK_AQI: i64 = 50;

/// `(conc_low, conc_high, aqi_low, aqi_high)` per band.
const PM25_BANDS: [(f64, f64, f64, f64); 6] = [
    (0.0, 12.0, 0.0, 50.0),
    (12.1, 35.4, 51.0, 100.0),
    (35.5, 55.4, 101.0, 150.0),
    (55.5, 150.4, 151.0, 200.0),
    (150.5, 250.4, 201.0, 300.0),
    (250.5, 500.4, 301.0, 500.0),
];

/// Score a PM2.5 concentration (µg/m³).
///
/// Negative input is clamped to 0. Non-finite input yields
/// [`FALLBACK_AQI`]. Concentrations above the last breakpoint extrapolate
/// along the top band.
pub fn score(pm25: f64) -> i64 {
    if !pm25.is_finite() {
        return FALLBACK_AQI;
    }
    let pm25 = pm25.max(0.0);

    let (c_lo, c_hi, a_lo, a_hi) = PM25_BANDS
        .iter()
        .copied()
        .find(|&(_, c_hi, _, _)| pm25 <= c_hi)
        .unwrap_or(PM25_BANDS[PM25_BANDS.len() - 1]);

    let aqi = (a_hi - a_lo) / (c_hi - c_lo) * (pm25 - c_lo) + a_lo;
    if aqi.is_finite() {
        aqi as i64
    } else {
        FALLBACK_AQI
    }
}

/// Score a textual concentration, falling back to [`FALLBACK_AQI`] when it
/// does not parse.
pub fn score_str(raw: &str) -> i64 {
    raw.trim().parse::<f64>().map(score).unwrap_or(FALLBACK_AQI)
}

pub fn category(aqi: i64) -> AqiCategory {
    match aqi {
        i64::MIN..=50 => AqiCategory::Good,
        51..=100 => AqiCategory::Moderate,
        101..=150 => AqiCategory::UnhealthyForSensitiveGroups,
        151..=200 => AqiCategory::Unhealthy,
        201..=300 => AqiCategory::VeryUnhealthy,
        _ => AqiCategory::Hazardous,
    }
}

/// Category, color and icon for an AQI value.
pub fn categorize(aqi: i64) -> CategoryInfo {
    category(aqi).info()
}

/// Like [`categorize`] for untyped input; anything that is not an integer
/// (a whole-valued float such as `"42.0"` is accepted) maps to `Unknown`.
pub fn categorize_str(raw: &str) -> CategoryInfo {
    let raw = raw.trim();
    let parsed = raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v.trunc() as i64)
    });
    match parsed {
        Some(aqi) => categorize(aqi),
        None => AqiCategory::Unknown.info(),
    }
}
