//! In-memory cache for city datasets and forecasts.
//!
//! One mutex guards both the entry map and the active-city marker, so a
//! city switch and the clear it triggers are observed atomically.

use chrono::{DateTime, Utc};
use common::{Dataset, Pollutant, SharedClock};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::forecast::ForecastResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    RawData,
    SyntheticData,
    Forecast,
}

/// Cache key. Forecast keys carry `"{pollutant}:{len}"` as the qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: CacheKind,
    pub city: String,
    pub qualifier: Option<String>,
}

impl CacheKey {
    pub fn raw_data(city: &str) -> Self {
        Self {
            kind: CacheKind::RawData,
            city: city.to_string(),
            qualifier: None,
        }
    }

    pub fn synthetic_data(city: &str) -> Self {
        Self {
            kind: CacheKind::SyntheticData,
            city: city.to_string(),
            qualifier: None,
        }
    }

    /// Forecasts are keyed by the length of the series they were computed
    /// from, so a different window never reuses a stale prediction.
    pub fn forecast(city: &str, pollutant: Pollutant, len: usize) -> Self {
        Self {
            kind: CacheKind::Forecast,
            city: city.to_string(),
            qualifier: Some(format!("{pollutant}:{len}")),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CachePayload {
    Dataset(Arc<Dataset>),
    Forecast(Arc<ForecastResult>),
}

/// A cached payload with its insertion time.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: CachePayload,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_secs: u64) -> bool {
        (now - self.created_at).num_seconds() > max_age_secs as i64
    }
}

#[derive(Debug, Default)]
struct CacheState {
    active_city: Option<String>,
    entries: HashMap<CacheKey, CacheEntry>,
}

pub struct DataCache {
    state: Mutex<CacheState>,
    clock: SharedClock,
}

impl DataCache {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark `city` as the active city. Returns `true` when this switched
    /// away from a different city, in which case every entry was dropped.
    pub fn activate_city(&self, city: &str) -> bool {
        let mut state = self.lock();
        match state.active_city.as_deref() {
            Some(current) if current == city => false,
            previous => {
                let switched = previous.is_some();
                if switched {
                    let dropped = state.entries.len();
                    state.entries.clear();
                    info!("City changed to {}, cleared {} cache entries", city, dropped);
                }
                state.active_city = Some(city.to_string());
                switched
            }
        }
    }

    pub fn active_city(&self) -> Option<String> {
        self.lock().active_city.clone()
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.lock().entries.get(key).cloned()
    }

    /// Insert `payload` stamped with the current time. Entries for a city
    /// other than the active one are discarded.
    pub fn put(&self, key: CacheKey, payload: CachePayload) {
        let entry = CacheEntry {
            payload,
            created_at: self.clock.now(),
        };
        let mut state = self.lock();
        if let Some(active) = state.active_city.as_deref() {
            if active != key.city {
                debug!("Skipping cache insert for inactive city {}", key.city);
                return;
            }
        }
        state.entries.insert(key, entry);
    }

    pub fn get_dataset(&self, key: &CacheKey) -> Option<Arc<Dataset>> {
        match self.get(key)?.payload {
            CachePayload::Dataset(ds) => Some(ds),
            CachePayload::Forecast(_) => None,
        }
    }

    pub fn get_forecast(&self, key: &CacheKey) -> Option<Arc<ForecastResult>> {
        match self.get(key)?.payload {
            CachePayload::Forecast(f) => Some(f),
            CachePayload::Dataset(_) => None,
        }
    }

    /// Remove entries older than `max_age_secs`. Returns the number removed.
    pub fn sweep(&self, max_age_secs: u64) -> usize {
        let now = self.clock.now();
        let mut state = self.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| !entry.is_stale(now, max_age_secs));
        before - state.entries.len()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dataset_count(&self) -> usize {
        self.count_kind(|k| matches!(k, CacheKind::RawData | CacheKind::SyntheticData))
    }

    pub fn forecast_count(&self) -> usize {
        self.count_kind(|k| k == CacheKind::Forecast)
    }

    fn count_kind(&self, pred: impl Fn(CacheKind) -> bool) -> usize {
        self.lock().entries.keys().filter(|k| pred(k.kind)).count()
    }
}

/// Spawn the periodic sweep. The first sweep happens one full `interval`
/// after spawning.
pub fn spawn_sweep_task(
    cache: Arc<DataCache>,
    interval: Duration,
    max_age_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = cache.sweep(max_age_secs);
            info!("Cache cleanup completed. Removed {} entries", removed);
            debug!(
                "Cache after sweep: datasets={} forecasts={}",
                cache.dataset_count(),
                cache.forecast_count()
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::{DataOrigin, FixedClock};

    fn make_clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap(),
        ))
    }

    fn make_dataset(city: &str) -> CachePayload {
        CachePayload::Dataset(Arc::new(Dataset {
            city: Some(city.to_string()),
            origin: DataOrigin::Synthetic { seed: 42 },
            series: Vec::new(),
            pollutants: Pollutant::ALL.to_vec(),
        }))
    }

    fn make_forecast() -> CachePayload {
        CachePayload::Forecast(Arc::new(ForecastResult::fallback(Pollutant::Pm25, 24)))
    }

    #[test]
    fn test_city_switch_clears_everything() {
        let cache = DataCache::new(make_clock());
        assert!(!cache.activate_city("Delhi"));
        cache.put(CacheKey::raw_data("Delhi"), make_dataset("Delhi"));
        cache.put(CacheKey::forecast("Delhi", Pollutant::Pm25, 24), make_forecast());
        assert_eq!(cache.dataset_count(), 1);
        assert_eq!(cache.forecast_count(), 1);

        // Same city keeps entries.
        assert!(!cache.activate_city("Delhi"));
        assert_eq!(cache.len(), 2);

        assert!(cache.activate_city("Mumbai"));
        assert!(cache.is_empty());
        assert_eq!(cache.active_city().as_deref(), Some("Mumbai"));
        assert!(cache.get_dataset(&CacheKey::raw_data("Delhi")).is_none());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let clock = make_clock();
        let cache = DataCache::new(clock.clone());

        cache.put(CacheKey::raw_data("Delhi"), make_dataset("Delhi"));
        clock.advance(chrono::Duration::seconds(3000));
        cache.put(CacheKey::forecast("Delhi", Pollutant::O3, 24), make_forecast());
        clock.advance(chrono::Duration::seconds(1000));

        // Dataset is 4000s old, forecast 1000s.
        assert_eq!(cache.sweep(3600), 1);
        assert!(cache.get_dataset(&CacheKey::raw_data("Delhi")).is_none());
        assert!(cache
            .get_forecast(&CacheKey::forecast("Delhi", Pollutant::O3, 24))
            .is_some());
    }

    #[test]
    fn test_entry_at_exact_max_age_survives() {
        let clock = make_clock();
        let cache = DataCache::new(clock.clone());
        cache.put(CacheKey::raw_data("Delhi"), make_dataset("Delhi"));
        clock.advance(chrono::Duration::seconds(3600));
        assert_eq!(cache.sweep(3600), 0);
        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(cache.sweep(3600), 1);
    }

    #[test]
    fn test_forecast_keys_distinguish_window_length() {
        let a = CacheKey::forecast("Delhi", Pollutant::Pm25, 24);
        let b = CacheKey::forecast("Delhi", Pollutant::Pm25, 6);
        assert_ne!(a, b);
        assert_eq!(a.qualifier.as_deref(), Some("PM2.5:24"));
    }

    #[test]
    fn test_put_for_inactive_city_is_dropped() {
        let cache = DataCache::new(make_clock());
        cache.activate_city("Mumbai");
        cache.put(CacheKey::raw_data("Delhi"), make_dataset("Delhi"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_payload_kind_mismatch_is_a_miss() {
        let cache = DataCache::new(make_clock());
        let key = CacheKey::synthetic_data("Delhi");
        cache.put(key.clone(), make_dataset("Delhi"));
        assert!(cache.get_forecast(&key).is_none());
        assert!(cache.get_dataset(&key).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_task_runs_on_interval() {
        let clock = make_clock();
        let cache = Arc::new(DataCache::new(clock.clone()));
        cache.put(CacheKey::raw_data("Delhi"), make_dataset("Delhi"));
        clock.advance(chrono::Duration::seconds(7200));

        let handle = spawn_sweep_task(cache.clone(), Duration::from_secs(1800), 3600);

        // Nothing happens before the first full interval.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(cache.len(), 1);

        tokio::time::sleep(Duration::from_secs(1800)).await;
        assert!(cache.is_empty());

        handle.abort();
    }
}
