use chrono::TimeDelta;
use parking_lot::{Mutex, RwLock};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};

use crate::{
    Mode, Units, WeatherError, WeatherProvider, WeatherRecord,
    cache::{self, Lookup, WeatherCache},
    clock::Clock,
    model::normalize,
    scheduler::{self, RefreshScheduler},
};

/// Tunables shared by every session a [`Registry`](crate::Registry) creates.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub cache_capacity: usize,
    pub cache_ttl: TimeDelta,
    pub polling_interval: Duration,
    pub shutdown_grace: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cache_capacity: cache::DEFAULT_CAPACITY,
            cache_ttl: cache::default_ttl(),
            polling_interval: scheduler::DEFAULT_POLLING_INTERVAL,
            shutdown_grace: scheduler::DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Outcome of one pass over every cached city.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub refreshed: Vec<String>,
    pub failed: Vec<(String, WeatherError)>,
}

impl RefreshReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// State shared between a session and its refresh task.
pub(crate) struct SessionCore {
    credential: String,
    units: Units,
    cache: RwLock<WeatherCache>,
    provider: Arc<dyn WeatherProvider>,
}

impl std::fmt::Debug for SessionCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCore")
            .field("credential", &"<redacted>")
            .field("units", &self.units)
            .field("cache_size", &self.cache.read().size())
            .field("provider", &self.provider)
            .finish()
    }
}

impl SessionCore {
    fn cached(&self, location: &str) -> Option<WeatherRecord> {
        let lookup = self.cache.read().lookup(location);
        match lookup {
            Lookup::Hit(record) => Some(record),
            Lookup::Expired => {
                if self.cache.write().remove_expired(location) {
                    debug!(city = %location, "Dropped expired cache entry");
                }
                None
            }
            Lookup::Miss => None,
        }
    }

    fn store(&self, location: &str, record: WeatherRecord) {
        let evicted = self.cache.write().put(location, record);
        if let Some(evicted) = evicted {
            debug!(city = %location, evicted = %evicted, "Evicted least recently used city");
        }
    }

    async fn fetch(&self, location: &str) -> Result<WeatherRecord, WeatherError> {
        self.provider.fetch(location, &self.credential, self.units).await
    }

    /// Re-fetch every cached city. A failing city is logged and skipped.
    pub(crate) async fn refresh_cached(&self) -> RefreshReport {
        let cities = self.cache.read().list_keys();
        let mut report = RefreshReport::default();

        for city in cities {
            match self.fetch(&city).await {
                Ok(record) => {
                    self.store(&city, record);
                    report.refreshed.push(city);
                }
                Err(e) => {
                    warn!(city = %city, error = %e, "Failed to refresh cached weather");
                    report.failed.push((city, e));
                }
            }
        }

        report
    }
}

/// One API key's view of the weather: a cache, a provider and, in polling
/// mode, a background refresh task.
///
/// Obtain sessions from [`Registry::get_or_create`](crate::Registry::get_or_create).
#[derive(Debug)]
pub struct Session {
    core: Arc<SessionCore>,
    mode: Mode,
    scheduler: Mutex<Option<RefreshScheduler>>,
}

impl Session {
    pub(crate) fn start(
        credential: String,
        mode: Mode,
        units: Units,
        provider: Arc<dyn WeatherProvider>,
        settings: &SessionSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, WeatherError> {
        let cache = WeatherCache::with_settings(settings.cache_capacity, settings.cache_ttl, clock)?;
        let core = Arc::new(SessionCore {
            credential,
            units,
            cache: RwLock::new(cache),
            provider,
        });

        let scheduler = match mode {
            Mode::Polling => Some(RefreshScheduler::start(
                core.clone(),
                settings.polling_interval,
                settings.shutdown_grace,
            )?),
            Mode::OnDemand => None,
        };

        Ok(Self {
            core,
            mode,
            scheduler: Mutex::new(scheduler),
        })
    }

    /// Weather for `location`, served from cache when fresh.
    ///
    /// Concurrent misses for the same city each reach the provider; the last
    /// response written wins.
    #[instrument(skip(self), fields(mode = %self.mode))]
    pub async fn get_weather(&self, location: &str) -> Result<WeatherRecord, WeatherError> {
        let location = normalize(location, "City name")?;

        if let Some(record) = self.core.cached(location) {
            debug!(city = %location, "Cache hit");
            return Ok(record);
        }

        debug!(city = %location, "Cache miss, fetching from provider");
        let record = self.core.fetch(location).await?;
        self.core.store(location, record.clone());

        Ok(record)
    }

    /// Run one refresh pass now, independent of the polling schedule.
    pub async fn refresh_cached(&self) -> RefreshReport {
        self.core.refresh_cached().await
    }

    pub fn cache_size(&self) -> usize {
        self.core.cache.read().size()
    }

    pub fn cached_cities(&self) -> Vec<String> {
        self.core.cache.read().list_keys()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn units(&self) -> Units {
        self.core.units
    }

    /// Normalized API key this session was created for.
    pub fn credential(&self) -> &str {
        &self.core.credential
    }

    /// Whether a background refresh task is still attached.
    pub fn is_refreshing(&self) -> bool {
        self.scheduler.lock().is_some()
    }

    /// Stop background refresh, if any. Safe to call repeatedly.
    pub(crate) async fn shutdown(&self) {
        let scheduler = self.scheduler.lock().take();
        if let Some(mut scheduler) = scheduler {
            scheduler.shutdown().await;
            info!(mode = %self.mode, "Stopped background refresh");
        }
    }

    #[cfg(test)]
    pub(crate) fn core(&self) -> &SessionCore {
        &self.core
    }
}

#[cfg(test)]
impl SessionCore {
    pub(crate) fn stored_at(&self, location: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        self.cache.read().peek(location).map(|entry| entry.stored_at())
    }

    pub(crate) fn seed(&self, location: &str, record: WeatherRecord) {
        self.store(location, record);
    }
}
