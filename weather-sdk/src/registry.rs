use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info};

use crate::{
    Mode, Units, WeatherError, WeatherProvider,
    clock::{Clock, SystemClock},
    model::normalize,
    provider::openweather::OpenWeatherProvider,
    session::{Session, SessionSettings},
};

/// Directory of live sessions, at most one per API key.
///
/// Asking twice for the same key with the same mode and units hands back the
/// same [`Session`]. Asking with a different configuration is an error until
/// the existing session is destroyed.
pub struct Registry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    provider: Arc<dyn WeatherProvider>,
    settings: SessionSettings,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("sessions", &self.len())
            .field("provider", &self.provider)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Registry {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self::with_settings(provider, SessionSettings::default())
    }

    pub fn with_settings(provider: Arc<dyn WeatherProvider>, settings: SessionSettings) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            provider,
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    /// Registry backed by the public OpenWeatherMap endpoint.
    pub fn open_weather(settings: SessionSettings) -> Result<Self, WeatherError> {
        let provider = OpenWeatherProvider::new()?;
        Ok(Self::with_settings(Arc::new(provider), settings))
    }

    /// Use `clock` for cache expiry in sessions created from now on.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Return the session for `credential`, creating it on first use.
    ///
    /// Polling sessions start refreshing immediately, which requires a Tokio runtime.
    pub fn get_or_create(
        &self,
        credential: &str,
        mode: Mode,
        units: Units,
    ) -> Result<Arc<Session>, WeatherError> {
        let key = normalize(credential, "API key")?;

        if let Some(existing) = self.sessions.read().get(key) {
            ensure_same_config(existing, mode, units)?;
            return Ok(existing.clone());
        }

        let mut sessions = self.sessions.write();

        // Another caller may have created it between the two locks.
        if let Some(existing) = sessions.get(key) {
            ensure_same_config(existing, mode, units)?;
            return Ok(existing.clone());
        }

        let session = Arc::new(Session::start(
            key.to_string(),
            mode,
            units,
            self.provider.clone(),
            &self.settings,
            self.clock.clone(),
        )?);
        sessions.insert(key.to_string(), session.clone());

        info!(mode = %mode, units = %units, sessions = sessions.len(), "Created weather session");
        Ok(session)
    }

    /// Look up the live session for `credential` without creating one.
    pub fn get(&self, credential: &str) -> Option<Arc<Session>> {
        let key = normalize(credential, "API key").ok()?;
        self.sessions.read().get(key).cloned()
    }

    pub fn contains(&self, credential: &str) -> bool {
        self.get(credential).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Unregister `session` and stop its background refresh.
    ///
    /// The registry entry is only removed if it still points at this very
    /// session. Destroying twice is a no-op.
    pub async fn destroy(&self, session: &Arc<Session>) {
        let removed = {
            let mut sessions = self.sessions.write();
            let is_current = sessions
                .get(session.credential())
                .is_some_and(|current| Arc::ptr_eq(current, session));
            if is_current {
                sessions.remove(session.credential());
            }
            is_current
        };

        session.shutdown().await;
        debug!(removed, "Destroyed weather session");
    }

    /// Destroy whatever session is registered for `credential`, if any.
    pub async fn destroy_by_credential(&self, credential: &str) {
        let Ok(key) = normalize(credential, "API key") else {
            return;
        };

        let removed = self.sessions.write().remove(key);
        if let Some(session) = removed {
            session.shutdown().await;
            debug!("Destroyed weather session");
        }
    }

    /// Destroy every registered session.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<Session>> = self.sessions.write().drain().map(|(_, s)| s).collect();
        for session in &sessions {
            session.shutdown().await;
        }
        info!(count = sessions.len(), "Registry shut down");
    }
}

fn ensure_same_config(existing: &Session, mode: Mode, units: Units) -> Result<(), WeatherError> {
    if existing.mode() != mode || existing.units() != units {
        return Err(WeatherError::ConfigConflict {
            existing_mode: existing.mode(),
            existing_units: existing.units(),
        });
    }
    Ok(())
}
