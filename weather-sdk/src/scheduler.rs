//! Background refresh for polling sessions.
//!
//! Each polling session owns one Tokio task. The task re-fetches every cached
//! city on a fixed period, starting immediately. Stopping it is cooperative
//! first (cancellation token, bounded wait) and forced after the grace period.

use std::{sync::Arc, time::Duration};
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{WeatherError, session::SessionCore};

pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub(crate) struct RefreshScheduler {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    grace: Duration,
}

impl RefreshScheduler {
    /// Spawn the refresh task on the current Tokio runtime.
    pub(crate) fn start(
        core: Arc<SessionCore>,
        interval: Duration,
        grace: Duration,
    ) -> Result<Self, WeatherError> {
        if interval.is_zero() {
            return Err(WeatherError::validation("Polling interval must be greater than zero"));
        }

        let runtime = Handle::try_current().map_err(|_| {
            WeatherError::Runtime("Polling mode must be started from within a Tokio runtime".into())
        })?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let span = info_span!("weather_refresh", interval_secs = interval.as_secs());
        let handle = runtime.spawn(run(core, interval, token).instrument(span));

        info!(interval_secs = interval.as_secs(), "Started background refresh");

        Ok(Self {
            cancel,
            handle: Some(handle),
            grace,
        })
    }

    /// Ask the task to stop, wait up to the grace period, then abort it.
    ///
    /// Once this returns the task is no longer issuing requests. The handle
    /// stays in `self` until the task has ended, so dropping this future
    /// part-way leaves `Drop` to abort the task.
    pub(crate) async fn shutdown(&mut self) {
        self.cancel.cancel();

        let grace = self.grace;
        let Some(handle) = self.handle.as_mut() else {
            return;
        };

        match time::timeout(grace, &mut *handle).await {
            Ok(Ok(())) => debug!("Refresh task stopped"),
            Ok(Err(e)) => warn!(error = %e, "Refresh task ended abnormally"),
            Err(_) => {
                warn!(?grace, "Refresh task did not stop in time, aborting");
                handle.abort();
                let _ = handle.await;
            }
        }

        self.handle = None;
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run(core: Arc<SessionCore>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let report = core.refresh_cached().await;
                debug!(
                    refreshed = report.refreshed.len(),
                    failed = report.failed.len(),
                    "Refresh pass finished"
                );
            }
        }
    }
}
