use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, Interval, MissedTickBehavior};

use crate::constants::FETCH_TIMEOUT_SECS;
use crate::models::price::RefreshOutcome;
use crate::PortfolioTracker;

/// Background task that keeps prices current.
///
/// Refreshes once on start, then every `refresh_interval_secs` from the
/// tracker's settings. [`RefreshScheduler::trigger`] and the tracker's
/// first-symbol hook wake it early. A tick that arrives while a refresh is
/// still running is skipped.
pub struct RefreshScheduler {
    wake: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Spawn the scheduler on the current tokio runtime.
    pub async fn start(tracker: Arc<Mutex<PortfolioTracker>>) -> Self {
        Self::start_with_timeout(tracker, Duration::from_secs(FETCH_TIMEOUT_SECS)).await
    }

    /// Like [`RefreshScheduler::start`] with a custom per-fetch timeout.
    pub async fn start_with_timeout(
        tracker: Arc<Mutex<PortfolioTracker>>,
        fetch_timeout: Duration,
    ) -> Self {
        let wake = Arc::new(Notify::new());
        {
            let hook_wake = Arc::clone(&wake);
            tracker
                .lock()
                .await
                .set_refresh_hook(move || hook_wake.notify_one());
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(tracker, Arc::clone(&wake), shutdown_rx, fetch_timeout));
        info!("Price refresh scheduler started");

        Self {
            wake,
            shutdown,
            handle,
        }
    }

    /// Request a refresh now instead of waiting for the next tick.
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    /// Stop the task and wait for it to finish. A fetch in progress is
    /// allowed to complete first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!("Price refresh scheduler ended abnormally: {e}");
        }
        info!("Price refresh scheduler stopped");
    }
}

/// One begin → fetch → complete cycle.
///
/// The tracker is only locked to take a ticket and to apply the result; the
/// network fetch runs unlocked so mutations are never blocked by it. A fetch
/// that exceeds `fetch_timeout` is aborted and the snapshot marked stale.
pub async fn refresh_once(
    tracker: &Mutex<PortfolioTracker>,
    fetch_timeout: Duration,
) -> RefreshOutcome {
    let (ticket, service) = {
        let mut guard = tracker.lock().await;
        match guard.begin_refresh() {
            Some(ticket) => (ticket, guard.price_service()),
            None => return RefreshOutcome::Skipped,
        }
    };

    let fetched = timeout(fetch_timeout, service.fetch_prices(&ticket.requests)).await;

    let mut guard = tracker.lock().await;
    match fetched {
        Ok(fetch) => guard.complete_refresh(&ticket, fetch),
        Err(_) => {
            warn!(
                "Price fetch timed out after {}s",
                fetch_timeout.as_secs_f64()
            );
            guard.abort_refresh(&ticket)
        }
    }
}

async fn run(
    tracker: Arc<Mutex<PortfolioTracker>>,
    wake: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
    fetch_timeout: Duration,
) {
    let mut period = configured_period(&tracker).await;
    let mut ticker = ticker_for(period, Instant::now());

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
            _ = wake.notified() => debug!("Price refresh requested"),
        }

        let outcome = refresh_once(&tracker, fetch_timeout).await;
        debug!("Scheduled refresh finished: {outcome:?}");

        let configured = configured_period(&tracker).await;
        if configured != period {
            debug!("Refresh interval changed to {}s", configured.as_secs());
            period = configured;
            ticker = ticker_for(period, Instant::now() + period);
        }
    }
}

async fn configured_period(tracker: &Mutex<PortfolioTracker>) -> Duration {
    Duration::from_secs(tracker.lock().await.get_settings().refresh_interval_secs)
}

fn ticker_for(period: Duration, start: Instant) -> Interval {
    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
