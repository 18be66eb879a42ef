// ── Gateway liveness ──
//
// A periodic status broadcast doubles as the liveness probe: the gateway
// answers `ok` and pushes fresh `all` frames. `threshold` consecutive
// failures flip the `connected` flag off; one success flips it back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::DeviceRegistry;

#[derive(Debug)]
pub struct LivenessTracker {
    threshold: u32,
    failures: AtomicU32,
    connected: watch::Sender<bool>,
}

impl LivenessTracker {
    /// Starts disconnected. `threshold` is clamped to at least 1.
    pub fn new(threshold: u32) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            threshold: threshold.max(1),
            failures: AtomicU32::new(0),
            connected,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Release);
        let flipped = self.connected.send_if_modified(|connected| !std::mem::replace(connected, true));
        if flipped {
            info!("gateway connected");
        }
    }

    /// Returns the consecutive-failure count after this failure.
    pub fn record_failure(&self) -> u32 {
        let failures = self.failures.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        if failures >= self.threshold {
            let flipped = self
                .connected
                .send_if_modified(|connected| std::mem::replace(connected, false));
            if flipped {
                warn!(failures, "gateway marked disconnected");
            }
        }
        failures
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }
}

/// Send one status broadcast and record the outcome.
pub async fn probe_once(registry: &DeviceRegistry, tracker: &LivenessTracker) -> bool {
    let Some(client) = registry.client() else {
        debug!("liveness probe skipped: no gateway client");
        tracker.record_failure();
        return false;
    };
    match client.request_status().await {
        Ok(true) => {
            tracker.record_success();
            true
        }
        Ok(false) => {
            let failures = tracker.record_failure();
            warn!(failures, "gateway rejected status request");
            false
        }
        Err(e) => {
            let failures = tracker.record_failure();
            warn!(failures, error = %e, "status request failed");
            false
        }
    }
}

/// Probe every `period`, starting immediately.
pub(crate) async fn liveness_task(
    registry: Arc<DeviceRegistry>,
    tracker: Arc<LivenessTracker>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = probe_once(&registry, &tracker) => {}
                }
            }
        }
    }
    debug!("liveness task exiting");
}
