// ── Gateway address reconciliation ──
//
// The gateway gets its address from DHCP, so it can move. A background
// task re-locates it periodically; when the answer differs from the
// current address the controller tears the event session down, swaps the
// transport and persists the new address.

use std::time::Duration;

use futures_util::future::BoxFuture;
use meshgate_api::Discoverer;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::controller::Controller;
use crate::error::CoreError;
use crate::model::GatewayAddress;

/// Finds the gateway's current address.
pub trait Locate: Send + Sync {
    fn locate(&self) -> BoxFuture<'_, Result<GatewayAddress, CoreError>>;
}

/// Persists a newly learned gateway address (e.g. into a config file).
pub trait AddressStore: Send + Sync {
    fn persist(&self, address: &GatewayAddress) -> Result<(), CoreError>;
}

// ── MulticastLocator ─────────────────────────────────────────────────

/// Default [`Locate`]: one multicast discovery round per call.
#[derive(Debug, Clone)]
pub struct MulticastLocator {
    discoverer: Discoverer,
    timeout: Duration,
}

impl MulticastLocator {
    pub fn new(discoverer: Discoverer, timeout: Duration) -> Self {
        Self {
            discoverer,
            timeout,
        }
    }
}

impl Locate for MulticastLocator {
    fn locate(&self) -> BoxFuture<'_, Result<GatewayAddress, CoreError>> {
        Box::pin(async move {
            let found = self.discoverer.discover(self.timeout).await?;
            debug!(address = %found.address, serial = ?found.serial(), "gateway located");
            GatewayAddress::try_from(found.address)
        })
    }
}

// ── Background task ──────────────────────────────────────────────────

/// Re-check the gateway address every `period`. The first check happens
/// one period after start; the address was just resolved.
pub(crate) async fn reconcile_task(
    controller: Controller,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    result = controller.reconcile_once() => {
                        if let Err(e) = result {
                            warn!(error = %e, "address check failed, keeping current gateway");
                        }
                    }
                }
            }
        }
    }
    debug!("reconcile task exiting");
}
