// ── Controller abstraction ──
//
// Lifecycle management for one gateway. Resolves its address, owns the
// event session (UDP listener + frame task + liveness probe), runs the
// address reconciler, and routes device commands through the registry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::{ArcSwap, ArcSwapOption};
use futures_util::StreamExt;
use meshgate_api::{Discoverer, EventListener, GatewayClient};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::liveness::{LivenessTracker, liveness_task, probe_once};
use crate::model::{Device, DeviceDefinition, DeviceKey, GatewayAddress};
use crate::reconcile::{AddressStore, Locate, MulticastLocator, reconcile_task};
use crate::store::DeviceRegistry;

// ── Session ──────────────────────────────────────────────────────

/// Tasks bound to one gateway address. Torn down as a unit.
struct Session {
    address: GatewayAddress,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Session {
    async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
        debug!(address = %self.address, "event session closed");
    }
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    registry: Arc<DeviceRegistry>,
    liveness: Arc<LivenessTracker>,
    address: ArcSwapOption<GatewayAddress>,
    locator: ArcSwap<Box<dyn Locate>>,
    address_store: ArcSwapOption<Box<dyn AddressStore>>,
    cancel: CancellationToken,
    session: Mutex<Option<Session>>,
    /// Controller-level tasks (the reconciler); sessions track their own.
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    /// Set while started: the reconciler must keep an event session open.
    session_wanted: AtomicBool,
}

impl Controller {
    /// Build a controller. Does NOT touch the network; call
    /// [`start()`](Self::start) or use [`oneshot()`](Self::oneshot).
    pub fn new(
        config: ControllerConfig,
        definitions: Vec<DeviceDefinition>,
    ) -> Result<Self, CoreError> {
        let registry = DeviceRegistry::new(&definitions)?.with_status_base(config.status_base);
        let locator: Box<dyn Locate> = Box::new(MulticastLocator::new(
            Discoverer::new().expected_serial(config.expected_serial.clone()),
            config.discovery_timeout,
        ));

        Ok(Self {
            inner: Arc::new(ControllerInner {
                liveness: Arc::new(LivenessTracker::new(config.failure_threshold)),
                config,
                registry: Arc::new(registry),
                address: ArcSwapOption::empty(),
                locator: ArcSwap::from_pointee(locator),
                address_store: ArcSwapOption::empty(),
                cancel: CancellationToken::new(),
                session: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
                session_wanted: AtomicBool::new(false),
            }),
        })
    }

    /// Replace the default multicast locator.
    pub fn with_locator(self, locator: impl Locate + 'static) -> Self {
        self.inner.locator.store(Arc::new(Box::new(locator)));
        self
    }

    /// Persist addresses learned by the reconciler.
    pub fn with_address_store(self, store: impl AddressStore + 'static) -> Self {
        self.inner.address_store.store(Some(Arc::new(Box::new(store))));
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.inner.registry
    }

    pub fn liveness(&self) -> &Arc<LivenessTracker> {
        &self.inner.liveness
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Resolve the gateway, open the event session and spawn the
    /// reconciler. A controller starts at most once.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.started.swap(true, Ordering::AcqRel) || self.inner.cancel.is_cancelled() {
            return Err(CoreError::AlreadyRunning);
        }
        if let Err(e) = self.launch().await {
            self.inner.started.store(false, Ordering::Release);
            return Err(e);
        }
        Ok(())
    }

    async fn launch(&self) -> Result<(), CoreError> {
        let address = self.resolve().await?;
        let session = self.open_session(address.clone()).await?;
        *self.inner.session.lock().await = Some(session);
        self.inner.session_wanted.store(true, Ordering::Release);

        let period = self.inner.config.address_check_interval;
        if !period.is_zero() {
            let ctrl = self.clone();
            let cancel = self.inner.cancel.child_token();
            self.inner
                .task_handles
                .lock()
                .await
                .push(tokio::spawn(reconcile_task(ctrl, period, cancel)));
        }

        info!(address = %address, devices = self.inner.registry.len(), "controller started");
        Ok(())
    }

    /// Cancel every task and wait for all of them. Idempotent.
    pub async fn stop(&self) {
        self.inner.session_wanted.store(false, Ordering::Release);
        self.inner.cancel.cancel();

        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        if let Some(session) = self.inner.session.lock().await.take() {
            session.shutdown().await;
        }
        debug!("controller stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.started.load(Ordering::Acquire) && !self.inner.cancel.is_cancelled()
    }

    /// Resolve the gateway address (configured host, else the locator)
    /// and install a client for it.
    pub async fn resolve(&self) -> Result<GatewayAddress, CoreError> {
        let address = match &self.inner.config.host {
            Some(host) => GatewayAddress::parse(host)?,
            None => self.inner.locator.load_full().locate().await?,
        };
        self.install_client(&address)?;
        Ok(address)
    }

    fn install_client(&self, address: &GatewayAddress) -> Result<(), CoreError> {
        let config = &self.inner.config;
        let client = GatewayClient::new(address.as_str(), config.command_port, &config.transport())?;
        self.inner.registry.set_client(client);
        self.inner.address.store(Some(Arc::new(address.clone())));
        Ok(())
    }

    async fn open_session(&self, address: GatewayAddress) -> Result<Session, CoreError> {
        let config = &self.inner.config;
        let cancel = self.inner.cancel.child_token();
        let bind = SocketAddr::new(config.event_bind, config.event_port);
        let listener = EventListener::bind(bind, config.listen_backoff)
            .await?
            .with_cancel_token(cancel.clone());

        let registry = Arc::clone(&self.inner.registry);
        let mut handles = vec![tokio::spawn(frame_task(
            Arc::clone(&registry),
            Arc::clone(&self.inner.liveness),
            listener,
        ))];

        // The first probe is also the initial status request.
        if config.ping_interval.is_zero() {
            probe_once(&registry, &self.inner.liveness).await;
        } else {
            handles.push(tokio::spawn(liveness_task(
                registry,
                Arc::clone(&self.inner.liveness),
                config.ping_interval,
                cancel.clone(),
            )));
        }

        info!(address = %address, event_port = config.event_port, "event session started");
        Ok(Session {
            address,
            cancel,
            handles,
        })
    }

    /// Re-locate the gateway once. Returns whether the address changed.
    ///
    /// On a change the running session (if any) is joined, the transport
    /// swapped, the address persisted, and a fresh session opened. A
    /// started controller whose session failed to reopen on an earlier
    /// call gets it reopened here even when the address is unchanged.
    pub async fn reconcile_once(&self) -> Result<bool, CoreError> {
        let located = self.inner.locator.load_full().locate().await?;

        let mut session = self.inner.session.lock().await;
        let wants_session =
            self.inner.session_wanted.load(Ordering::Acquire) && !self.inner.cancel.is_cancelled();
        if self.inner.address.load().as_deref() == Some(&located) {
            if wants_session && session.is_none() {
                warn!(address = %located, "event session missing, reopening");
                *session = Some(self.open_session(located).await?);
            } else {
                debug!(address = %located, "gateway address unchanged");
            }
            return Ok(false);
        }
        info!(
            previous = ?self.gateway_address().map(|a| a.to_string()),
            address = %located,
            "gateway address changed"
        );

        // The new session binds the same event port, so the old one goes first.
        if let Some(old) = session.take() {
            old.shutdown().await;
        }

        self.install_client(&located)?;
        if let Some(store) = self.inner.address_store.load_full() {
            if let Err(e) = store.persist(&located) {
                warn!(address = %located, error = %e, "failed to persist gateway address");
            }
        }

        if wants_session {
            *session = Some(self.open_session(located).await?);
        }
        Ok(true)
    }

    // ── One-shot convenience ─────────────────────────────────────

    /// One-shot: resolve the gateway, run closure, stop.
    ///
    /// No event session or background tasks; for single CLI commands.
    pub async fn oneshot<F, Fut, T>(
        config: ControllerConfig,
        definitions: Vec<DeviceDefinition>,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Controller) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let controller = Controller::new(config, definitions)?;
        controller.resolve().await?;
        let result = f(controller.clone()).await;
        controller.stop().await;
        result
    }

    // ── State observation ────────────────────────────────────────

    pub fn gateway_address(&self) -> Option<GatewayAddress> {
        self.inner.address.load_full().map(|a| (*a).clone())
    }

    /// Subscribe to the `connected` flag.
    pub fn connection_state(&self) -> watch::Receiver<bool> {
        self.inner.liveness.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.liveness.is_connected()
    }

    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.inner.registry.devices()
    }

    pub fn device(&self, key: &DeviceKey) -> Option<Arc<Device>> {
        self.inner.registry.get(key)
    }

    /// Look up by `board_sub` key or device name.
    pub fn find_device(&self, identifier: &str) -> Result<Arc<Device>, CoreError> {
        self.inner.registry.find(identifier)
    }

    // ── Commands (delegate to DeviceRegistry) ────────────────────

    /// Broadcast a status request; the gateway answers with `all` frames.
    pub async fn request_status(&self) -> Result<bool, CoreError> {
        let client = self
            .inner
            .registry
            .client()
            .ok_or_else(|| CoreError::ConnectionFailed {
                address: "<unresolved>".into(),
                reason: "no gateway address resolved yet".into(),
            })?;
        Ok(client.request_status().await?)
    }

    pub async fn turn_on(&self, key: &DeviceKey) -> Result<bool, CoreError> {
        self.inner.registry.turn_on(key).await
    }

    pub async fn turn_off(&self, key: &DeviceKey) -> Result<bool, CoreError> {
        self.inner.registry.turn_off(key).await
    }

    pub async fn set_speed(&self, key: &DeviceKey, level: u8) -> Result<bool, CoreError> {
        self.inner.registry.set_speed(key, level).await
    }

    pub async fn set_percentage(&self, key: &DeviceKey, pct: u8) -> Result<bool, CoreError> {
        self.inner.registry.set_percentage(key, pct).await
    }

    pub async fn set_state(&self, key: &DeviceKey, value: u8) -> Result<bool, CoreError> {
        self.inner.registry.set_state(key, value).await
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Apply frames in arrival order until the session's listener closes.
/// Every decoded frame also counts as proof the gateway is alive.
async fn frame_task(
    registry: Arc<DeviceRegistry>,
    liveness: Arc<LivenessTracker>,
    listener: EventListener,
) {
    let mut frames = std::pin::pin!(listener.into_stream());
    while let Some(frame) = frames.next().await {
        liveness.record_success();
        let changed = registry.apply_frame(&frame);
        debug!(board = %frame.board_id, changed, "frame applied");
    }
    debug!("frame task exiting");
}
