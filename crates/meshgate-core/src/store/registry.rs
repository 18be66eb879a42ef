// ── Device registry ──
//
// Owns every `Device` for the lifetime of the controller. Inbound frames
// are applied here; outbound commands go through the gateway client held
// in an `ArcSwapOption`, which the reconciler replaces when the gateway
// moves. Devices themselves are never rebuilt.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use meshgate_api::{FrameUpdate, GatewayClient, UpdateFrame};
use tracing::{debug, info, warn};

use crate::config::DEFAULT_STATUS_BASE;
use crate::error::CoreError;
use crate::model::{
    Device, DeviceClass, DeviceDefinition, DeviceKey, DeviceObserver, percentage_to_speed,
    speed_to_percentage,
};

pub struct DeviceRegistry {
    devices: DashMap<DeviceKey, Arc<Device>>,
    /// Definition order, for stable listings.
    order: Vec<DeviceKey>,
    client: ArcSwapOption<GatewayClient>,
    status_base: u16,
}

impl DeviceRegistry {
    /// Build a registry from definitions. Duplicate keys are a config error.
    pub fn new(definitions: &[DeviceDefinition]) -> Result<Self, CoreError> {
        let devices = DashMap::with_capacity(definitions.len());
        let mut order = Vec::with_capacity(definitions.len());
        for def in definitions {
            let key = def.key();
            if devices.contains_key(&key) {
                return Err(CoreError::Config {
                    message: format!("duplicate device {key} ({})", def.name),
                });
            }
            devices.insert(key.clone(), Arc::new(Device::from_definition(def)));
            order.push(key);
        }
        Ok(Self {
            devices,
            order,
            client: ArcSwapOption::empty(),
            status_base: DEFAULT_STATUS_BASE,
        })
    }

    /// Sub-address that receives status `0` of an `all` frame.
    pub fn with_status_base(mut self, status_base: u16) -> Self {
        self.status_base = status_base;
        self
    }

    // ── Lookup ───────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, key: &DeviceKey) -> Option<Arc<Device>> {
        self.devices.get(key).map(|d| Arc::clone(d.value()))
    }

    /// All devices in definition order.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.order.iter().filter_map(|k| self.get(k)).collect()
    }

    /// Resolve a `board_sub` key or a (case-insensitive) device name.
    pub fn find(&self, identifier: &str) -> Result<Arc<Device>, CoreError> {
        if let Some(device) = identifier
            .parse::<DeviceKey>()
            .ok()
            .and_then(|key| self.get(&key))
        {
            return Ok(device);
        }
        self.devices()
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(identifier))
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: identifier.to_owned(),
            })
    }

    fn require(&self, key: &DeviceKey) -> Result<Arc<Device>, CoreError> {
        self.get(key).ok_or_else(|| CoreError::DeviceNotFound {
            identifier: key.to_string(),
        })
    }

    pub fn observe(
        &self,
        key: &DeviceKey,
        observer: impl DeviceObserver + 'static,
    ) -> Result<(), CoreError> {
        self.require(key)?.set_observer(observer);
        Ok(())
    }

    // ── Gateway client ───────────────────────────────────────────────

    pub fn client(&self) -> Option<Arc<GatewayClient>> {
        self.client.load_full()
    }

    pub fn set_client(&self, client: GatewayClient) {
        self.client.store(Some(Arc::new(client)));
    }

    // ── Inbound frames ───────────────────────────────────────────────

    /// Apply a gateway frame. Returns how many devices changed state.
    pub fn apply_frame(&self, frame: &UpdateFrame) -> usize {
        match &frame.update {
            FrameUpdate::Single {
                sub_address,
                status,
            } => usize::from(self.apply(&frame.board_id, *sub_address, *status)),
            FrameUpdate::All { statuses } => (0u16..)
                .zip(statuses)
                .filter_map(|(i, status)| Some((self.status_base.checked_add(i)?, *status)))
                .filter(|&(sub, status)| self.apply(&frame.board_id, sub, status))
                .count(),
        }
    }

    fn apply(&self, board_id: &str, sub_address: u16, status: u8) -> bool {
        let key = DeviceKey::new(board_id, sub_address);
        let Some(device) = self.get(&key) else {
            debug!(board = board_id, sub_address, "frame for unknown device");
            return false;
        };
        let changed = device.apply_state(status);
        if changed {
            debug!(device = %key, state = status, "state updated from gateway");
        }
        changed
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn turn_on(&self, key: &DeviceKey) -> Result<bool, CoreError> {
        let device = self.require(key)?;
        self.drive(&device, device.class().on_state()).await
    }

    pub async fn turn_off(&self, key: &DeviceKey) -> Result<bool, CoreError> {
        let device = self.require(key)?;
        self.drive(&device, 0).await
    }

    /// Set a fan to speed ordinal `level` (0-4).
    pub async fn set_speed(&self, key: &DeviceKey, level: u8) -> Result<bool, CoreError> {
        let device = self.require(key)?;
        if device.class() != DeviceClass::Fan {
            return Err(unsupported("set_speed", device.class()));
        }
        let pct = speed_to_percentage(level).ok_or(CoreError::InvalidSpeed { level })?;
        self.drive(&device, pct).await
    }

    /// Set a fan by percentage, snapped down to the nearest speed.
    pub async fn set_percentage(&self, key: &DeviceKey, pct: u8) -> Result<bool, CoreError> {
        let device = self.require(key)?;
        if device.class() != DeviceClass::Fan {
            return Err(unsupported("set_percentage", device.class()));
        }
        if pct > 100 {
            return Err(CoreError::InvalidState {
                value: pct,
                class: device.class().to_string(),
            });
        }
        let level = percentage_to_speed(pct);
        let snapped = speed_to_percentage(level).unwrap_or(0);
        self.drive(&device, snapped).await
    }

    /// Set the raw output value: 0/1 for switches, 0-100 for fans.
    pub async fn set_state(&self, key: &DeviceKey, value: u8) -> Result<bool, CoreError> {
        let device = self.require(key)?;
        if !device.class().accepts(value) {
            return Err(CoreError::InvalidState {
                value,
                class: device.class().to_string(),
            });
        }
        self.drive(&device, value).await
    }

    /// Send `value` to the device unless it is already there.
    ///
    /// `Ok(true)` means the gateway accepted (or nothing needed sending);
    /// the state is updated optimistically and the observer notified.
    /// Gateway rejections and transport failures are logged and yield
    /// `Ok(false)` with the state untouched.
    async fn drive(&self, device: &Device, value: u8) -> Result<bool, CoreError> {
        if device.state() == value {
            debug!(device = %device.key(), state = value, "already in requested state");
            return Ok(true);
        }
        let client = self.client().ok_or_else(|| CoreError::ConnectionFailed {
            address: "<unresolved>".into(),
            reason: "no gateway address resolved yet".into(),
        })?;

        let key = device.key();
        match client.operate(&key.board_id, key.sub_address, value).await {
            Ok(true) => {
                info!(device = %key, state = value, "command accepted");
                device.apply_state(value);
                Ok(true)
            }
            Ok(false) => {
                warn!(device = %key, state = value, "gateway rejected command");
                Ok(false)
            }
            Err(e) => {
                warn!(device = %key, state = value, error = %e, "command failed");
                Ok(false)
            }
        }
    }
}

fn unsupported(operation: &str, class: DeviceClass) -> CoreError {
    CoreError::Unsupported {
        operation: operation.to_owned(),
        class: class.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;

    fn definitions() -> Vec<DeviceDefinition> {
        vec![
            DeviceDefinition::from_button("AA:BB", 1, "Lamp", DeviceClass::Switch).unwrap(),
            DeviceDefinition::from_button("AA:BB", 2, "Fan", DeviceClass::Fan).unwrap(),
            DeviceDefinition::from_button("AA:BB", 3, "Heater", DeviceClass::Switch)
                .unwrap()
                .with_initial_state(1),
        ]
    }

    fn counting(registry: &DeviceRegistry, key: &DeviceKey) -> Arc<AtomicUsize> {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        registry
            .observe(key, move |_: &Device, _: u8| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        calls
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut defs = definitions();
        defs.push(DeviceDefinition::new("AA:BB", 17, "Again", DeviceClass::Fan));
        assert!(matches!(DeviceRegistry::new(&defs), Err(CoreError::Config { .. })));
    }

    #[test]
    fn all_frame_updates_from_status_base() {
        let registry = DeviceRegistry::new(&definitions()).unwrap();
        let lamp = counting(&registry, &DeviceKey::new("AA:BB", 17));
        let fan = counting(&registry, &DeviceKey::new("AA:BB", 18));
        let heater = counting(&registry, &DeviceKey::new("AA:BB", 19));

        // Heater starts at 1, so only the fan changes.
        let changed = registry.apply_frame(&UpdateFrame::all("AA:BB", vec![0, 1, 1]));
        assert_eq!(changed, 1);
        assert_eq!(lamp.load(Ordering::SeqCst), 0);
        assert_eq!(fan.load(Ordering::SeqCst), 1);
        assert_eq!(heater.load(Ordering::SeqCst), 0);

        // Same snapshot again changes nothing.
        assert_eq!(registry.apply_frame(&UpdateFrame::all("AA:BB", vec![0, 1, 1])), 0);
        assert_eq!(fan.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn status_base_is_configurable() {
        let registry = DeviceRegistry::new(&definitions()).unwrap().with_status_base(16);
        registry.apply_frame(&UpdateFrame::all("AA:BB", vec![9, 1]));
        // Index 1 lands on sub-address 17.
        assert_eq!(registry.get(&DeviceKey::new("AA:BB", 17)).unwrap().state(), 1);
    }

    #[test]
    fn unknown_devices_are_ignored() {
        let registry = DeviceRegistry::new(&definitions()).unwrap();
        assert_eq!(registry.apply_frame(&UpdateFrame::single("CC:DD", 17, 1)), 0);
        assert_eq!(registry.apply_frame(&UpdateFrame::single("AA:BB", 40, 1)), 0);
        assert_eq!(registry.apply_frame(&UpdateFrame::single("AA:BB", 17, 1)), 1);
    }

    #[test]
    fn find_by_key_or_name() {
        let registry = DeviceRegistry::new(&definitions()).unwrap();
        assert_eq!(registry.find("AA:BB_18").unwrap().name(), "Fan");
        assert_eq!(registry.find("heater").unwrap().key().sub_address, 19);
        assert!(matches!(registry.find("Garage"), Err(CoreError::DeviceNotFound { .. })));
        assert_eq!(
            registry.devices().iter().map(|d| d.name()).collect::<Vec<_>>(),
            ["Lamp", "Fan", "Heater"]
        );
    }

    #[tokio::test]
    async fn validation_precedes_network() {
        // No client installed: reaching the network would be an error.
        let registry = DeviceRegistry::new(&definitions()).unwrap();
        let lamp = DeviceKey::new("AA:BB", 17);
        let fan = DeviceKey::new("AA:BB", 18);

        assert!(matches!(
            registry.set_speed(&fan, 5).await,
            Err(CoreError::InvalidSpeed { level: 5 })
        ));
        assert!(matches!(
            registry.set_state(&lamp, 2).await,
            Err(CoreError::InvalidState { value: 2, .. })
        ));
        assert!(matches!(
            registry.set_speed(&lamp, 1).await,
            Err(CoreError::Unsupported { .. })
        ));
    }

    #[tokio::test]
    async fn noop_skips_network() {
        let registry = DeviceRegistry::new(&definitions()).unwrap();
        assert!(registry.turn_off(&DeviceKey::new("AA:BB", 17)).await.unwrap());
        assert!(registry.turn_on(&DeviceKey::new("AA:BB", 19)).await.unwrap());
        assert!(registry.set_speed(&DeviceKey::new("AA:BB", 18), 0).await.unwrap());
    }

    #[tokio::test]
    async fn command_without_client_is_connection_error() {
        let registry = DeviceRegistry::new(&definitions()).unwrap();
        assert!(matches!(
            registry.turn_on(&DeviceKey::new("AA:BB", 17)).await,
            Err(CoreError::ConnectionFailed { .. })
        ));
    }
}
