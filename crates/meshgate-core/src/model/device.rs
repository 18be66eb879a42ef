// ── Device domain types ──
//
// A `Device` is one output (relay or fan regulator) on one bus board.
// Everything about it is fixed at construction except the current state,
// which is an atomic so the frame task and command callers can race freely.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CoreError;

/// Sub-address of button `n` is `n + 16`.
pub const BUTTON_SUB_ADDRESS_OFFSET: u16 = 16;

/// Fan speed ordinal → output percentage.
pub const FAN_SPEEDS: [u8; 5] = [0, 35, 50, 55, 100];

const SWITCH_ON: u8 = 1;
const FAN_FULL: u8 = 100;

/// Percentage for a fan speed ordinal, `None` outside `0..=4`.
pub fn speed_to_percentage(level: u8) -> Option<u8> {
    FAN_SPEEDS.get(usize::from(level)).copied()
}

/// Highest speed ordinal whose percentage does not exceed `pct`.
pub fn percentage_to_speed(pct: u8) -> u8 {
    (0u8..)
        .zip(FAN_SPEEDS)
        .filter(|&(_, p)| p <= pct)
        .map(|(level, _)| level)
        .last()
        .unwrap_or(0)
}

// ── DeviceClass ─────────────────────────────────────────────────────

/// What kind of output a device drives.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum DeviceClass {
    /// On/off relay; state is 0 or 1.
    #[serde(alias = "onoff")]
    #[strum(to_string = "switch", serialize = "onoff")]
    Switch,
    /// Dimmer-driven fan; state is a percentage.
    #[serde(alias = "dimmer")]
    #[strum(to_string = "fan", serialize = "dimmer")]
    Fan,
}

impl DeviceClass {
    pub fn on_state(self) -> u8 {
        match self {
            Self::Switch => SWITCH_ON,
            Self::Fan => FAN_FULL,
        }
    }

    pub fn max_state(self) -> u8 {
        self.on_state()
    }

    pub fn accepts(self, value: u8) -> bool {
        value <= self.max_state()
    }
}

// ── DeviceKey ───────────────────────────────────────────────────────

/// `(board, sub-address)` pair identifying one output.
///
/// Renders as `{board}_{sub}`, which is also the form [`FromStr`] accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey {
    pub board_id: String,
    pub sub_address: u16,
}

impl DeviceKey {
    pub fn new(board_id: impl Into<String>, sub_address: u16) -> Self {
        Self {
            board_id: board_id.into(),
            sub_address,
        }
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.board_id, self.sub_address)
    }
}

impl FromStr for DeviceKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let not_found = || CoreError::DeviceNotFound {
            identifier: s.to_owned(),
        };
        let (board, sub) = s.rsplit_once('_').ok_or_else(not_found)?;
        if board.is_empty() {
            return Err(not_found());
        }
        let sub_address = sub.parse().map_err(|_| not_found())?;
        Ok(Self::new(board, sub_address))
    }
}

// ── DeviceDefinition ────────────────────────────────────────────────

/// Static description of one device, as loaded from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDefinition {
    pub board_id: String,
    pub sub_address: u16,
    pub name: String,
    #[serde(default)]
    pub room: Option<String>,
    pub class: DeviceClass,
    #[serde(default)]
    pub initial_state: Option<u8>,
}

impl DeviceDefinition {
    pub fn new(
        board_id: impl Into<String>,
        sub_address: u16,
        name: impl Into<String>,
        class: DeviceClass,
    ) -> Self {
        Self {
            board_id: board_id.into(),
            sub_address,
            name: name.into(),
            room: None,
            class,
            initial_state: None,
        }
    }

    /// Define a device by its button number on the board.
    pub fn from_button(
        board_id: impl Into<String>,
        button: u16,
        name: impl Into<String>,
        class: DeviceClass,
    ) -> Result<Self, CoreError> {
        let sub_address = button
            .checked_add(BUTTON_SUB_ADDRESS_OFFSET)
            .ok_or_else(|| CoreError::Config {
                message: format!(
                    "button {button} is out of range (max {})",
                    u16::MAX - BUTTON_SUB_ADDRESS_OFFSET
                ),
            })?;
        Ok(Self::new(board_id, sub_address, name, class))
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    pub fn with_initial_state(mut self, state: u8) -> Self {
        self.initial_state = Some(state);
        self
    }

    pub fn key(&self) -> DeviceKey {
        DeviceKey::new(self.board_id.clone(), self.sub_address)
    }
}

// ── Observer ────────────────────────────────────────────────────────

/// Receives a device's state after every change.
///
/// Called synchronously from the frame task or a command caller; keep it
/// short and never block.
pub trait DeviceObserver: Send + Sync {
    fn on_state_changed(&self, device: &Device, state: u8);
}

impl<F> DeviceObserver for F
where
    F: Fn(&Device, u8) + Send + Sync,
{
    fn on_state_changed(&self, device: &Device, state: u8) {
        self(device, state);
    }
}

// ── Device ──────────────────────────────────────────────────────────

pub struct Device {
    key: DeviceKey,
    class: DeviceClass,
    name: String,
    room: Option<String>,
    state: AtomicU8,
    observer: ArcSwapOption<Box<dyn DeviceObserver>>,
}

impl Device {
    pub fn from_definition(def: &DeviceDefinition) -> Self {
        let initial = def.initial_state.unwrap_or(0).min(def.class.max_state());
        Self {
            key: def.key(),
            class: def.class,
            name: def.name.clone(),
            room: def.room.clone(),
            state: AtomicU8::new(initial),
            observer: ArcSwapOption::empty(),
        }
    }

    pub fn key(&self) -> &DeviceKey {
        &self.key
    }

    pub fn class(&self) -> DeviceClass {
        self.class
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn state(&self) -> u8 {
        self.state.load(Ordering::Acquire)
    }

    pub fn is_on(&self) -> bool {
        self.state() > 0
    }

    /// Current fan speed ordinal, `None` for switches.
    pub fn speed(&self) -> Option<u8> {
        match self.class {
            DeviceClass::Fan => Some(percentage_to_speed(self.state())),
            DeviceClass::Switch => None,
        }
    }

    /// Install the observer, replacing any previous one.
    pub fn set_observer(&self, observer: impl DeviceObserver + 'static) {
        self.observer.store(Some(Arc::new(Box::new(observer))));
    }

    pub fn clear_observer(&self) {
        self.observer.store(None);
    }

    /// Store `value`; notify the observer only if it differs from the
    /// previous state. Returns whether it changed.
    pub(crate) fn apply_state(&self, value: u8) -> bool {
        let previous = self.state.swap(value, Ordering::AcqRel);
        if previous == value {
            return false;
        }
        if let Some(observer) = self.observer.load_full() {
            observer.on_state_changed(self, value);
        }
        true
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("key", &self.key)
            .field("class", &self.class)
            .field("name", &self.name)
            .field("room", &self.room)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
