//! Domain layer between `meshgate-api` and its consumers (CLI, host glue).
//!
//! - **[`Controller`]**: lifecycle facade. [`start()`](Controller::start)
//!   resolves the gateway, opens an event session (UDP listener, frame task,
//!   liveness probe) and spawns the address reconciler.
//!   [`Controller::oneshot()`] resolves the gateway and runs one closure
//!   with no background tasks, for single CLI invocations.
//!
//! - **[`DeviceRegistry`]**: owns every [`Device`], applies inbound frames,
//!   and drives outputs through the current gateway client, which it holds
//!   behind an `ArcSwap` so the reconciler can replace it in place.
//!
//! - **[`LivenessTracker`]**: consecutive-failure counter feeding a
//!   `watch` channel of the `connected` flag.
//!
//! - **[`Locate`] / [`AddressStore`]**: seams for gateway location and
//!   address persistence; the defaults use multicast discovery and no
//!   persistence.

pub mod config;
pub mod controller;
pub mod error;
pub mod liveness;
pub mod model;
pub mod reconcile;
pub mod store;

pub use config::ControllerConfig;
pub use controller::Controller;
pub use error::CoreError;
pub use liveness::LivenessTracker;
pub use model::{
    BUTTON_SUB_ADDRESS_OFFSET, Device, DeviceClass, DeviceDefinition, DeviceKey, DeviceObserver,
    FAN_SPEEDS, GatewayAddress, percentage_to_speed, speed_to_percentage,
};
pub use reconcile::{AddressStore, Locate, MulticastLocator};
pub use store::DeviceRegistry;

// Wire types consumers commonly need alongside the domain layer.
pub use meshgate_api::{FrameUpdate, UpdateFrame};
