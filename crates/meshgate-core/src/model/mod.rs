// ── Domain model ──

pub mod address;
pub mod device;

pub use address::GatewayAddress;
pub use device::{
    BUTTON_SUB_ADDRESS_OFFSET, Device, DeviceClass, DeviceDefinition, DeviceKey, DeviceObserver,
    FAN_SPEEDS, percentage_to_speed, speed_to_percentage,
};
