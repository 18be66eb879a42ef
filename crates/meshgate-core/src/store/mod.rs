// ── Device storage ──

mod registry;

pub use registry::DeviceRegistry;
