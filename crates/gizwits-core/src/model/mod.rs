// ── Domain model ──
//
// Device records as the gateway tracks them, independent of wire shapes.

mod bound_device;
mod sub_device;

pub use bound_device::{BindInfo, BoundDevice, DeviceType};
pub use sub_device::{SubDevice, SubDeviceCandidate};
