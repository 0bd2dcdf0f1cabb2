//! # devsync-peripherals
//!
//! Peripheral data models built on `devsync-core`.
//!
//! Each peripheral is a [`Component`](devsync_core::Component) holding
//! settings and read-only state, plus a backend trait through which user
//! requests reach the device. Backend implementations are injected at
//! construction; protocol decoding calls the `update_*` methods and then
//! `notify_updated`.

pub mod camera;
pub mod gimbal;
pub mod updater;
pub mod wifi;

pub use camera::{Camera, CameraBackend, CameraMode, ZoomControlMode};
pub use gimbal::{Axis, Gimbal, GimbalBackend, GimbalControlMode};
pub use updater::{FirmwareInfo, FirmwareUpdater, UpdaterBackend};
pub use wifi::{WifiAccessPoint, WifiBackend};
