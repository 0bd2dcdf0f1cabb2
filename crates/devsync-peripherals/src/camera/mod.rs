//! Camera model.
//!
//! The camera switches between a recording and a photo mode, each with its
//! own compound setting. Exposure applies to both. Zoom is driven with
//! fire-and-forget commands and only reports its level back.

mod exposure;
mod photo;
mod recording;

pub use exposure::{Exposure, ExposureCapability, ExposureMode, ExposureSetting, Iso, ShutterSpeed};
pub use photo::{Photo, PhotoCapability, PhotoFileFormat, PhotoFormat, PhotoMode, PhotoSetting};
pub use recording::{
    Framerate, Recording, RecordingCapability, RecordingMode, RecordingSetting, Resolution,
};

use std::cell::Cell;
use std::rc::Rc;

use devsync_core::{
    AnyValue, Availability, BooleanSetting, Bounds, Component, ComponentCore, ComponentStore,
    EnumSet, EnumSetting, OptionalBooleanSetting, RangeSetting, Scheduler, SettingContext,
    SyncConfig,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CameraMode {
    Recording,
    Photo,
}

/// How a zoom control target is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZoomControlMode {
    /// Target is a zoom level.
    Level,
    /// Target is a signed velocity, as a fraction of the maximum speed.
    Velocity,
}

/// Commands the camera model sends to the peripheral.
pub trait CameraBackend {
    fn set_mode(&self, mode: CameraMode) -> bool;

    fn set_exposure(&self, exposure: &Exposure) -> bool;

    fn set_photo(&self, photo: &Photo) -> bool;

    fn set_recording(&self, recording: &Recording) -> bool;

    fn set_hdr(&self, enabled: bool) -> bool;

    fn set_white_balance_lock(&self, locked: bool) -> bool;

    fn set_max_zoom_speed(&self, speed: f64) -> bool;

    /// Move the zoom. No acknowledgment is expected.
    fn control_zoom(&self, mode: ZoomControlMode, target: f64);
}

/// A camera peripheral.
pub struct Camera {
    core: ComponentCore,
    backend: Rc<dyn CameraBackend>,
    mode: EnumSetting<CameraMode>,
    exposure: ExposureSetting,
    photo: PhotoSetting,
    recording: RecordingSetting,
    hdr: BooleanSetting,
    white_balance_lock: OptionalBooleanSetting,
    max_zoom_speed: RangeSetting<f64>,
    zoom_level: Cell<f64>,
    max_zoom_level: Cell<f64>,
}

impl Component for Camera {
    const NAME: &'static str = "camera";

    fn core(&self) -> &ComponentCore {
        &self.core
    }
}

impl Camera {
    /// Create an unpublished camera with nothing supported yet.
    pub fn new(
        store: &ComponentStore,
        scheduler: Rc<dyn Scheduler>,
        config: &SyncConfig,
        backend: Rc<dyn CameraBackend>,
    ) -> Rc<Self> {
        let core = ComponentCore::new::<Self>(store);
        let ctx = SettingContext::from_config(core.clone(), scheduler, config);

        let mode = {
            let backend = backend.clone();
            EnumSetting::new(&ctx, CameraMode::Recording, EnumSet::empty(), move |mode| {
                backend.set_mode(*mode)
            })
        };
        let exposure = {
            let backend = backend.clone();
            ExposureSetting::new(&ctx, move |exposure| backend.set_exposure(exposure))
        };
        let photo = {
            let backend = backend.clone();
            PhotoSetting::new(&ctx, move |photo| backend.set_photo(photo))
        };
        let recording = {
            let backend = backend.clone();
            RecordingSetting::new(&ctx, move |recording| backend.set_recording(recording))
        };
        let hdr = {
            let backend = backend.clone();
            BooleanSetting::new(&ctx, false, AnyValue, move |enabled| backend.set_hdr(*enabled))
        };
        let white_balance_lock = {
            let backend = backend.clone();
            OptionalBooleanSetting::new(&ctx, false, Availability(false), move |locked| {
                backend.set_white_balance_lock(*locked)
            })
        };
        let max_zoom_speed = {
            let backend = backend.clone();
            RangeSetting::new(&ctx, 0.0, Bounds::new(0.0, 0.0), move |speed| {
                backend.set_max_zoom_speed(*speed)
            })
        };

        Rc::new(Self {
            core,
            backend,
            mode,
            exposure,
            photo,
            recording,
            hdr,
            white_balance_lock,
            max_zoom_speed,
            zoom_level: Cell::new(1.0),
            max_zoom_level: Cell::new(1.0),
        })
    }

    pub fn mode(&self) -> &EnumSetting<CameraMode> {
        &self.mode
    }

    pub fn exposure(&self) -> &ExposureSetting {
        &self.exposure
    }

    pub fn photo(&self) -> &PhotoSetting {
        &self.photo
    }

    pub fn recording(&self) -> &RecordingSetting {
        &self.recording
    }

    pub fn hdr(&self) -> &BooleanSetting {
        &self.hdr
    }

    pub fn white_balance_lock(&self) -> &OptionalBooleanSetting {
        &self.white_balance_lock
    }

    pub fn max_zoom_speed(&self) -> &RangeSetting<f64> {
        &self.max_zoom_speed
    }

    /// Check if HDR can be used with the active mode and its settings.
    ///
    /// Derived from the observed settings and capabilities on every call.
    pub fn is_hdr_available(&self) -> bool {
        match self.mode.value() {
            CameraMode::Recording => self.recording.is_hdr_available(),
            CameraMode::Photo => self.photo.is_hdr_available(),
        }
    }

    /// Check if HDR is available and turned on.
    pub fn is_hdr_active(&self) -> bool {
        self.is_hdr_available() && self.hdr.is_enabled()
    }

    pub fn zoom_level(&self) -> f64 {
        self.zoom_level.get()
    }

    pub fn max_zoom_level(&self) -> f64 {
        self.max_zoom_level.get()
    }

    /// Drive the zoom towards `target`.
    ///
    /// Level targets are clamped to the supported range. Nothing is tracked:
    /// the camera reports the resulting level on its own.
    pub fn control_zoom(&self, mode: ZoomControlMode, target: f64) {
        let target = match mode {
            ZoomControlMode::Level => target.clamp(1.0, self.max_zoom_level.get().max(1.0)),
            ZoomControlMode::Velocity => target.clamp(-1.0, 1.0),
        };
        debug!(component = %self.core.key(), ?mode, zoom_target = target, "zoom control");
        self.backend.control_zoom(mode, target);
    }

    pub fn update_zoom_level(&self, level: f64) -> &Self {
        if self.zoom_level.replace(level) != level {
            self.core.mark_changed();
        }
        self
    }

    pub fn update_max_zoom_level(&self, level: f64) -> &Self {
        if self.max_zoom_level.replace(level) != level {
            self.core.mark_changed();
        }
        self
    }
}
