//! Gimbal model.
//!
//! Every per-axis attribute is keyed by the axes the gimbal reports as
//! supported. Offset correction has its own, usually smaller, axis set.

use std::rc::Rc;

use devsync_core::{
    AnyValue, BooleanSetting, Bounds, Component, ComponentCore, ComponentStore, KeyDomain,
    KeyedAttribute, RangeSetting, Scheduler, SettingContext, SyncConfig,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Axis {
    Yaw,
    Pitch,
    Roll,
}

/// How attitude control targets are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GimbalControlMode {
    /// Targets are angles, in degrees.
    Position,
    /// Targets are signed fractions of the axis max speed.
    Velocity,
}

/// Commands the gimbal model sends to the peripheral.
pub trait GimbalBackend {
    fn set_max_speed(&self, axis: Axis, speed: f64) -> bool;

    fn set_stabilization(&self, axis: Axis, stabilized: bool) -> bool;

    fn set_offset(&self, axis: Axis, offset: f64) -> bool;

    /// Move the gimbal. Axes without a target are left alone. No
    /// acknowledgment is expected.
    fn control(
        &self,
        mode: GimbalControlMode,
        yaw: Option<f64>,
        pitch: Option<f64>,
        roll: Option<f64>,
    );
}

/// A gimbal peripheral.
pub struct Gimbal {
    core: ComponentCore,
    backend: Rc<dyn GimbalBackend>,
    axes: KeyDomain<Axis>,
    attitude_bounds: KeyedAttribute<Axis, Bounds<f64>>,
    max_speeds: KeyedAttribute<Axis, RangeSetting<f64>>,
    stabilization: KeyedAttribute<Axis, BooleanSetting>,
    locked: KeyedAttribute<Axis, bool>,
    absolute_attitude: KeyedAttribute<Axis, f64>,
    relative_attitude: KeyedAttribute<Axis, f64>,
    correctable_axes: KeyDomain<Axis>,
    offsets: KeyedAttribute<Axis, RangeSetting<f64>>,
}

impl Component for Gimbal {
    const NAME: &'static str = "gimbal";

    fn core(&self) -> &ComponentCore {
        &self.core
    }
}

impl Gimbal {
    /// Create an unpublished gimbal with no supported axis.
    pub fn new(
        store: &ComponentStore,
        scheduler: Rc<dyn Scheduler>,
        config: &SyncConfig,
        backend: Rc<dyn GimbalBackend>,
    ) -> Rc<Self> {
        let core = ComponentCore::new::<Self>(store);
        let ctx = SettingContext::from_config(core.clone(), scheduler, config);
        let axes = KeyDomain::new(&core);
        let correctable_axes = KeyDomain::new(&core);

        let max_speeds = {
            let ctx = ctx.clone();
            let backend = backend.clone();
            KeyedAttribute::new(&axes, "max_speed", move |axis: &Axis| {
                let backend = backend.clone();
                let axis = *axis;
                RangeSetting::new(&ctx, 0.0, Bounds::new(0.0, 0.0), move |speed| {
                    backend.set_max_speed(axis, *speed)
                })
            })
        };
        let stabilization = {
            let ctx = ctx.clone();
            let backend = backend.clone();
            KeyedAttribute::new(&axes, "stabilization", move |axis: &Axis| {
                let backend = backend.clone();
                let axis = *axis;
                BooleanSetting::new(&ctx, false, AnyValue, move |stabilized| {
                    backend.set_stabilization(axis, *stabilized)
                })
            })
        };
        let offsets = {
            let backend = backend.clone();
            KeyedAttribute::new(&correctable_axes, "offset", move |axis: &Axis| {
                let backend = backend.clone();
                let axis = *axis;
                RangeSetting::new(&ctx, 0.0, Bounds::new(0.0, 0.0), move |offset| {
                    backend.set_offset(axis, *offset)
                })
            })
        };

        Rc::new(Self {
            attitude_bounds: KeyedAttribute::new(&axes, "attitude_bounds", |_| {
                Bounds::new(0.0, 0.0)
            }),
            locked: KeyedAttribute::new(&axes, "locked", |_| false),
            absolute_attitude: KeyedAttribute::new(&axes, "absolute_attitude", |_| 0.0),
            relative_attitude: KeyedAttribute::new(&axes, "relative_attitude", |_| 0.0),
            max_speeds,
            stabilization,
            offsets,
            axes,
            correctable_axes,
            backend,
            core,
        })
    }

    pub fn supported_axes(&self) -> &KeyDomain<Axis> {
        &self.axes
    }

    pub fn correctable_axes(&self) -> &KeyDomain<Axis> {
        &self.correctable_axes
    }

    /// Attitude range of `axis`. Panics if `axis` is not supported.
    pub fn attitude_bounds(&self, axis: Axis) -> Bounds<f64> {
        self.attitude_bounds.get(&axis)
    }

    /// Max speed setting of `axis`. Panics if `axis` is not supported.
    pub fn max_speed(&self, axis: Axis) -> RangeSetting<f64> {
        self.max_speeds.get(&axis)
    }

    /// Stabilization setting of `axis`. Panics if `axis` is not supported.
    pub fn stabilization(&self, axis: Axis) -> BooleanSetting {
        self.stabilization.get(&axis)
    }

    /// Check if `axis` is locked. Panics if `axis` is not supported.
    pub fn is_locked(&self, axis: Axis) -> bool {
        self.locked.get(&axis)
    }

    /// Attitude of `axis` relative to the earth. Panics if `axis` is not
    /// supported.
    pub fn absolute_attitude(&self, axis: Axis) -> f64 {
        self.absolute_attitude.get(&axis)
    }

    /// Attitude of `axis` relative to the airframe. Panics if `axis` is not
    /// supported.
    pub fn relative_attitude(&self, axis: Axis) -> f64 {
        self.relative_attitude.get(&axis)
    }

    /// Offset correction of `axis`. Panics if `axis` is not correctable.
    pub fn offset(&self, axis: Axis) -> RangeSetting<f64> {
        self.offsets.get(&axis)
    }

    /// Move the gimbal. Targets for unsupported axes are dropped.
    pub fn control(
        &self,
        mode: GimbalControlMode,
        yaw: Option<f64>,
        pitch: Option<f64>,
        roll: Option<f64>,
    ) {
        let supported =
            |axis: Axis, target: Option<f64>| target.filter(|_| self.axes.contains(&axis));
        let (yaw, pitch, roll) = (
            supported(Axis::Yaw, yaw),
            supported(Axis::Pitch, pitch),
            supported(Axis::Roll, roll),
        );
        if yaw.is_none() && pitch.is_none() && roll.is_none() {
            debug!(component = %self.core.key(), "control with no supported target");
            return;
        }
        self.backend.control(mode, yaw, pitch, roll);
    }

    pub fn update_supported_axes(&self, axes: impl IntoIterator<Item = Axis>) -> &Self {
        self.axes.update_keys(axes);
        self
    }

    pub fn update_correctable_axes(&self, axes: impl IntoIterator<Item = Axis>) -> &Self {
        self.correctable_axes.update_keys(axes);
        self
    }

    pub fn update_attitude_bounds(&self, axis: Axis, min: f64, max: f64) -> &Self {
        self.attitude_bounds.update(&axis, Bounds::new(min, max));
        self
    }

    pub fn update_max_speed(&self, axis: Axis, min: f64, value: f64, max: f64) -> &Self {
        match self.max_speeds.try_get(&axis) {
            Ok(speed) => {
                speed.update_bounds(min, max).update_value(value);
            }
            Err(err) => warn!(%err, "ignoring max speed"),
        }
        self
    }

    pub fn update_stabilization(&self, axis: Axis, stabilized: bool) -> &Self {
        match self.stabilization.try_get(&axis) {
            Ok(setting) => {
                setting.update_value(stabilized);
            }
            Err(err) => warn!(%err, "ignoring stabilization"),
        }
        self
    }

    pub fn update_offset(&self, axis: Axis, min: f64, value: f64, max: f64) -> &Self {
        match self.offsets.try_get(&axis) {
            Ok(offset) => {
                offset.update_bounds(min, max).update_value(value);
            }
            Err(err) => warn!(%err, "ignoring offset"),
        }
        self
    }

    pub fn update_locked(&self, axis: Axis, locked: bool) -> &Self {
        self.locked.update(&axis, locked);
        self
    }

    pub fn update_attitude(&self, axis: Axis, absolute: f64, relative: f64) -> &Self {
        self.absolute_attitude.update(&axis, absolute);
        self.relative_attitude.update(&axis, relative);
        self
    }
}
