//! Exposure settings.

use std::collections::BTreeSet;
use std::ops::Deref;

use devsync_core::{fit, CapabilityTable, CompoundSetting, EnumSet, Row, SettingContext};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExposureMode {
    Automatic,
    AutomaticPreferIso,
    AutomaticPreferShutterSpeed,
    ManualIso,
    ManualShutterSpeed,
    Manual,
}

impl ExposureMode {
    /// Check if the shutter speed is chosen by the user in this mode.
    pub fn uses_manual_shutter_speed(self) -> bool {
        matches!(self, Self::ManualShutterSpeed | Self::Manual)
    }

    /// Check if the ISO sensitivity is chosen by the user in this mode.
    pub fn uses_manual_iso(self) -> bool {
        matches!(self, Self::ManualIso | Self::Manual)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShutterSpeed {
    OneOver10000,
    OneOver2000,
    OneOver1000,
    OneOver500,
    OneOver240,
    OneOver100,
    OneOver60,
    OneOver30,
    OneOver15,
    One,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Iso {
    Iso50,
    Iso100,
    Iso200,
    Iso400,
    Iso800,
    Iso1600,
    Iso3200,
}

/// Exposure configuration, sent as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exposure {
    pub mode: ExposureMode,
    pub shutter_speed: ShutterSpeed,
    pub iso: Iso,
    /// Upper ISO limit used by the automatic modes.
    pub max_iso: Iso,
}

impl Default for Exposure {
    fn default() -> Self {
        Self {
            mode: ExposureMode::Automatic,
            shutter_speed: ShutterSpeed::OneOver100,
            iso: Iso::Iso100,
            max_iso: Iso::Iso3200,
        }
    }
}

/// Values the camera accepts for each exposure field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExposureCapability {
    pub modes: BTreeSet<ExposureMode>,
    pub shutter_speeds: BTreeSet<ShutterSpeed>,
    pub isos: BTreeSet<Iso>,
    pub max_isos: BTreeSet<Iso>,
}

impl Row<Exposure> for ExposureCapability {
    fn admits(&self, value: &Exposure) -> bool {
        self.modes.contains(&value.mode)
            && self.shutter_speeds.contains(&value.shutter_speed)
            && self.isos.contains(&value.iso)
            && self.max_isos.contains(&value.max_iso)
    }
}

/// Exposure compound setting.
pub struct ExposureSetting {
    inner: CompoundSetting<Exposure, ExposureCapability>,
}

impl ExposureSetting {
    pub(crate) fn new<S>(ctx: &SettingContext, sender: S) -> Self
    where
        S: Fn(&Exposure) -> bool + 'static,
    {
        Self {
            inner: CompoundSetting::new(
                ctx,
                Exposure::default(),
                CapabilityTable::empty(),
                sender,
            ),
        }
    }

    pub fn mode(&self) -> ExposureMode {
        self.inner.value().mode
    }

    pub fn shutter_speed(&self) -> ShutterSpeed {
        self.inner.value().shutter_speed
    }

    pub fn iso(&self) -> Iso {
        self.inner.value().iso
    }

    pub fn max_iso(&self) -> Iso {
        self.inner.value().max_iso
    }

    pub fn supported_modes(&self) -> EnumSet<ExposureMode> {
        self.capabilities().collect(|_| true, |row| &row.modes)
    }

    pub fn supported_shutter_speeds(&self) -> EnumSet<ShutterSpeed> {
        let mode = self.mode();
        self.capabilities()
            .collect(|row| row.modes.contains(&mode), |row| &row.shutter_speeds)
    }

    pub fn supported_isos(&self) -> EnumSet<Iso> {
        let mode = self.mode();
        self.capabilities()
            .collect(|row| row.modes.contains(&mode), |row| &row.isos)
    }

    pub fn supported_max_isos(&self) -> EnumSet<Iso> {
        let mode = self.mode();
        self.capabilities()
            .collect(|row| row.modes.contains(&mode), |row| &row.max_isos)
    }

    /// Switch mode, keeping the other fields when the new mode allows them.
    pub fn set_mode(&self, mode: ExposureMode) -> bool {
        fit_to_mode(&self.capabilities(), &self.inner.value(), mode)
            .map_or(false, |exposure| self.inner.set_value(exposure))
    }

    pub fn set_shutter_speed(&self, shutter_speed: ShutterSpeed) -> bool {
        self.inner.modify(|exposure| exposure.shutter_speed = shutter_speed)
    }

    pub fn set_iso(&self, iso: Iso) -> bool {
        self.inner.modify(|exposure| exposure.iso = iso)
    }

    pub fn set_max_iso(&self, max_iso: Iso) -> bool {
        self.inner.modify(|exposure| exposure.max_iso = max_iso)
    }

    /// Switch to full manual exposure with the given values.
    pub fn set_manual(&self, shutter_speed: ShutterSpeed, iso: Iso) -> bool {
        self.inner.modify(|exposure| {
            exposure.mode = ExposureMode::Manual;
            exposure.shutter_speed = shutter_speed;
            exposure.iso = iso;
        })
    }
}

/// Fit each field in turn, only among the rows that still allow the fields
/// already chosen, so the result always lies within a single row.
fn fit_to_mode(
    table: &CapabilityTable<ExposureCapability>,
    current: &Exposure,
    mode: ExposureMode,
) -> Option<Exposure> {
    let shutter_speed = fit(
        &current.shutter_speed,
        &table.collect(|row| row.modes.contains(&mode), |row| &row.shutter_speeds),
    )?;
    let iso = fit(
        &current.iso,
        &table.collect(
            |row| row.modes.contains(&mode) && row.shutter_speeds.contains(&shutter_speed),
            |row| &row.isos,
        ),
    )?;
    let max_iso = fit(
        &current.max_iso,
        &table.collect(
            |row| {
                row.modes.contains(&mode)
                    && row.shutter_speeds.contains(&shutter_speed)
                    && row.isos.contains(&iso)
            },
            |row| &row.max_isos,
        ),
    )?;
    Some(Exposure {
        mode,
        shutter_speed,
        iso,
        max_iso,
    })
}

impl Deref for ExposureSetting {
    type Target = CompoundSetting<Exposure, ExposureCapability>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
