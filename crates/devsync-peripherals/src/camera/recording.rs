//! Recording settings.

use std::collections::BTreeSet;
use std::ops::Deref;

use devsync_core::{fit, CapabilityTable, CompoundSetting, EnumSet, Row, SettingContext};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordingMode {
    Standard,
    Hyperlapse,
    SlowMotion,
    HighFramerate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    Res480p,
    Res720p,
    Res1080p,
    Res2160p,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Framerate {
    Fps24,
    Fps25,
    Fps30,
    Fps48,
    Fps60,
    Fps120,
    Fps240,
}

/// Recording configuration, sent as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub mode: RecordingMode,
    pub resolution: Resolution,
    pub framerate: Framerate,
}

impl Default for Recording {
    fn default() -> Self {
        Self {
            mode: RecordingMode::Standard,
            resolution: Resolution::Res1080p,
            framerate: Framerate::Fps30,
        }
    }
}

/// One family of recording combinations the camera accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingCapability {
    pub modes: BTreeSet<RecordingMode>,
    pub resolutions: BTreeSet<Resolution>,
    pub framerates: BTreeSet<Framerate>,
    /// HDR can be enabled with these combinations.
    pub hdr_available: bool,
}

impl Row<Recording> for RecordingCapability {
    fn admits(&self, value: &Recording) -> bool {
        self.modes.contains(&value.mode)
            && self.resolutions.contains(&value.resolution)
            && self.framerates.contains(&value.framerate)
    }
}

/// Recording compound setting.
///
/// The mode selects the legal resolutions, and the mode and resolution
/// together select the legal framerates.
pub struct RecordingSetting {
    inner: CompoundSetting<Recording, RecordingCapability>,
}

impl RecordingSetting {
    pub(crate) fn new<S>(ctx: &SettingContext, sender: S) -> Self
    where
        S: Fn(&Recording) -> bool + 'static,
    {
        Self {
            inner: CompoundSetting::new(
                ctx,
                Recording::default(),
                CapabilityTable::empty(),
                sender,
            ),
        }
    }

    pub fn mode(&self) -> RecordingMode {
        self.inner.value().mode
    }

    pub fn resolution(&self) -> Resolution {
        self.inner.value().resolution
    }

    pub fn framerate(&self) -> Framerate {
        self.inner.value().framerate
    }

    pub fn supported_modes(&self) -> EnumSet<RecordingMode> {
        self.capabilities().collect(|_| true, |row| &row.modes)
    }

    /// Resolutions legal in the current mode.
    pub fn supported_resolutions(&self) -> EnumSet<Resolution> {
        legal_resolutions(&self.capabilities(), self.mode())
    }

    /// Framerates legal with the current mode and resolution.
    pub fn supported_framerates(&self) -> EnumSet<Framerate> {
        let recording = self.inner.value();
        legal_framerates(&self.capabilities(), recording.mode, recording.resolution)
    }

    /// Check if the observed combination supports HDR.
    pub fn is_hdr_available(&self) -> bool {
        let recording = self.inner.value();
        self.capabilities()
            .any(|row| row.hdr_available && row.admits(&recording))
    }

    /// Switch mode, adapting resolution and framerate to what the new mode
    /// allows.
    pub fn set_mode(&self, mode: RecordingMode) -> bool {
        let table = self.capabilities();
        let current = self.inner.value();
        let fitted = fit(&current.resolution, &legal_resolutions(&table, mode)).and_then(
            |resolution| {
                fit(&current.framerate, &legal_framerates(&table, mode, resolution)).map(
                    |framerate| Recording {
                        mode,
                        resolution,
                        framerate,
                    },
                )
            },
        );
        fitted.map_or(false, |recording| self.inner.set_value(recording))
    }

    /// Change the resolution, adapting the framerate. The resolution must be
    /// legal in the current mode.
    pub fn set_resolution(&self, resolution: Resolution) -> bool {
        let table = self.capabilities();
        let current = self.inner.value();
        if !legal_resolutions(&table, current.mode).contains(&resolution) {
            return false;
        }
        fit(&current.framerate, &legal_framerates(&table, current.mode, resolution))
            .map_or(false, |framerate| {
                self.inner.set_value(Recording {
                    resolution,
                    framerate,
                    ..current
                })
            })
    }

    pub fn set_framerate(&self, framerate: Framerate) -> bool {
        self.inner.modify(|recording| recording.framerate = framerate)
    }

    /// Switch to standard recording with the given resolution and framerate.
    pub fn set_standard_mode(&self, resolution: Resolution, framerate: Framerate) -> bool {
        self.inner.set_value(Recording {
            mode: RecordingMode::Standard,
            resolution,
            framerate,
        })
    }
}

fn legal_resolutions(
    table: &CapabilityTable<RecordingCapability>,
    mode: RecordingMode,
) -> EnumSet<Resolution> {
    table.collect(|row| row.modes.contains(&mode), |row| &row.resolutions)
}

fn legal_framerates(
    table: &CapabilityTable<RecordingCapability>,
    mode: RecordingMode,
    resolution: Resolution,
) -> EnumSet<Framerate> {
    table.collect(
        |row| row.modes.contains(&mode) && row.resolutions.contains(&resolution),
        |row| &row.framerates,
    )
}

impl Deref for RecordingSetting {
    type Target = CompoundSetting<Recording, RecordingCapability>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
