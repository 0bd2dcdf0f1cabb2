//! Photo settings.

use std::collections::BTreeSet;
use std::ops::Deref;

use devsync_core::{fit, CapabilityTable, CompoundSetting, EnumSet, Row, SettingContext};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhotoMode {
    Single,
    Bracketing,
    Burst,
    TimeLapse,
    GpsLapse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhotoFormat {
    Rectilinear,
    FullFrame,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhotoFileFormat {
    Jpeg,
    Dng,
    DngAndJpeg,
}

/// Photo configuration, sent as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub mode: PhotoMode,
    pub format: PhotoFormat,
    pub file_format: PhotoFileFormat,
}

impl Default for Photo {
    fn default() -> Self {
        Self {
            mode: PhotoMode::Single,
            format: PhotoFormat::Rectilinear,
            file_format: PhotoFileFormat::Jpeg,
        }
    }
}

/// One family of photo combinations the camera accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhotoCapability {
    pub modes: BTreeSet<PhotoMode>,
    pub formats: BTreeSet<PhotoFormat>,
    pub file_formats: BTreeSet<PhotoFileFormat>,
    /// HDR can be enabled with these combinations.
    pub hdr_available: bool,
}

impl Row<Photo> for PhotoCapability {
    fn admits(&self, value: &Photo) -> bool {
        self.modes.contains(&value.mode)
            && self.formats.contains(&value.format)
            && self.file_formats.contains(&value.file_format)
    }
}

/// Photo compound setting.
///
/// The mode selects the legal formats, and the mode and format together
/// select the legal file formats.
pub struct PhotoSetting {
    inner: CompoundSetting<Photo, PhotoCapability>,
}

impl PhotoSetting {
    pub(crate) fn new<S>(ctx: &SettingContext, sender: S) -> Self
    where
        S: Fn(&Photo) -> bool + 'static,
    {
        Self {
            inner: CompoundSetting::new(ctx, Photo::default(), CapabilityTable::empty(), sender),
        }
    }

    pub fn mode(&self) -> PhotoMode {
        self.inner.value().mode
    }

    pub fn format(&self) -> PhotoFormat {
        self.inner.value().format
    }

    pub fn file_format(&self) -> PhotoFileFormat {
        self.inner.value().file_format
    }

    pub fn supported_modes(&self) -> EnumSet<PhotoMode> {
        self.capabilities().collect(|_| true, |row| &row.modes)
    }

    /// Formats legal in the current mode.
    pub fn supported_formats(&self) -> EnumSet<PhotoFormat> {
        legal_formats(&self.capabilities(), self.mode())
    }

    /// File formats legal with the current mode and format.
    pub fn supported_file_formats(&self) -> EnumSet<PhotoFileFormat> {
        let photo = self.inner.value();
        legal_file_formats(&self.capabilities(), photo.mode, photo.format)
    }

    /// Check if the observed combination supports HDR.
    pub fn is_hdr_available(&self) -> bool {
        let photo = self.inner.value();
        self.capabilities()
            .any(|row| row.hdr_available && row.admits(&photo))
    }

    /// Switch mode, adapting format and file format to what the new mode
    /// allows.
    pub fn set_mode(&self, mode: PhotoMode) -> bool {
        let table = self.capabilities();
        let current = self.inner.value();
        let fitted = fit(&current.format, &legal_formats(&table, mode)).and_then(|format| {
            fit(&current.file_format, &legal_file_formats(&table, mode, format)).map(
                |file_format| Photo {
                    mode,
                    format,
                    file_format,
                },
            )
        });
        fitted.map_or(false, |photo| self.inner.set_value(photo))
    }

    /// Change the format, adapting the file format. The format must be legal
    /// in the current mode.
    pub fn set_format(&self, format: PhotoFormat) -> bool {
        let table = self.capabilities();
        let current = self.inner.value();
        if !legal_formats(&table, current.mode).contains(&format) {
            return false;
        }
        fit(&current.file_format, &legal_file_formats(&table, current.mode, format))
            .map_or(false, |file_format| {
                self.inner.set_value(Photo {
                    format,
                    file_format,
                    ..current
                })
            })
    }

    pub fn set_file_format(&self, file_format: PhotoFileFormat) -> bool {
        self.inner.modify(|photo| photo.file_format = file_format)
    }

    /// Switch to single shot with the given format and file format.
    pub fn set_single_mode(&self, format: PhotoFormat, file_format: PhotoFileFormat) -> bool {
        self.inner.set_value(Photo {
            mode: PhotoMode::Single,
            format,
            file_format,
        })
    }
}

fn legal_formats(table: &CapabilityTable<PhotoCapability>, mode: PhotoMode) -> EnumSet<PhotoFormat> {
    table.collect(|row| row.modes.contains(&mode), |row| &row.formats)
}

fn legal_file_formats(
    table: &CapabilityTable<PhotoCapability>,
    mode: PhotoMode,
    format: PhotoFormat,
) -> EnumSet<PhotoFileFormat> {
    table.collect(
        |row| row.modes.contains(&mode) && row.formats.contains(&format),
        |row| &row.file_formats,
    )
}

impl Deref for PhotoSetting {
    type Target = CompoundSetting<Photo, PhotoCapability>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
