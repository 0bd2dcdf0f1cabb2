//! Wifi access point model.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::OnceLock;

use devsync_core::{
    CapabilityTable, Component, ComponentCore, ComponentStore, CompoundSetting, EnumSet,
    EnumSetting, Row, Scheduler, SettingContext, StringFormat, StringSetting, SyncConfig,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Printable ASCII, 1 to 32 characters.
const SSID_PATTERN: &str = r"^[\x20-\x7E]{1,32}$";

/// WPA passwords are 8 to 63 printable ASCII characters.
const PASSWORD_LEN: std::ops::RangeInclusive<usize> = 8..=63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Environment {
    Indoor,
    Outdoor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Band {
    #[serde(rename = "2.4GHz")]
    Band2_4Ghz,
    #[serde(rename = "5GHz")]
    Band5Ghz,
}

/// A wifi channel number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WifiChannel(pub u8);

impl WifiChannel {
    pub fn band(self) -> Band {
        if self.0 <= 14 {
            Band::Band2_4Ghz
        } else {
            Band::Band5Ghz
        }
    }
}

impl fmt::Display for WifiChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the channel is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionMode {
    Manual,
    AutoAnyBand,
    Auto2_4Ghz,
    Auto5Ghz,
}

/// Channel configuration, sent as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSelection {
    pub mode: SelectionMode,
    /// The channel in use. In automatic modes this is whatever the access
    /// point picked.
    pub channel: WifiChannel,
}

/// Channels the access point may use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelCapability {
    pub channels: BTreeSet<WifiChannel>,
}

impl ChannelCapability {
    fn has_band(&self, band: Band) -> bool {
        self.channels.iter().any(|channel| channel.band() == band)
    }
}

impl Row<ChannelSelection> for ChannelCapability {
    fn admits(&self, value: &ChannelSelection) -> bool {
        match value.mode {
            SelectionMode::Manual => self.channels.contains(&value.channel),
            SelectionMode::AutoAnyBand => !self.channels.is_empty(),
            SelectionMode::Auto2_4Ghz => self.has_band(Band::Band2_4Ghz),
            SelectionMode::Auto5Ghz => self.has_band(Band::Band5Ghz),
        }
    }
}

/// Channel compound setting.
pub struct ChannelSetting {
    inner: CompoundSetting<ChannelSelection, ChannelCapability>,
}

impl ChannelSetting {
    pub fn mode(&self) -> SelectionMode {
        self.inner.value().mode
    }

    pub fn channel(&self) -> WifiChannel {
        self.inner.value().channel
    }

    /// Channels available for manual selection.
    pub fn available_channels(&self) -> EnumSet<WifiChannel> {
        self.capabilities().collect(|_| true, |row| &row.channels)
    }

    /// Check if automatic selection can be restricted to `band`.
    pub fn can_auto_select_band(&self, band: Band) -> bool {
        self.capabilities().any(|row| row.has_band(band))
    }

    pub fn select_channel(&self, channel: WifiChannel) -> bool {
        self.inner.set_value(ChannelSelection {
            mode: SelectionMode::Manual,
            channel,
        })
    }

    /// Let the access point choose a channel in any band.
    pub fn auto_select(&self) -> bool {
        self.inner
            .modify(|selection| selection.mode = SelectionMode::AutoAnyBand)
    }

    /// Let the access point choose a channel in `band`.
    pub fn auto_select_band(&self, band: Band) -> bool {
        let mode = match band {
            Band::Band2_4Ghz => SelectionMode::Auto2_4Ghz,
            Band::Band5Ghz => SelectionMode::Auto5Ghz,
        };
        self.inner.modify(|selection| selection.mode = mode)
    }
}

impl Deref for ChannelSetting {
    type Target = CompoundSetting<ChannelSelection, ChannelCapability>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityMode {
    Open,
    Wpa2Secured,
    Wpa3Secured,
}

/// Security configuration, sent as a whole.
///
/// The access point never reports the password back, so confirmed values
/// carry `None`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Security {
    pub mode: SecurityMode,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl fmt::Debug for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Security")
            .field("mode", &self.mode)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Security modes the access point offers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityCapability {
    pub modes: BTreeSet<SecurityMode>,
}

impl Row<Security> for SecurityCapability {
    fn admits(&self, value: &Security) -> bool {
        if !self.modes.contains(&value.mode) {
            return false;
        }
        match (value.mode, value.password.as_deref()) {
            (SecurityMode::Open, password) => password.is_none(),
            (_, Some(password)) => is_valid_password(password),
            (_, None) => false,
        }
    }
}

fn is_valid_password(password: &str) -> bool {
    PASSWORD_LEN.contains(&password.len())
        && password.chars().all(|c| c.is_ascii() && !c.is_ascii_control())
}

/// Security compound setting.
pub struct SecuritySetting {
    inner: CompoundSetting<Security, SecurityCapability>,
}

impl SecuritySetting {
    pub fn mode(&self) -> SecurityMode {
        self.inner.value().mode
    }

    pub fn supported_modes(&self) -> EnumSet<SecurityMode> {
        self.capabilities().collect(|_| true, |row| &row.modes)
    }

    /// Open the access point to anyone.
    pub fn disable(&self) -> bool {
        self.inner.set_value(Security {
            mode: SecurityMode::Open,
            password: None,
        })
    }

    /// Secure the access point. Rejected if `mode` is not supported or the
    /// password is not acceptable for it.
    pub fn secure_with(&self, mode: SecurityMode, password: &str) -> bool {
        if mode == SecurityMode::Open {
            return false;
        }
        self.inner.set_value(Security {
            mode,
            password: Some(password.to_string()),
        })
    }
}

impl Deref for SecuritySetting {
    type Target = CompoundSetting<Security, SecurityCapability>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Commands the access point model sends to the peripheral.
pub trait WifiBackend {
    fn set_environment(&self, environment: Environment) -> bool;

    fn set_country(&self, country: &str) -> bool;

    fn set_ssid(&self, ssid: &str) -> bool;

    fn set_channel(&self, selection: &ChannelSelection) -> bool;

    fn set_security(&self, security: &Security) -> bool;
}

/// A wifi access point peripheral.
pub struct WifiAccessPoint {
    core: ComponentCore,
    environment: EnumSetting<Environment>,
    country: EnumSetting<String>,
    default_country_used: Cell<bool>,
    ssid: StringSetting,
    channel: ChannelSetting,
    security: SecuritySetting,
}

impl Component for WifiAccessPoint {
    const NAME: &'static str = "wifi_access_point";

    fn core(&self) -> &ComponentCore {
        &self.core
    }
}

impl WifiAccessPoint {
    /// Create an unpublished access point with nothing supported yet.
    pub fn new(
        store: &ComponentStore,
        scheduler: Rc<dyn Scheduler>,
        config: &SyncConfig,
        backend: Rc<dyn WifiBackend>,
    ) -> Rc<Self> {
        let core = ComponentCore::new::<Self>(store);
        let ctx = SettingContext::from_config(core.clone(), scheduler, config);

        let environment = {
            let backend = backend.clone();
            EnumSetting::new(&ctx, Environment::Outdoor, EnumSet::empty(), move |env| {
                backend.set_environment(*env)
            })
        };
        let country = {
            let backend = backend.clone();
            EnumSetting::new(&ctx, String::new(), EnumSet::empty(), move |country| {
                backend.set_country(country)
            })
        };
        let ssid = {
            let backend = backend.clone();
            StringSetting::new(&ctx, String::new(), ssid_format(), move |ssid| {
                backend.set_ssid(ssid)
            })
        };
        let channel = {
            let backend = backend.clone();
            let initial = ChannelSelection {
                mode: SelectionMode::Manual,
                channel: WifiChannel(1),
            };
            ChannelSetting {
                inner: CompoundSetting::new(&ctx, initial, CapabilityTable::empty(), move |sel| {
                    backend.set_channel(sel)
                }),
            }
        };
        let security = {
            let initial = Security {
                mode: SecurityMode::Open,
                password: None,
            };
            SecuritySetting {
                inner: CompoundSetting::new(
                    &ctx,
                    initial,
                    CapabilityTable::empty(),
                    move |security| backend.set_security(security),
                ),
            }
        };

        Rc::new(Self {
            core,
            environment,
            country,
            default_country_used: Cell::new(false),
            ssid,
            channel,
            security,
        })
    }

    pub fn environment(&self) -> &EnumSetting<Environment> {
        &self.environment
    }

    /// Country code setting, restricted to the codes the access point
    /// accepts.
    pub fn country(&self) -> &EnumSetting<String> {
        &self.country
    }

    /// Check if the access point fell back to its default country because
    /// none was set.
    pub fn is_default_country_used(&self) -> bool {
        self.default_country_used.get()
    }

    pub fn ssid(&self) -> &StringSetting {
        &self.ssid
    }

    pub fn channel(&self) -> &ChannelSetting {
        &self.channel
    }

    pub fn security(&self) -> &SecuritySetting {
        &self.security
    }

    pub fn update_default_country_used(&self, used: bool) -> &Self {
        if self.default_country_used.replace(used) != used {
            self.core.mark_changed();
        }
        self
    }
}

fn ssid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(SSID_PATTERN).expect("SSID pattern is a valid regex"))
}

fn ssid_format() -> StringFormat {
    StringFormat::any()
        .with_max_len(32)
        .with_pattern(ssid_pattern().clone())
}
