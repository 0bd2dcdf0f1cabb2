//! Firmware updater model.
//!
//! Firmwares are downloaded to the controlling device first, then applied
//! to the peripheral. Both steps are sequential tasks over a list of
//! firmwares, oldest first.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use devsync_core::{Component, ComponentCore, ComponentStore, TaskTracker, Weighted};
use serde::{Deserialize, Serialize};

/// A firmware version and its size in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareInfo {
    pub version: String,
    pub size: u64,
}

impl FirmwareInfo {
    pub fn new(version: impl Into<String>, size: u64) -> Self {
        Self {
            version: version.into(),
            size,
        }
    }
}

impl fmt::Display for FirmwareInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.version, self.size)
    }
}

impl Weighted for FirmwareInfo {
    fn weight(&self) -> u64 {
        self.size
    }
}

/// Commands the updater model sends to the peripheral.
pub trait UpdaterBackend {
    fn download(&self, firmwares: &[FirmwareInfo]) -> bool;

    fn cancel_download(&self) -> bool;

    fn update(&self, firmwares: &[FirmwareInfo]) -> bool;

    fn cancel_update(&self) -> bool;
}

/// A firmware updater.
pub struct FirmwareUpdater {
    core: ComponentCore,
    backend: Rc<dyn UpdaterBackend>,
    downloadable: RefCell<Vec<FirmwareInfo>>,
    applicable: RefCell<Vec<FirmwareInfo>>,
    download: TaskTracker<FirmwareInfo>,
    update: TaskTracker<FirmwareInfo>,
}

impl Component for FirmwareUpdater {
    const NAME: &'static str = "firmware_updater";

    fn core(&self) -> &ComponentCore {
        &self.core
    }
}

impl FirmwareUpdater {
    /// Create an unpublished updater with nothing to download or apply.
    pub fn new(store: &ComponentStore, backend: Rc<dyn UpdaterBackend>) -> Rc<Self> {
        let core = ComponentCore::new::<Self>(store);
        Rc::new(Self {
            download: TaskTracker::new(&core, "download"),
            update: TaskTracker::new(&core, "update"),
            downloadable: RefCell::new(Vec::new()),
            applicable: RefCell::new(Vec::new()),
            backend,
            core,
        })
    }

    /// Firmwares available for download, oldest first.
    pub fn downloadable_firmwares(&self) -> Vec<FirmwareInfo> {
        self.downloadable.borrow().clone()
    }

    /// Downloaded firmwares that can be applied, oldest first.
    pub fn applicable_firmwares(&self) -> Vec<FirmwareInfo> {
        self.applicable.borrow().clone()
    }

    /// Download task, for progress and state.
    pub fn download_task(&self) -> &TaskTracker<FirmwareInfo> {
        &self.download
    }

    /// Update task, for progress and state.
    pub fn update_task(&self) -> &TaskTracker<FirmwareInfo> {
        &self.update
    }

    /// Download the next downloadable firmware only.
    pub fn download_next(&self) -> bool {
        let next: Vec<FirmwareInfo> = self.downloadable.borrow().iter().take(1).cloned().collect();
        self.start_download(next)
    }

    /// Download every downloadable firmware.
    pub fn download_all(&self) -> bool {
        self.start_download(self.downloadable_firmwares())
    }

    pub fn cancel_download(&self) -> bool {
        self.download.cancel(|| self.backend.cancel_download())
    }

    /// Apply the next applicable firmware only.
    pub fn update_next(&self) -> bool {
        let next: Vec<FirmwareInfo> = self.applicable.borrow().iter().take(1).cloned().collect();
        self.start_update(next)
    }

    /// Apply every applicable firmware, in order.
    pub fn update_all(&self) -> bool {
        self.start_update(self.applicable_firmwares())
    }

    pub fn cancel_update(&self) -> bool {
        self.update.cancel(|| self.backend.cancel_update())
    }

    pub fn update_downloadable(&self, firmwares: Vec<FirmwareInfo>) -> &Self {
        replace_list(&self.core, &self.downloadable, firmwares);
        self
    }

    pub fn update_applicable(&self, firmwares: Vec<FirmwareInfo>) -> &Self {
        replace_list(&self.core, &self.applicable, firmwares);
        self
    }

    fn start_download(&self, firmwares: Vec<FirmwareInfo>) -> bool {
        // A download and an update never run side by side.
        if self.update.is_active() {
            return false;
        }
        self.download
            .start(firmwares, |firmwares| self.backend.download(firmwares))
    }

    fn start_update(&self, firmwares: Vec<FirmwareInfo>) -> bool {
        if self.download.is_active() {
            return false;
        }
        self.update
            .start(firmwares, |firmwares| self.backend.update(firmwares))
    }
}

fn replace_list(core: &ComponentCore, list: &RefCell<Vec<FirmwareInfo>>, firmwares: Vec<FirmwareInfo>) {
    let mut list = list.borrow_mut();
    if *list != firmwares {
        *list = firmwares;
        core.mark_changed();
    }
}
