//! Firmware updater model: download and update tasks.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use devsync_core::{Component, ComponentStore, TaskState};
use devsync_peripherals::updater::{FirmwareInfo, FirmwareUpdater, UpdaterBackend};
use pretty_assertions::assert_eq;

#[derive(Default)]
struct FakeUpdater {
    refuse: Cell<bool>,
    calls: RefCell<Vec<String>>,
}

impl FakeUpdater {
    fn record(&self, call: String) -> bool {
        self.calls.borrow_mut().push(call);
        !self.refuse.get()
    }
}

fn versions(firmwares: &[FirmwareInfo]) -> String {
    firmwares
        .iter()
        .map(|firmware| firmware.version.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

impl UpdaterBackend for FakeUpdater {
    fn download(&self, firmwares: &[FirmwareInfo]) -> bool {
        self.record(format!("download {}", versions(firmwares)))
    }

    fn cancel_download(&self) -> bool {
        self.record("cancel download".to_string())
    }

    fn update(&self, firmwares: &[FirmwareInfo]) -> bool {
        self.record(format!("update {}", versions(firmwares)))
    }

    fn cancel_update(&self) -> bool {
        self.record("cancel update".to_string())
    }
}

struct Fixture {
    backend: Rc<FakeUpdater>,
    updater: Rc<FirmwareUpdater>,
    seen: Rc<RefCell<Vec<Option<(TaskState, u8)>>>>,
    _store: ComponentStore,
}

fn fixture() -> Fixture {
    let store = ComponentStore::new();
    let backend = Rc::new(FakeUpdater::default());
    let updater = FirmwareUpdater::new(&store, backend.clone());
    updater.update_downloadable(vec![
        FirmwareInfo::new("1.1.0", 300),
        FirmwareInfo::new("1.2.0", 100),
    ]);
    updater.clone().publish();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let reader = store.clone();
    store.register_observer(move |_| {
        let observed = reader.get::<FirmwareUpdater>().and_then(|updater| {
            let task = updater.download_task().current()?;
            Some((task.state(), task.total_progress()))
        });
        sink.borrow_mut().push(observed);
    });

    Fixture {
        backend,
        updater,
        seen,
        _store: store,
    }
}

#[test]
fn test_download_all_progress_is_weighted_by_size() {
    let f = fixture();
    let updater = &f.updater;
    let firmwares = updater.downloadable_firmwares();

    assert!(updater.download_all());
    updater.download_task().update_begin(firmwares);
    updater.download_task().update_progress(50);
    updater.notify_updated();
    updater.download_task().update_progress(100).update_continue();
    updater.download_task().update_progress(50);
    updater.notify_updated();

    assert_eq!(
        *f.seen.borrow(),
        vec![
            Some((TaskState::Pending, 0)),
            Some((TaskState::Running, 37)),
            Some((TaskState::Running, 87)),
        ]
    );
    assert_eq!(*f.backend.calls.borrow(), vec!["download 1.1.0,1.2.0"]);
}

#[test]
fn test_success_is_observed_before_the_task_goes_away() {
    let f = fixture();
    let updater = &f.updater;
    assert!(updater.download_next());

    updater
        .download_task()
        .update_begin(vec![FirmwareInfo::new("1.1.0", 300)]);
    updater.download_task().update_state(TaskState::Success);
    updater.notify_updated();
    updater.download_task().update_end();
    updater.update_applicable(vec![FirmwareInfo::new("1.1.0", 300)]);
    updater.notify_updated();

    assert_eq!(
        *f.seen.borrow(),
        vec![Some((TaskState::Pending, 0)), Some((TaskState::Success, 100)), None]
    );
    assert_eq!(updater.applicable_firmwares().len(), 1);
}

#[test]
fn test_cancel_download_waits_for_report() {
    let f = fixture();
    let updater = &f.updater;

    assert!(!updater.cancel_download());
    updater.download_all();
    assert!(updater.cancel_download());
    assert_eq!(updater.download_task().state(), Some(TaskState::Pending));

    updater.download_task().update_state(TaskState::Canceled);
    updater.notify_updated();
    assert!(!updater.download_task().is_active());
    assert_eq!(
        *f.backend.calls.borrow(),
        vec!["download 1.1.0,1.2.0", "cancel download"]
    );
}

#[test]
fn test_update_rejections() {
    let f = fixture();
    let updater = &f.updater;

    // Nothing applicable yet.
    assert!(!updater.update_all());

    updater.update_applicable(vec![FirmwareInfo::new("1.1.0", 300)]);
    updater.download_all();
    assert!(!updater.update_all());

    updater.download_task().update_state(TaskState::Failed);
    f.backend.refuse.set(true);
    assert!(!updater.update_all());
    assert!(updater.update_task().current().is_none());

    f.backend.refuse.set(false);
    assert!(updater.update_all());
    assert!(updater.cancel_update());
    assert_eq!(
        *f.backend.calls.borrow(),
        vec![
            "download 1.1.0,1.2.0",
            "update 1.1.0",
            "update 1.1.0",
            "cancel update"
        ]
    );
}
