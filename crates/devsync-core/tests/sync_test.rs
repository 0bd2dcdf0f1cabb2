//! End-to-end behavior of a small component built on the public API.
//!
//! The component mixes a plain enum setting, a boolean setting, a keyed
//! attribute and a task tracker so that batching and bulk cancellation are
//! exercised across setting kinds.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use devsync_core::{
    AnyValue, BooleanSetting, ChangeKind, Component, ComponentCore, ComponentStore, EnumSet,
    EnumSetting, KeyDomain, KeyedAttribute, ManualScheduler, SettingContext, SyncConfig,
    TaskState, TaskTracker, UpdateState, Weighted,
};
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Light {
    Off,
    Dim,
    Bright,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Zone {
    Front,
    Rear,
    Side,
}

#[derive(Debug, Clone, PartialEq)]
struct Package(u64);

impl Weighted for Package {
    fn weight(&self) -> u64 {
        self.0
    }
}

struct Lamp {
    core: ComponentCore,
    light: EnumSetting<Light>,
    blink: BooleanSetting,
    zones: KeyDomain<Zone>,
    levels: KeyedAttribute<Zone, u8>,
    install: TaskTracker<Package>,
}

impl Component for Lamp {
    const NAME: &'static str = "lamp";

    fn core(&self) -> &ComponentCore {
        &self.core
    }
}

struct Backend {
    accept: Cell<bool>,
    calls: RefCell<Vec<String>>,
}

impl Backend {
    fn record(&self, call: String) -> bool {
        self.calls.borrow_mut().push(call);
        self.accept.get()
    }
}

struct Harness {
    store: ComponentStore,
    scheduler: Rc<ManualScheduler>,
    backend: Rc<Backend>,
    lamp: Rc<Lamp>,
    changes: Rc<Cell<usize>>,
}

fn harness() -> Harness {
    let store = ComponentStore::new();
    let scheduler = Rc::new(ManualScheduler::new());
    let backend = Rc::new(Backend {
        accept: Cell::new(true),
        calls: RefCell::new(Vec::new()),
    });
    let config = SyncConfig::from_json(r#"{"rollbackOverrides": {"lamp": 2000}}"#).unwrap();

    let core = ComponentCore::new::<Lamp>(&store);
    let ctx = SettingContext::from_config(core.clone(), scheduler.clone(), &config);
    let zones = KeyDomain::new(&core);

    let light = {
        let backend = backend.clone();
        EnumSetting::new(
            &ctx,
            Light::Off,
            EnumSet::of([Light::Off, Light::Dim]),
            move |light| backend.record(format!("light {light:?}")),
        )
    };
    let blink = {
        let backend = backend.clone();
        BooleanSetting::new(&ctx, false, AnyValue, move |on| {
            backend.record(format!("blink {on}"))
        })
    };
    let lamp = Rc::new(Lamp {
        light,
        blink,
        levels: KeyedAttribute::new(&zones, "levels", |_| 0),
        zones,
        install: TaskTracker::new(&core, "install"),
        core,
    });

    let changes = Rc::new(Cell::new(0));
    let counter = changes.clone();
    store.register_observer(move |event| {
        if event.kind == ChangeKind::Changed {
            counter.set(counter.get() + 1);
        }
    });

    Harness {
        store,
        scheduler,
        backend,
        lamp,
        changes,
    }
}

#[test]
fn test_publish_then_unpublish_is_two_events() {
    let h = harness();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    h.store.register_observer(move |event| sink.borrow_mut().push(event.kind));

    h.lamp.light.update_value(Light::Dim);
    h.lamp.zones.update_keys([Zone::Front]);
    h.lamp.levels.update(&Zone::Front, 7);
    h.lamp.clone().publish();
    h.lamp.unpublish();

    assert_eq!(
        *events.borrow(),
        vec![ChangeKind::Published, ChangeKind::Unpublished]
    );
}

#[test]
fn test_rollback_scenario_uses_configured_timeout() {
    let h = harness();
    h.lamp.clone().publish();

    assert!(h.lamp.light.set_value(Light::Dim));
    assert_eq!(h.lamp.light.state(), UpdateState::Updating);
    assert_eq!(h.lamp.light.value(), Light::Dim);

    h.scheduler.advance(Duration::from_millis(1999));
    assert_eq!(h.lamp.light.value(), Light::Dim);

    h.scheduler.advance(Duration::from_millis(1));
    assert_eq!(h.lamp.light.state(), UpdateState::UpToDate);
    assert_eq!(h.lamp.light.value(), Light::Off);
    assert_eq!(h.changes.get(), 2);
}

#[test]
fn test_refused_request_changes_nothing() {
    let h = harness();
    h.lamp.clone().publish();
    h.backend.accept.set(false);

    assert!(!h.lamp.light.set_value(Light::Dim));
    assert_eq!(h.lamp.light.state(), UpdateState::UpToDate);
    assert_eq!(h.lamp.light.value(), Light::Off);
    assert_eq!(h.changes.get(), 0);
    assert_eq!(h.scheduler.pending_timers(), 0);
}

#[test]
fn test_mixed_batch_notifies_once() {
    let h = harness();
    h.lamp.clone().publish();

    h.lamp.light.update_value(Light::Off);
    h.lamp.blink.update_value(true);
    h.lamp.zones.update_keys([Zone::Front, Zone::Rear]);
    assert!(h.lamp.notify_updated());
    assert_eq!(h.changes.get(), 1);

    h.lamp.light.update_value(Light::Off);
    h.lamp.blink.update_value(true);
    assert!(!h.lamp.notify_updated());
    assert_eq!(h.changes.get(), 1);
}

#[test]
fn test_bulk_cancel_resolves_every_pending_setting() {
    let h = harness();
    h.lamp.clone().publish();

    h.lamp.light.set_value(Light::Dim);
    h.lamp.blink.set_value(true);
    assert_eq!(h.changes.get(), 2);

    h.lamp.cancel_settings_rollbacks();
    assert_eq!(h.changes.get(), 3);
    assert_eq!(h.lamp.light.confirmed_value(), Light::Dim);
    assert!(h.lamp.blink.confirmed_value());

    h.scheduler.advance(Duration::from_secs(10));
    assert_eq!(h.lamp.light.value(), Light::Dim);
    assert!(h.lamp.blink.value());
    assert_eq!(h.changes.get(), 3);
}

#[test]
fn test_unpublish_cancels_timers_and_silences_updates() {
    let h = harness();
    h.lamp.clone().publish();
    h.lamp.light.set_value(Light::Dim);
    assert_eq!(h.scheduler.pending_timers(), 1);

    h.lamp.unpublish();
    assert_eq!(h.scheduler.pending_timers(), 0);

    h.lamp.blink.update_value(true);
    assert!(!h.lamp.notify_updated());
    assert_eq!(h.changes.get(), 1);
    assert!(h.store.is_empty());
}

#[test]
fn test_keyed_levels_follow_zone_domain() {
    let h = harness();
    h.lamp.zones.update_keys([Zone::Front, Zone::Rear, Zone::Side]);
    h.lamp.levels.update(&Zone::Front, 3).update(&Zone::Rear, 9);

    h.lamp.zones.update_keys([Zone::Front]);
    h.lamp.zones.update_keys([Zone::Front, Zone::Rear]);

    assert_eq!(h.lamp.levels.get(&Zone::Front), 3);
    assert_eq!(h.lamp.levels.get(&Zone::Rear), 0);
    assert!(h.lamp.levels.try_get(&Zone::Side).is_err());
}

#[test]
fn test_install_task_lifecycle() {
    let h = harness();
    h.lamp.clone().publish();
    let packages = vec![Package(100), Package(100)];

    let backend = h.backend.clone();
    assert!(h
        .lamp
        .install
        .start(packages.clone(), |items| backend.record(format!("install {}", items.len()))));

    h.lamp.install.update_begin(packages);
    h.lamp.install.update_progress(100);
    h.lamp.install.update_continue();
    h.lamp.install.update_progress(50);
    h.lamp.notify_updated();
    assert_eq!(h.lamp.install.total_progress(), Some(75));

    h.lamp.install.update_state(TaskState::Failed);
    h.lamp.notify_updated();
    assert_eq!(h.lamp.install.state(), Some(TaskState::Failed));

    h.lamp.install.update_end();
    h.lamp.notify_updated();
    assert!(h.lamp.install.current().is_none());
    assert_eq!(h.changes.get(), 4);
    assert_eq!(*h.backend.calls.borrow(), vec!["install 2".to_string()]);
}
