//! # devsync-core
//!
//! Client-side synchronization core for remotely configured peripherals.
//!
//! This crate provides:
//! - Optimistic settings with timeout-based rollback and capability filters
//! - Compound settings validated against capability tables
//! - Attributes keyed by a dynamic set of supported keys
//! - Sequential multi-item tasks with weighted progress
//! - A component store that batches changes into single notifications
//!
//! This crate is intentionally runtime-agnostic and contains no async code.
//! Time comes from an injected [`Scheduler`]; tests drive a
//! [`ManualScheduler`] by hand.

pub mod component;
pub mod compound;
pub mod config;
pub mod keyed;
pub mod scheduler;
pub mod setting;
pub mod store;
pub mod task;

pub use component::{Component, ComponentCore};
pub use compound::{fit, CapabilityTable, CompoundSetting, Row};
pub use config::{ConfigError, SyncConfig, DEFAULT_ROLLBACK_TIMEOUT_MS};
pub use keyed::{KeyDomain, KeyError, KeyedAttribute};
pub use scheduler::{ManualScheduler, Scheduler, TimerHandle, TimerTask};
pub use setting::*;
pub use store::{ChangeKind, ComponentEvent, ComponentKey, ComponentStore, ObserverId};
pub use task::{Task, TaskState, TaskTracker, Weighted};
