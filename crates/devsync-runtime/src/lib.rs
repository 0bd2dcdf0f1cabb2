//! # devsync-runtime
//!
//! Runs devsync peripheral models on tokio.
//!
//! This crate provides:
//! - [`TokioScheduler`]: rollback timers on tokio's clock
//! - [`Timeline`]: one model driven by commands from any thread
//! - [`spawn_timeline`]: a timeline on its own thread and runtime
//!
//! Models are single-threaded, so everything runs on a tokio `LocalSet`.
//! Other threads reach the model only through a [`TimelineHandle`].
//!
//! Enable features based on target platform:
//! - `tokio-runtime` (default) - For Linux/desktop

pub mod config;
pub mod error;
#[cfg(feature = "tokio-runtime")]
pub mod scheduler;
#[cfg(feature = "tokio-runtime")]
pub mod timeline;

pub use config::{TimelineConfig, DEFAULT_CHANNEL_CAPACITY};
pub use error::RuntimeError;
#[cfg(feature = "tokio-runtime")]
pub use scheduler::TokioScheduler;
#[cfg(feature = "tokio-runtime")]
pub use timeline::{channel, spawn_timeline, Timeline, TimelineHandle};
