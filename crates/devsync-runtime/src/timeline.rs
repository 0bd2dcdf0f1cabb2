//! Serialized timeline for a peripheral model.
//!
//! A model built on `devsync-core` is single-threaded: settings, timers and
//! observers all share `Rc` state. The timeline owns the model on one
//! `LocalSet` and applies commands sent from any thread, one at a time, in
//! submission order. Rollback timers run on the same `LocalSet`, so a timer
//! never interleaves with a command.

use std::rc::Rc;
use std::thread;

use devsync_core::Scheduler;
use tokio::sync::{mpsc, oneshot};
use tokio::task::LocalSet;
use tracing::{debug, info};

use crate::config::TimelineConfig;
use crate::error::RuntimeError;
use crate::scheduler::TokioScheduler;

type Command<S> = Box<dyn FnOnce(&S) + Send + 'static>;

/// Sending side of a timeline. Cheap to clone; the timeline stops once
/// every handle is dropped.
pub struct TimelineHandle<S> {
    tx: mpsc::Sender<Command<S>>,
}

impl<S> Clone for TimelineHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: 'static> TimelineHandle<S> {
    /// Queue `command` for the model, waiting for room in the channel.
    pub async fn submit<F>(&self, command: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(&S) + Send + 'static,
    {
        self.tx
            .send(Box::new(command))
            .await
            .map_err(|_| RuntimeError::Closed)
    }

    /// Queue `command` from synchronous code.
    ///
    /// Panics if called from inside an async context, like
    /// [`mpsc::Sender::blocking_send`].
    pub fn blocking_submit<F>(&self, command: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(&S) + Send + 'static,
    {
        self.tx
            .blocking_send(Box::new(command))
            .map_err(|_| RuntimeError::Closed)
    }

    /// Run `read` on the model and wait for its result.
    pub async fn query<F, R>(&self, read: F) -> Result<R, RuntimeError>
    where
        F: FnOnce(&S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(move |model| {
            let _ = reply_tx.send(read(model));
        })
        .await?;
        reply_rx.await.map_err(|_| RuntimeError::ReplyDropped)
    }

    /// Synchronous [`query`](Self::query).
    pub fn blocking_query<F, R>(&self, read: F) -> Result<R, RuntimeError>
    where
        F: FnOnce(&S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.blocking_submit(move |model| {
            let _ = reply_tx.send(read(model));
        })?;
        reply_rx
            .blocking_recv()
            .map_err(|_| RuntimeError::ReplyDropped)
    }

    /// Check if the timeline stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side of a timeline, consumed by [`Timeline::run`].
pub struct Timeline<S> {
    rx: mpsc::Receiver<Command<S>>,
}

/// Create a timeline and its first handle.
pub fn channel<S>(config: &TimelineConfig) -> (TimelineHandle<S>, Timeline<S>) {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    (TimelineHandle { tx }, Timeline { rx })
}

impl<S: 'static> Timeline<S> {
    /// Build the model with `build` and apply commands until every handle is
    /// dropped.
    ///
    /// Must run inside a [`LocalSet`]; `build` receives the scheduler the
    /// model's settings should use for their rollback timers.
    pub async fn run<B>(mut self, build: B)
    where
        B: FnOnce(Rc<dyn Scheduler>) -> S,
    {
        let scheduler = Rc::new(TokioScheduler::new());
        let model = build(scheduler.clone());
        debug!("timeline started");

        let mut applied: u64 = 0;
        while let Some(command) = self.rx.recv().await {
            command(&model);
            applied += 1;
        }

        // The model goes first so its settings cancel their own timers.
        drop(model);
        info!(commands = applied, pending_timers = scheduler.pending_timers(), "timeline closed");
    }
}

/// Start a timeline on a dedicated thread with its own current-thread
/// runtime.
///
/// The thread ends once every handle is dropped. `build` runs on that
/// thread, so the model itself never needs to be `Send`.
pub fn spawn_timeline<S, B>(
    config: TimelineConfig,
    build: B,
) -> Result<(TimelineHandle<S>, thread::JoinHandle<()>), RuntimeError>
where
    S: 'static,
    B: FnOnce(Rc<dyn Scheduler>) -> S + Send + 'static,
{
    config.validate()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let (handle, timeline) = channel(&config);

    let thread = thread::Builder::new()
        .name(config.thread_name.clone())
        .spawn(move || {
            let local = LocalSet::new();
            local.block_on(&runtime, timeline.run(build));
        })?;

    info!(thread = %config.thread_name, "timeline thread started");
    Ok((handle, thread))
}
