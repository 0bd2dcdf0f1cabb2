//! Runtime errors.

use thiserror::Error;

/// Errors that can occur while driving a timeline.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The timeline stopped; no more commands are accepted.
    #[error("Timeline closed")]
    Closed,

    /// The timeline dropped a query before answering it.
    #[error("Timeline dropped the reply")]
    ReplyDropped,

    /// Timeline configuration is not valid JSON or has the wrong shape.
    #[error("Invalid config: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    /// A command channel needs room for at least one command.
    #[error("Channel capacity must be non-zero")]
    ZeroCapacity,

    /// The timeline thread or its runtime could not be started.
    #[error("Failed to start timeline: {0}")]
    Io(#[from] std::io::Error),
}
