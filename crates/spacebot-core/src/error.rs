use std::error::Error as StdError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BusError {
    /// The dispatcher was dropped; nothing will ever read the queue again.
    #[error("event bus is closed")]
    Closed,

    #[error("event queue is full")]
    Full,
}

/// Marker for handler errors that must stop the process.
///
/// Consumers wrap storage failures in `Fatal` before returning them; the
/// dispatcher downcasts every handler error and forwards these instead of
/// only logging them.
#[derive(Debug, Error)]
#[error("fatal: {source}")]
pub struct Fatal {
    source: Box<dyn StdError + Send + Sync>,
}

impl Fatal {
    pub fn new(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn inner(&self) -> &(dyn StdError + Send + Sync) {
        self.source.as_ref()
    }
}

/// A fatal handler error as forwarded by the dispatcher.
#[derive(Debug)]
pub struct FatalError {
    pub consumer: String,
    pub event_id: Uuid,
    pub error: anyhow::Error,
}

impl std::fmt::Display for FatalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "consumer `{}` failed fatally on event {}: {:#}",
            self.consumer, self.event_id, self.error
        )
    }
}

/// True when `err` carries a [`Fatal`] anywhere in its chain.
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<Fatal>())
}
