//! Publish/subscribe between the adapter, the scheduler and the managers.
//!
//! ```text
//! adapter / scheduler / managers
//!     │ publish()
//!     ▼
//! bounded mpsc queue (FIFO, producers wait when full)
//!     │
//!     ▼ Dispatcher::run()
//! for each consumer subscribed to event.kind() or EventKind::Any
//!     └─► tokio::spawn(consumer.handle(event))
//! ```
//!
//! Ordering is FIFO into the queue only. Handlers of consecutive events may run
//! concurrently, so consumers serialize access to their own state.

use crate::error::{is_fatal, BusError, FatalError};
use crate::event::{Event, EventKind};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// A subscriber. One `handle` call runs per delivered event, on its own task.
#[async_trait]
pub trait Consumer: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn handle(&self, event: Event) -> anyhow::Result<()>;
}

type Subscribers = Arc<DashMap<EventKind, Vec<Arc<dyn Consumer>>>>;

/// Producer handle. Cheap to clone; every clone feeds the same queue.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<Event>,
    subscribers: Subscribers,
}

impl EventBus {
    /// Create the bus and the dispatcher that drains it.
    pub fn new(capacity: usize) -> (Self, Dispatcher) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (fatal_tx, fatal_rx) = mpsc::unbounded_channel();
        let subscribers: Subscribers = Arc::new(DashMap::new());
        (
            Self {
                tx,
                subscribers: Arc::clone(&subscribers),
            },
            Dispatcher {
                rx,
                subscribers,
                fatal_tx,
                fatal_rx: Some(fatal_rx),
            },
        )
    }

    pub fn subscribe(&self, consumer: Arc<dyn Consumer>, kinds: &[EventKind]) {
        for kind in kinds {
            debug!(consumer = consumer.name(), %kind, "subscribed");
            self.subscribers
                .entry(*kind)
                .or_default()
                .push(Arc::clone(&consumer));
        }
    }

    /// Enqueue an event, waiting for room when the queue is full.
    pub async fn publish(&self, event: Event) -> Result<(), BusError> {
        self.tx.send(event).await.map_err(|_| BusError::Closed)
    }

    /// Enqueue without waiting.
    pub fn try_publish(&self, event: Event) -> Result<(), BusError> {
        self.tx.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => BusError::Full,
            mpsc::error::TrySendError::Closed(_) => BusError::Closed,
        })
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.get(&kind).map_or(0, |subs| subs.len())
    }
}

/// The single reader of the queue.
pub struct Dispatcher {
    rx: mpsc::Receiver<Event>,
    subscribers: Subscribers,
    fatal_tx: mpsc::UnboundedSender<FatalError>,
    fatal_rx: Option<mpsc::UnboundedReceiver<FatalError>>,
}

impl Dispatcher {
    /// Receiver of handler errors marked [`Fatal`](crate::Fatal). Can be taken once.
    pub fn fatal_errors(&mut self) -> Option<mpsc::UnboundedReceiver<FatalError>> {
        self.fatal_rx.take()
    }

    /// Drain the queue until every [`EventBus`] handle is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            self.dispatch(event);
        }
        debug!("event bus closed, dispatcher stopping");
    }

    /// Fan an event out to its subscribers, one task each.
    pub fn dispatch(&self, event: Event) -> Vec<JoinHandle<()>> {
        let kind = event.kind();
        let recipients = self.recipients(kind);
        if recipients.is_empty() {
            debug!(%kind, "no subscribers");
            return Vec::new();
        }

        let event_id = Uuid::new_v4();
        recipients
            .into_iter()
            .map(|consumer| {
                let span = info_span!("event", %event_id, %kind, consumer = consumer.name());
                let fatal_tx = self.fatal_tx.clone();
                let event = event.clone();
                tokio::spawn(
                    async move {
                        let Err(err) = consumer.handle(event).await else {
                            return;
                        };
                        if is_fatal(&err) {
                            error!(error = %format!("{err:#}"), "fatal handler error");
                            let _ = fatal_tx.send(FatalError {
                                consumer: consumer.name().to_string(),
                                event_id,
                                error: err,
                            });
                        } else {
                            warn!(error = %format!("{err:#}"), "handler error");
                        }
                    }
                    .instrument(span),
                )
            })
            .collect()
    }

    /// Dispatch and wait for every handler to finish.
    pub async fn dispatch_and_wait(&self, event: Event) {
        for joined in join_all(self.dispatch(event)).await {
            if let Err(err) = joined {
                error!(error = %err, "handler task panicked");
            }
        }
    }

    /// Dispatch everything queued right now, waiting for each event's handlers
    /// before taking the next. Events published by those handlers are drained
    /// too. Returns how many events were delivered.
    pub async fn drain(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.dispatch_and_wait(event).await;
            delivered += 1;
        }
        delivered
    }

    fn recipients(&self, kind: EventKind) -> Vec<Arc<dyn Consumer>> {
        let mut out: Vec<Arc<dyn Consumer>> = self
            .subscribers
            .get(&kind)
            .map(|subs| subs.iter().cloned().collect())
            .unwrap_or_default();
        if kind != EventKind::Any {
            if let Some(any) = self.subscribers.get(&EventKind::Any) {
                out.extend(any.iter().cloned());
            }
        }
        out
    }
}
