//! # Spacebot core
//!
//! The event plumbing between the chat adapter and the reservation managers.
//!
//! ## Architecture
//!
//! ```text
//! Chat adapter ──► SlashCommand / BlockAction / View*
//!     │                                              │
//! Scheduler ─────► TimerDone                         │
//!     │                                              │
//!     ▼ publish()                                    │
//! EventBus (bounded queue) ◄─────────────────────────┘
//!     │
//!     ▼ Dispatcher.run()
//! ├─► ReservationManager (parking)    ─► Response ─┐
//! ├─► ReservationManager (workspaces) ─► Response ─┤
//! └─► Adapter consumer ◄───────────────────────────┘
//!         │
//!         ▼ Action::apply()
//!     Adapter (open/update/push view, post, post ephemeral)
//! ```
//!
//! ## Guarantees
//!
//! - **FIFO into the queue**: handlers may still run concurrently
//! - **Backpressure**: `publish` waits while the queue is full
//! - **Fatal errors surface**: handler errors wrapped in [`Fatal`] reach
//!   [`Dispatcher::fatal_errors`], everything else is logged

mod action;
mod bus;
mod clock;
mod error;
mod event;
mod scheduler;
mod view;

#[cfg(test)]
mod bus_tests;

pub use action::{Action, Adapter, AdapterConsumer};
pub use bus::{Consumer, Dispatcher, EventBus, DEFAULT_QUEUE_CAPACITY};
pub use clock::{Clock, SystemClock};
pub use error::{is_fatal, BusError, Fatal, FatalError};
pub use event::{
    form_value, ActionItem, BlockAction, Event, EventKind, FormValue, FormValues, Response,
    SlashCommand, TimerDone, ViewClosed, ViewOpened, ViewSubmission,
};
pub use scheduler::{Cadence, Scheduler};
pub use view::{Block, ButtonStyle, Element, Modal, SelectOption};

pub use async_trait::async_trait;
