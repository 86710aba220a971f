//! # Spacebot managers
//!
//! The booking rules bound to chat events. Two [`ReservationManager`]s run side
//! by side, one per lot, configured by a [`Profile`]:
//!
//! | | parking | workspaces |
//! |---|---|---|
//! | booking | `/parking` | `/workspace` |
//! | admin | `/spaces-parking` | `/spaces-workspace` |
//! | users | `/users-parking` | |
//! | reset timer | `Reset parking status` | `Reset workspaces status` |
//!
//! In testing mode every command is answered under its `/test-` alias only.
//! Both managers share one [`UserRoster`](spacebot_lot::UserRoster) and never
//! lock it while holding their lot.

mod config;
mod manager;
mod profile;
mod roll;
pub mod views;

pub use config::{Config, ConfigError};
pub use manager::ReservationManager;
pub use profile::{Command, Profile, ROLL};
pub use roll::Roll;
