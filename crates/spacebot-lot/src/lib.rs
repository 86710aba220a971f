//! # Spacebot lot
//!
//! The reservation state of one kind of bookable space (parking stalls or desks)
//! and the roster of people allowed to book them.
//!
//! ```text
//! SpacesLot
//!   ├── UnitSpaces:   SpaceKey -> Space
//!   └── ToBeReleased: SpaceKey -> ReleasePool -> [ReleaseInfo]
//! ```
//!
//! A [`ReleaseInfo`] lends a permanently owned [`Space`] to everyone else for a
//! range of dates. It moves through draft -> submitted -> active -> removed and
//! never goes back. The daily tick ([`SpacesLot::release_spaces`]) drives the
//! active and removed transitions at the configured [`Cutoff`].
//!
//! All state lives in pretty-printed JSON files that are rewritten on every
//! mutation. Drafts never survive a reload.

mod cutoff;
mod error;
mod lot;
mod release;
mod roster;
mod space;


pub use cutoff::Cutoff;
pub use error::{LotError, PoolError, ReleaseDateError, Result, RosterError};
pub use lot::{
    CancelOutcome, DateField, Displaced, ReturnDay, SpaceFilter, SpacesLot, SubmittedRelease,
};
pub use release::{
    parse_date, validate_range, ReleaseInfo, ReleaseMap, ReleasePool, ReleaseRef, DATE_FORMAT,
    INITIAL_CAPACITY,
};
pub use roster::{Rights, User, UserRoster};
pub use space::{floor_label, Space, SpaceKey};
