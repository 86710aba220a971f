//! Temporary releases of permanently owned spaces.

mod info;
mod map;
mod pool;

pub use info::{parse_date, validate_range, ReleaseInfo, DATE_FORMAT};
pub use map::{ReleaseMap, ReleaseRef};
pub use pool::{ReleasePool, INITIAL_CAPACITY};
