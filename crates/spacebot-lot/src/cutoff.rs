use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Daily wall-clock time at which auto-releases fire and release boundaries are
/// evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cutoff {
    pub hour: u32,
    pub minute: u32,
}

impl Default for Cutoff {
    fn default() -> Self {
        Self {
            hour: 17,
            minute: 0,
        }
    }
}

impl Cutoff {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }

    /// True once `now` has reached today's cutoff.
    pub fn has_passed(&self, now: NaiveDateTime) -> bool {
        now.time() >= self.time()
    }
}

impl fmt::Display for Cutoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn passes_at_the_cutoff_minute() {
        let cutoff = Cutoff::default();
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert!(!cutoff.has_passed(day.and_hms_opt(16, 59, 59).unwrap()));
        assert!(cutoff.has_passed(day.and_hms_opt(17, 0, 0).unwrap()));
        assert_eq!(cutoff.to_string(), "17:00");
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(Cutoff::new(24, 0).is_none());
        assert!(Cutoff::new(8, 60).is_none());
        assert_eq!(Cutoff::new(8, 30).unwrap().to_string(), "08:30");
    }
}
