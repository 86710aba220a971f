//! Wall-clock timer source.
//!
//! The scheduler is the only producer of [`TimerDone`] events. It wakes at every
//! minute boundary, asks [`Scheduler::tick`] which entries match the current
//! minute, and publishes one event per match.

use crate::bus::EventBus;
use crate::clock::Clock;
use crate::error::BusError;
use crate::event::{Event, TimerDone};
use chrono::{NaiveDateTime, Timelike};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Once a day at `hour:minute`.
    Daily { hour: u32, minute: u32 },
    /// Once an hour at `minute`.
    Hourly { minute: u32 },
}

impl Cadence {
    pub fn matches(&self, now: NaiveDateTime) -> bool {
        match *self {
            Self::Daily { hour, minute } => now.hour() == hour && now.minute() == minute,
            Self::Hourly { minute } => now.minute() == minute,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    label: String,
    cadence: Cadence,
    last_fired: Option<NaiveDateTime>,
}

pub struct Scheduler {
    entries: Vec<Entry>,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Vec::new(),
            clock,
        }
    }

    pub fn daily(mut self, label: impl Into<String>, hour: u32, minute: u32) -> Self {
        self.entries.push(Entry {
            label: label.into(),
            cadence: Cadence::Daily { hour, minute },
            last_fired: None,
        });
        self
    }

    pub fn hourly(mut self, label: impl Into<String>, minute: u32) -> Self {
        self.entries.push(Entry {
            label: label.into(),
            cadence: Cadence::Hourly { minute },
            last_fired: None,
        });
        self
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    /// Timers due at `now`. Each entry fires at most once per matching minute,
    /// however often the same minute is ticked.
    pub fn tick(&mut self, now: NaiveDateTime) -> Vec<TimerDone> {
        let minute = truncate_to_minute(now);
        self.entries
            .iter_mut()
            .filter(|entry| entry.cadence.matches(minute) && entry.last_fired != Some(minute))
            .map(|entry| {
                entry.last_fired = Some(minute);
                TimerDone {
                    label: entry.label.clone(),
                    time: now,
                }
            })
            .collect()
    }

    /// Publish due timers until the bus closes.
    pub async fn run(mut self, bus: EventBus) -> Result<(), BusError> {
        info!(entries = self.entries.len(), "scheduler started");
        loop {
            let now = self.clock.now();
            for timer in self.tick(now) {
                debug!(label = %timer.label, time = %timer.time, "timer fired");
                bus.publish(Event::TimerDone(timer)).await?;
            }
            tokio::time::sleep(until_next_minute(self.clock.now())).await;
        }
    }
}

fn truncate_to_minute(t: NaiveDateTime) -> NaiveDateTime {
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

fn until_next_minute(now: NaiveDateTime) -> Duration {
    let elapsed = Duration::from_secs(u64::from(now.second()))
        + Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000));
    Duration::from_secs(60).saturating_sub(elapsed).max(Duration::from_millis(10))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 5)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(Arc::new(SystemClock))
            .daily("Reset parking status", 17, 0)
            .daily("Reset workspaces status", 17, 30)
            .hourly("Hourly", 15)
    }

    #[test]
    fn daily_fires_once_per_matching_minute() {
        let mut s = scheduler();
        assert!(s.tick(at(16, 59, 59)).is_empty());

        let fired = s.tick(at(17, 0, 0));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].label, "Reset parking status");
        assert_eq!(fired[0].time, at(17, 0, 0));

        assert!(s.tick(at(17, 0, 40)).is_empty());
        assert!(s.tick(at(17, 1, 0)).is_empty());
    }

    #[test]
    fn daily_fires_again_next_day() {
        let mut s = scheduler();
        assert_eq!(s.tick(at(17, 30, 5)).len(), 1);
        let tomorrow = at(17, 30, 5) + chrono::Duration::days(1);
        assert_eq!(s.tick(tomorrow).len(), 1);
    }

    #[test]
    fn hourly_fires_every_hour() {
        let mut s = scheduler();
        let labels = |fired: Vec<TimerDone>| fired.into_iter().map(|t| t.label).collect::<Vec<_>>();
        assert_eq!(labels(s.tick(at(9, 15, 0))), vec!["Hourly"]);
        assert!(s.tick(at(9, 15, 30)).is_empty());
        assert_eq!(labels(s.tick(at(10, 15, 0))), vec!["Hourly"]);
    }

    #[test]
    fn sleeps_until_minute_boundary() {
        assert_eq!(until_next_minute(at(9, 0, 0)), Duration::from_secs(60));
        assert_eq!(until_next_minute(at(9, 0, 45)), Duration::from_secs(15));
    }
}
