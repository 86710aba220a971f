//! Test support for spacebot: a settable clock, recording consumers and
//! adapters, lot and roster fixtures, and event builders.
//!
//! ```ignore
//! let clock = FixedClock::at(2025, 3, 5, 9, 0);
//! let (bus, mut dispatcher) = EventBus::new(64);
//! let responses = ResponseRecorder::subscribe(&bus);
//! bus.publish(slash("alice", "U1", "/parking")).await?;
//! dispatcher.drain().await;
//! assert!(responses.opened_modal().is_some());
//! ```

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use spacebot_core::{
    Action, ActionItem, Adapter, BlockAction, Clock, Consumer, Event, EventBus, EventKind,
    FormValue, FormValues, Modal, Response, SlashCommand, TimerDone, ViewClosed, ViewOpened,
    ViewSubmission,
};
use spacebot_lot::{Rights, Space, SpacesLot, User, UserRoster};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::TempDir;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn datetime(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .unwrap_or_default()
}

// =============================================================================
// Clock
// =============================================================================

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Arc<Self> {
        Self::new(datetime(year, month, day, hour, minute))
    }

    pub fn set(&self, now: NaiveDateTime) {
        *locked(&self.now) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = locked(&self.now);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *locked(&self.now)
    }
}

// =============================================================================
// Recorders
// =============================================================================

/// Collects every [`Response`] published on the bus.
#[derive(Default)]
pub struct ResponseRecorder {
    responses: Mutex<Vec<Response>>,
}

impl ResponseRecorder {
    pub fn subscribe(bus: &EventBus) -> Arc<Self> {
        let recorder = Arc::new(Self::default());
        bus.subscribe(recorder.clone(), &[EventKind::Response]);
        recorder
    }

    pub fn responses(&self) -> Vec<Response> {
        locked(&self.responses).clone()
    }

    pub fn actions(&self) -> Vec<Action> {
        locked(&self.responses)
            .iter()
            .flat_map(|r| r.actions.iter().cloned())
            .collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        locked(&self.responses).clear();
    }

    /// Ephemeral texts addressed to `user_id`, oldest first.
    pub fn ephemerals_to(&self, user_id: &str) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                Action::PostEphemeral {
                    user_id: to, text, ..
                } if to == user_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn opened_modal(&self) -> Option<Modal> {
        self.actions().into_iter().rev().find_map(|action| match action {
            Action::OpenView { modal, .. } => Some(modal),
            _ => None,
        })
    }

    pub fn pushed_modal(&self) -> Option<Modal> {
        self.actions().into_iter().rev().find_map(|action| match action {
            Action::PushView { modal, .. } => Some(modal),
            _ => None,
        })
    }

    /// The most recent update of `view_id`, with its inline error.
    pub fn update_of(&self, view_id: &str) -> Option<(Modal, Option<String>)> {
        self.actions().into_iter().rev().find_map(|action| match action {
            Action::UpdateView {
                view_id: id,
                modal,
                err_txt,
                ..
            } if id == view_id => Some((modal, err_txt)),
            _ => None,
        })
    }
}

#[async_trait]
impl Consumer for ResponseRecorder {
    fn name(&self) -> &str {
        "response-recorder"
    }

    async fn handle(&self, event: Event) -> Result<()> {
        if let Event::Response(response) = event {
            locked(&self.responses).push(response);
        }
        Ok(())
    }
}

/// An [`Adapter`] that records the calls it receives as [`Action`]s.
#[derive(Default)]
pub struct RecordingAdapter {
    applied: Mutex<Vec<Action>>,
    fail: bool,
}

impl RecordingAdapter {
    /// An adapter whose every call fails after being recorded.
    pub fn failing() -> Self {
        Self {
            applied: Mutex::default(),
            fail: true,
        }
    }

    pub fn applied(&self) -> Vec<Action> {
        locked(&self.applied).clone()
    }

    fn record(&self, action: Action) -> Result<()> {
        locked(&self.applied).push(action);
        if self.fail {
            anyhow::bail!("chat platform unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl Adapter for RecordingAdapter {
    async fn open_view(&self, trigger_id: &str, modal: &Modal) -> Result<()> {
        self.record(Action::OpenView {
            trigger_id: trigger_id.to_string(),
            modal: modal.clone(),
        })
    }

    async fn update_view(
        &self,
        trigger_id: &str,
        view_id: &str,
        modal: &Modal,
        err_txt: Option<&str>,
    ) -> Result<()> {
        self.record(Action::update(
            trigger_id,
            view_id,
            modal.clone(),
            err_txt.map(str::to_string),
        ))
    }

    async fn push_view(&self, trigger_id: &str, modal: &Modal) -> Result<()> {
        self.record(Action::PushView {
            trigger_id: trigger_id.to_string(),
            modal: modal.clone(),
        })
    }

    async fn post(&self, channel_id: &str, text: &str) -> Result<()> {
        self.record(Action::Post {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
        })
    }

    async fn post_ephemeral(&self, channel_id: &str, user_id: &str, text: &str) -> Result<()> {
        self.record(Action::PostEphemeral {
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
            text: text.to_string(),
        })
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// A lot on `-1`, `1` and `2` with `1st floor 10` permanently held by alice (`U1`).
///
/// Free: `-1st floor 3`, `1st floor 11`, `2nd floor 1`.
pub fn sample_lot(dir: &TempDir, file: &str) -> Result<SpacesLot> {
    let mut lot = SpacesLot::new(dir.path().join(file));
    let mut owned = Space::new(1, 10).with_description("near the lift");
    owned.reserve("alice", "U1", datetime(2025, 2, 3, 9, 0), false);
    lot.add_space(owned)?;
    for (floor, number) in [(1, 11), (-1, 3), (2, 1)] {
        lot.add_space(Space::new(floor, number))?;
    }
    Ok(lot)
}

/// `admin` (`U0`) is an admin, `alice` (`U1`) has permanent parking, `bob`
/// (`U2`) is a standard user.
pub fn sample_roster(dir: &TempDir) -> Result<UserRoster> {
    let mut roster = UserRoster::new(dir.path().join("users.json"));
    roster.insert_user("admin", User::new("U0", Rights::Admin))?;
    let mut alice = User::new("U1", Rights::Standard);
    alice.has_permanent_parking = true;
    roster.insert_user("alice", alice)?;
    roster.insert_user("bob", User::new("U2", Rights::Standard))?;
    Ok(roster)
}

// =============================================================================
// Event builders
// =============================================================================

pub fn slash(user: &str, user_id: &str, command: &str) -> Event {
    Event::SlashCommand(SlashCommand {
        user: user.into(),
        user_id: user_id.into(),
        command: command.into(),
        trigger_id: format!("trigger-{user_id}"),
        channel_name: "general".into(),
        channel_id: "C1".into(),
    })
}

/// A button press carrying `value` inside the view `view_id` titled `title`.
pub fn click(user: &str, user_id: &str, view_id: &str, title: &str, action_id: &str, value: &str) -> Event {
    action(
        user,
        user_id,
        view_id,
        title,
        ActionItem {
            action_id: action_id.into(),
            value: value.into(),
            ..ActionItem::default()
        },
    )
}

pub fn select(user: &str, user_id: &str, view_id: &str, title: &str, action_id: &str, option: &str) -> Event {
    action(
        user,
        user_id,
        view_id,
        title,
        ActionItem {
            action_id: action_id.into(),
            selected_option: Some(option.into()),
            ..ActionItem::default()
        },
    )
}

pub fn pick_date(user: &str, user_id: &str, view_id: &str, title: &str, action_id: &str, date: &str) -> Event {
    action(
        user,
        user_id,
        view_id,
        title,
        ActionItem {
            action_id: action_id.into(),
            selected_date: Some(date.into()),
            ..ActionItem::default()
        },
    )
}

fn action(user: &str, user_id: &str, view_id: &str, title: &str, item: ActionItem) -> Event {
    Event::BlockAction(BlockAction {
        user: user.into(),
        user_id: user_id.into(),
        trigger_id: format!("trigger-{user_id}"),
        view_id: view_id.into(),
        title: title.into(),
        actions: vec![item],
        values: FormValues::new(),
    })
}

/// Form values keyed by action id, each in its own block.
pub fn form(entries: &[(&str, &str)]) -> FormValues {
    entries
        .iter()
        .map(|(action_id, value)| {
            let field = FormValue {
                value: Some(value.to_string()),
                ..FormValue::default()
            };
            (
                format!("{action_id}Block"),
                HashMap::from([(action_id.to_string(), field)]),
            )
        })
        .collect()
}

pub fn submit(user: &str, user_id: &str, view_id: &str, title: &str, values: FormValues) -> Event {
    Event::ViewSubmission(ViewSubmission {
        user: user.into(),
        user_id: user_id.into(),
        view_id: view_id.into(),
        title: title.into(),
        values,
    })
}

pub fn opened(user: &str, user_id: &str, view_id: &str, root_view_id: &str, title: &str) -> Event {
    Event::ViewOpened(ViewOpened {
        user: user.into(),
        user_id: user_id.into(),
        view_id: view_id.into(),
        root_view_id: root_view_id.into(),
        title: title.into(),
    })
}

pub fn closed(user: &str, user_id: &str, view_id: &str, title: &str) -> Event {
    Event::ViewClosed(ViewClosed {
        user: user.into(),
        user_id: user_id.into(),
        view_id: view_id.into(),
        title: title.into(),
    })
}

pub fn timer(label: &str, time: NaiveDateTime) -> Event {
    Event::TimerDone(TimerDone {
        label: label.into(),
        time,
    })
}
