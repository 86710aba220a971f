//! Inbound and outbound event vocabulary.
//!
//! Events are facts: the chat adapter reports what a user did, the scheduler
//! reports that a timer fired, and managers answer with a [`Response`].

use crate::action::Action;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;

/// Submitted form state: block id -> action id -> value.
pub type FormValues = HashMap<String, HashMap<String, FormValue>>;

/// One input's state inside a submitted or interacted-with view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormValue {
    pub value: Option<String>,
    pub selected_date: Option<String>,
    pub selected_option: Option<String>,
    pub selected_user: Option<String>,
}

impl FormValue {
    /// Whatever the widget produced, regardless of its kind.
    pub fn text(&self) -> Option<&str> {
        self.value
            .as_deref()
            .or(self.selected_date.as_deref())
            .or(self.selected_option.as_deref())
            .or(self.selected_user.as_deref())
    }
}

/// Look up the value an input produced, by action id, whatever block it sits in.
pub fn form_value<'a>(values: &'a FormValues, action_id: &str) -> Option<&'a FormValue> {
    values.values().find_map(|block| block.get(action_id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlashCommand {
    pub user: String,
    pub user_id: String,
    pub command: String,
    #[serde(default)]
    pub trigger_id: String,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub channel_id: String,
}

/// A single interaction inside a [`BlockAction`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionItem {
    pub block_id: String,
    pub action_id: String,
    pub value: String,
    pub selected_date: Option<String>,
    pub selected_option: Option<String>,
    pub selected_user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockAction {
    pub user: String,
    pub user_id: String,
    #[serde(default)]
    pub trigger_id: String,
    pub view_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub actions: Vec<ActionItem>,
    #[serde(default)]
    pub values: FormValues,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSubmission {
    pub user: String,
    pub user_id: String,
    pub view_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub values: FormValues,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOpened {
    pub user: String,
    pub user_id: String,
    pub view_id: String,
    #[serde(default)]
    pub root_view_id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewClosed {
    pub user: String,
    pub user_id: String,
    pub view_id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerDone {
    pub label: String,
    pub time: NaiveDateTime,
}

/// What a manager wants the adapter to do, in order, on behalf of `user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub user: String,
    pub actions: SmallVec<[Action; 2]>,
}

impl Response {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            actions: SmallVec::new(),
        }
    }

    pub fn with(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SlashCommand(SlashCommand),
    BlockAction(BlockAction),
    ViewSubmission(ViewSubmission),
    ViewOpened(ViewOpened),
    ViewClosed(ViewClosed),
    TimerDone(TimerDone),
    Response(Response),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SlashCommand(_) => EventKind::SlashCommand,
            Self::BlockAction(_) => EventKind::BlockAction,
            Self::ViewSubmission(_) => EventKind::ViewSubmission,
            Self::ViewOpened(_) => EventKind::ViewOpened,
            Self::ViewClosed(_) => EventKind::ViewClosed,
            Self::TimerDone(_) => EventKind::TimerDone,
            Self::Response(_) => EventKind::Response,
        }
    }
}

/// Subscription key. `Any` receives every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SlashCommand,
    BlockAction,
    ViewSubmission,
    ViewOpened,
    ViewClosed,
    TimerDone,
    Response,
    Any,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SlashCommand => "slash_command",
            Self::BlockAction => "block_action",
            Self::ViewSubmission => "view_submission",
            Self::ViewOpened => "view_opened",
            Self::ViewClosed => "view_closed",
            Self::TimerDone => "timer_done",
            Self::Response => "response",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_json_lines_decode() {
        let line = r#"{"type":"block_action","user":"alice","userId":"U1","viewId":"V1",
            "actions":[{"actionId":"releaseStartDate","selectedDate":"2025-02-10"}]}"#;
        let event: Event = serde_json::from_str(line).unwrap();
        assert_eq!(event.kind(), EventKind::BlockAction);
        let Event::BlockAction(action) = event else {
            panic!("wrong variant");
        };
        assert_eq!(action.actions[0].action_id, "releaseStartDate");
        assert_eq!(action.actions[0].selected_date.as_deref(), Some("2025-02-10"));
        assert!(action.values.is_empty());
    }

    #[test]
    fn form_value_lookup_ignores_block_ids() {
        let line = r#"{"type":"view_submission","user":"alice","userId":"U1","viewId":"V2",
            "values":{"b1":{"releaseStartDate":{"selectedDate":"2025-02-10"}},
                      "b2":{"releaseEndDate":{"selectedDate":"2025-02-12"}}}}"#;
        let Event::ViewSubmission(sub) = serde_json::from_str::<Event>(line).unwrap() else {
            panic!("wrong variant");
        };
        let end = form_value(&sub.values, "releaseEndDate").and_then(FormValue::text);
        assert_eq!(end, Some("2025-02-12"));
        assert!(form_value(&sub.values, "floor").is_none());
    }
}
