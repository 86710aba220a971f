//! Outbound actions and the adapter seam they are applied through.

use crate::bus::Consumer;
use crate::event::Event;
use crate::view::Modal;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Action {
    OpenView {
        trigger_id: String,
        modal: Modal,
    },
    /// Replace the content of an open view. `err_txt` is shown inline.
    UpdateView {
        trigger_id: String,
        view_id: String,
        modal: Modal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        err_txt: Option<String>,
    },
    /// Stack a new view on top of the one that triggered the interaction.
    PushView {
        trigger_id: String,
        modal: Modal,
    },
    Post {
        channel_id: String,
        text: String,
    },
    PostEphemeral {
        channel_id: String,
        user_id: String,
        text: String,
    },
}

impl Action {
    pub async fn apply(&self, adapter: &dyn Adapter) -> Result<()> {
        match self {
            Self::OpenView { trigger_id, modal } => adapter.open_view(trigger_id, modal).await,
            Self::UpdateView {
                trigger_id,
                view_id,
                modal,
                err_txt,
            } => {
                adapter
                    .update_view(trigger_id, view_id, modal, err_txt.as_deref())
                    .await
            }
            Self::PushView { trigger_id, modal } => adapter.push_view(trigger_id, modal).await,
            Self::Post { channel_id, text } => adapter.post(channel_id, text).await,
            Self::PostEphemeral {
                channel_id,
                user_id,
                text,
            } => adapter.post_ephemeral(channel_id, user_id, text).await,
        }
    }

    /// Ephemeral message to `user_id` in their direct channel.
    pub fn ephemeral(user_id: &str, text: impl Into<String>) -> Self {
        Self::PostEphemeral {
            channel_id: user_id.to_string(),
            user_id: user_id.to_string(),
            text: text.into(),
        }
    }

    pub fn update(trigger_id: &str, view_id: &str, modal: Modal, err_txt: Option<String>) -> Self {
        Self::UpdateView {
            trigger_id: trigger_id.to_string(),
            view_id: view_id.to_string(),
            modal,
            err_txt,
        }
    }
}

/// The chat-platform side of the bot.
#[async_trait]
pub trait Adapter: Send + Sync {
    async fn open_view(&self, trigger_id: &str, modal: &Modal) -> Result<()>;

    async fn update_view(
        &self,
        trigger_id: &str,
        view_id: &str,
        modal: &Modal,
        err_txt: Option<&str>,
    ) -> Result<()>;

    async fn push_view(&self, trigger_id: &str, modal: &Modal) -> Result<()>;

    async fn post(&self, channel_id: &str, text: &str) -> Result<()>;

    async fn post_ephemeral(&self, channel_id: &str, user_id: &str, text: &str) -> Result<()>;
}

/// Applies every published [`Response`](crate::Response) through an [`Adapter`].
///
/// A failing action is logged and the remaining actions of the response still run.
pub struct AdapterConsumer<A> {
    adapter: A,
}

impl<A: Adapter + 'static> AdapterConsumer<A> {
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }
}

#[async_trait]
impl<A: Adapter + 'static> Consumer for AdapterConsumer<A> {
    fn name(&self) -> &str {
        "adapter"
    }

    async fn handle(&self, event: Event) -> Result<()> {
        let Event::Response(response) = event else {
            return Ok(());
        };
        for action in &response.actions {
            if let Err(err) = action.apply(&self.adapter).await {
                warn!(user = %response.user, error = %format!("{err:#}"), "could not apply action");
            }
        }
        Ok(())
    }
}
