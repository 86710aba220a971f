//! JSON-lines bridge to the chat platform: events in on stdin, actions out on stdout.
//!
//! Each stdin line is one [`Event`]; each stdout line is one [`Action`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use spacebot_core::{Action, Adapter, Event, EventBus, Modal};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct JsonLinesAdapter<W> {
    out: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesAdapter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    async fn emit(&self, action: Action) -> Result<()> {
        let mut line = serde_json::to_string(&action).context("encoding action")?;
        line.push('\n');
        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes())
            .await
            .context("writing action")?;
        out.flush().await.context("flushing actions")?;
        Ok(())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Adapter for JsonLinesAdapter<W> {
    async fn open_view(&self, trigger_id: &str, modal: &Modal) -> Result<()> {
        self.emit(Action::OpenView {
            trigger_id: trigger_id.to_string(),
            modal: modal.clone(),
        })
        .await
    }

    async fn update_view(
        &self,
        trigger_id: &str,
        view_id: &str,
        modal: &Modal,
        err_txt: Option<&str>,
    ) -> Result<()> {
        self.emit(Action::update(
            trigger_id,
            view_id,
            modal.clone(),
            err_txt.map(str::to_string),
        ))
        .await
    }

    async fn push_view(&self, trigger_id: &str, modal: &Modal) -> Result<()> {
        self.emit(Action::PushView {
            trigger_id: trigger_id.to_string(),
            modal: modal.clone(),
        })
        .await
    }

    async fn post(&self, channel_id: &str, text: &str) -> Result<()> {
        self.emit(Action::Post {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
        })
        .await
    }

    async fn post_ephemeral(&self, channel_id: &str, user_id: &str, text: &str) -> Result<()> {
        self.emit(Action::PostEphemeral {
            channel_id: channel_id.to_string(),
            user_id: user_id.to_string(),
            text: text.to_string(),
        })
        .await
    }
}

/// Publish every event read from stdin until it closes. Malformed lines are skipped.
pub async fn read_events(bus: EventBus) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Event>(line) {
            Ok(event) => {
                debug!(kind = %event.kind(), "event received");
                bus.publish(event).await?;
            }
            Err(err) => warn!(error = %err, "skipping malformed event"),
        }
    }
    info!("stdin closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn actions_are_written_one_per_line() {
        let adapter = JsonLinesAdapter::new(Vec::new());
        adapter.post_ephemeral("U1", "U1", "hello").await.unwrap();
        adapter.post("C1", "bye").await.unwrap();

        let out = adapter.out.into_inner();
        let lines: Vec<&str> = std::str::from_utf8(&out).unwrap().lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Action = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first, Action::ephemeral("U1", "hello"));
        assert!(lines[1].contains(r#""action":"post""#));
    }
}
