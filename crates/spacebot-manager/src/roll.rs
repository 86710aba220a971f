use crate::profile::ROLL;
use anyhow::Result;
use async_trait::async_trait;
use spacebot_core::{Action, Consumer, Event, EventBus, EventKind, Response};
use tracing::debug;

/// Answers `/roll` with a number from 1 to 100, visible only to the caller.
pub struct Roll {
    bus: EventBus,
    testing: bool,
}

impl Roll {
    pub const SUBSCRIPTIONS: &'static [EventKind] = &[EventKind::SlashCommand];

    pub fn new(bus: EventBus, testing: bool) -> Self {
        Self { bus, testing }
    }
}

#[async_trait]
impl Consumer for Roll {
    fn name(&self) -> &str {
        "roll"
    }

    async fn handle(&self, event: Event) -> Result<()> {
        let Event::SlashCommand(cmd) = event else {
            return Ok(());
        };
        if !ROLL.matches(&cmd.command, self.testing) {
            return Ok(());
        }
        let rolled = fastrand::u32(1..=100);
        debug!(user_id = %cmd.user_id, rolled, "roll");
        let response = Response::new(&cmd.user).with(Action::ephemeral(
            &cmd.user_id,
            format!("{} rolled {rolled}", cmd.user),
        ));
        self.bus.publish(Event::Response(response)).await?;
        Ok(())
    }
}
