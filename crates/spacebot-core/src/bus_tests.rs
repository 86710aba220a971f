use crate::*;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Recorder {
    name: String,
    seen: Mutex<Vec<Event>>,
}

impl Recorder {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn kinds(&self) -> Vec<EventKind> {
        self.seen.lock().unwrap().iter().map(Event::kind).collect()
    }
}

#[async_trait]
impl Consumer for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: Event) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(event);
        Ok(())
    }
}

struct Failing {
    fatal: bool,
}

#[async_trait]
impl Consumer for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    async fn handle(&self, _event: Event) -> anyhow::Result<()> {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only filesystem");
        if self.fatal {
            Err(Fatal::new(io).into())
        } else {
            Err(io.into())
        }
    }
}

/// Publishes a response for every slash command it sees.
struct Echo {
    bus: EventBus,
}

#[async_trait]
impl Consumer for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    async fn handle(&self, event: Event) -> anyhow::Result<()> {
        if let Event::SlashCommand(cmd) = event {
            let response = Response::new(&cmd.user).with(Action::ephemeral(&cmd.user_id, "pong"));
            self.bus.publish(Event::Response(response)).await?;
        }
        Ok(())
    }
}

fn slash(command: &str) -> Event {
    Event::SlashCommand(SlashCommand {
        user: "alice".into(),
        user_id: "U1".into(),
        command: command.into(),
        trigger_id: "T1".into(),
        channel_name: "general".into(),
        channel_id: "C1".into(),
    })
}

fn timer(label: &str) -> Event {
    Event::TimerDone(TimerDone {
        label: label.into(),
        time: chrono::NaiveDate::from_ymd_opt(2025, 3, 5)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap(),
    })
}

#[tokio::test]
async fn fans_out_by_kind_and_wildcard() {
    let (bus, mut dispatcher) = EventBus::new(16);
    let commands = Recorder::new("commands");
    let everything = Recorder::new("everything");
    bus.subscribe(commands.clone(), &[EventKind::SlashCommand]);
    bus.subscribe(everything.clone(), &[EventKind::Any]);

    bus.publish(slash("/parking")).await.unwrap();
    bus.publish(timer("Reset parking status")).await.unwrap();
    assert_eq!(dispatcher.drain().await, 2);

    assert_eq!(commands.kinds(), vec![EventKind::SlashCommand]);
    assert_eq!(
        everything.kinds(),
        vec![EventKind::SlashCommand, EventKind::TimerDone]
    );
    assert_eq!(bus.subscriber_count(EventKind::SlashCommand), 1);
    assert_eq!(bus.subscriber_count(EventKind::BlockAction), 0);
}

#[tokio::test]
async fn multi_kind_subscription() {
    let (bus, mut dispatcher) = EventBus::new(16);
    let recorder = Recorder::new("views");
    bus.subscribe(recorder.clone(), &[EventKind::SlashCommand, EventKind::TimerDone]);

    bus.publish(timer("Reset workspaces status")).await.unwrap();
    bus.publish(slash("/workspace")).await.unwrap();
    dispatcher.drain().await;

    assert_eq!(
        recorder.kinds(),
        vec![EventKind::TimerDone, EventKind::SlashCommand]
    );
}

#[tokio::test]
async fn handler_output_is_drained_in_the_same_pass() {
    let (bus, mut dispatcher) = EventBus::new(16);
    let responses = Recorder::new("responses");
    bus.subscribe(Arc::new(Echo { bus: bus.clone() }), &[EventKind::SlashCommand]);
    bus.subscribe(responses.clone(), &[EventKind::Response]);

    bus.publish(slash("/roll")).await.unwrap();
    assert_eq!(dispatcher.drain().await, 2);
    assert_eq!(responses.kinds(), vec![EventKind::Response]);
}

#[tokio::test]
async fn only_fatal_errors_are_forwarded() {
    let (bus, mut dispatcher) = EventBus::new(16);
    let mut fatal = dispatcher.fatal_errors().unwrap();
    assert!(dispatcher.fatal_errors().is_none());

    bus.subscribe(Arc::new(Failing { fatal: false }), &[EventKind::SlashCommand]);
    bus.subscribe(Arc::new(Failing { fatal: true }), &[EventKind::TimerDone]);

    bus.publish(slash("/parking")).await.unwrap();
    dispatcher.drain().await;
    assert!(fatal.try_recv().is_err());

    bus.publish(timer("Reset parking status")).await.unwrap();
    dispatcher.drain().await;
    let err = fatal.try_recv().unwrap();
    assert_eq!(err.consumer, "failing");
    assert!(err.to_string().contains("read-only filesystem"));
}

#[tokio::test]
async fn try_publish_reports_full_queue() {
    let (bus, _dispatcher) = EventBus::new(1);
    bus.try_publish(slash("/parking")).unwrap();
    assert!(matches!(bus.try_publish(slash("/parking")), Err(BusError::Full)));
}

#[tokio::test]
async fn publish_after_dispatcher_dropped_is_closed() {
    let (bus, dispatcher) = EventBus::new(4);
    drop(dispatcher);
    assert!(matches!(bus.publish(slash("/parking")).await, Err(BusError::Closed)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_loop_delivers_until_bus_dropped() {
    let (bus, dispatcher) = EventBus::new(4);
    let recorder = Recorder::new("recorder");
    bus.subscribe(recorder.clone(), &[EventKind::Any]);
    let running = tokio::spawn(dispatcher.run());

    for _ in 0..3 {
        bus.publish(slash("/parking")).await.unwrap();
    }
    tokio::time::timeout(Duration::from_secs(5), async {
        while recorder.kinds().len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    drop(bus);
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap();
}
