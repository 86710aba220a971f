//! spacebot: books parking spots and workstations from chat.
//!
//! Reads chat events as JSON lines on stdin and writes the resulting actions as
//! JSON lines on stdout. Logs go to stderr (`LOG_FORMAT=json` for JSON logs,
//! `RUST_LOG` for filtering).

mod stdio;

use anyhow::{Context, Result};
use spacebot_core::{AdapterConsumer, Clock, EventBus, EventKind, Scheduler, SystemClock};
use spacebot_lot::{SpacesLot, UserRoster};
use spacebot_manager::{Config, Profile, ReservationManager, Roll};
use std::sync::Arc;
use stdio::JsonLinesAdapter;
use tokio::sync::Mutex;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env().context("reading configuration")?;
    info!(?config, "starting spacebot");

    let roster = Arc::new(Mutex::new(UserRoster::load(&config.users_filename)?));
    let parking = Arc::new(Mutex::new(SpacesLot::load(&config.parking_filename)?));
    let workspaces = Arc::new(Mutex::new(SpacesLot::load(&config.workspaces_filename)?));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (bus, mut dispatcher) = EventBus::new(config.event_queue_capacity);
    let mut fatal = dispatcher
        .fatal_errors()
        .context("fatal error channel already taken")?;

    let profiles = [
        (Profile::parking(config.parking_cutoff), Arc::clone(&parking)),
        (Profile::workspaces(config.workspaces_cutoff), Arc::clone(&workspaces)),
    ];
    let mut scheduler = Scheduler::new(Arc::clone(&clock));
    for (profile, lot) in profiles {
        scheduler = scheduler.daily(profile.reset_label, profile.cutoff.hour, profile.cutoff.minute);
        let manager = ReservationManager::new(
            profile,
            lot,
            Arc::clone(&roster),
            bus.clone(),
            Arc::clone(&clock),
        )
        .testing(config.debug);
        bus.subscribe(Arc::new(manager), ReservationManager::SUBSCRIPTIONS);
    }
    bus.subscribe(Arc::new(Roll::new(bus.clone(), config.debug)), Roll::SUBSCRIPTIONS);
    bus.subscribe(
        Arc::new(AdapterConsumer::new(JsonLinesAdapter::new(tokio::io::stdout()))),
        &[EventKind::Response],
    );

    if config.debug {
        info!("testing mode: only /test-* commands are answered");
    }

    let timers = tokio::spawn(scheduler.run(bus.clone()));
    let input = tokio::spawn(stdio::read_events(bus.clone()));
    drop(bus);

    let outcome = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            Ok(())
        }
        Some(failure) = fatal.recv() => {
            error!(
                consumer = %failure.consumer,
                event_id = %failure.event_id,
                error = %format!("{:#}", failure.error),
                "stopping on fatal error"
            );
            Err(failure.error.context(format!("{} failed", failure.consumer)))
        }
        () = dispatcher.run() => {
            info!("event bus closed");
            Ok(())
        }
    };

    timers.abort();
    input.abort();
    outcome
}
