#![allow(dead_code)]

use spacebot_core::{Dispatcher, Event, EventBus, FatalError};
use spacebot_lot::{Cutoff, SpacesLot, UserRoster};
use spacebot_manager::{Profile, ReservationManager, Roll};
use spacebot_testing::{sample_lot, sample_roster, FixedClock, ResponseRecorder};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::{mpsc, Mutex};

/// Both managers and `/roll` wired on one bus, at Wednesday 2025-03-05 09:00.
pub struct Harness {
    pub dir: TempDir,
    pub bus: EventBus,
    pub dispatcher: Dispatcher,
    pub fatal: mpsc::UnboundedReceiver<FatalError>,
    pub clock: Arc<FixedClock>,
    pub responses: Arc<ResponseRecorder>,
    pub parking: Arc<Mutex<SpacesLot>>,
    pub workspaces: Arc<Mutex<SpacesLot>>,
    pub roster: Arc<Mutex<UserRoster>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(false)
    }

    pub fn testing() -> Self {
        Self::build(true)
    }

    fn build(testing: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let clock = FixedClock::at(2025, 3, 5, 9, 0);
        let parking = Arc::new(Mutex::new(sample_lot(&dir, "parking.json").unwrap()));
        let workspaces = Arc::new(Mutex::new(sample_lot(&dir, "workspaces.json").unwrap()));
        let roster = Arc::new(Mutex::new(sample_roster(&dir).unwrap()));

        let (bus, mut dispatcher) = EventBus::new(64);
        let fatal = dispatcher.fatal_errors().unwrap();
        let responses = ResponseRecorder::subscribe(&bus);

        for (profile, lot) in [
            (Profile::parking(Cutoff::default()), &parking),
            (Profile::workspaces(Cutoff::default()), &workspaces),
        ] {
            let manager = ReservationManager::new(
                profile,
                Arc::clone(lot),
                Arc::clone(&roster),
                bus.clone(),
                clock.clone(),
            )
            .testing(testing);
            bus.subscribe(Arc::new(manager), ReservationManager::SUBSCRIPTIONS);
        }
        bus.subscribe(Arc::new(Roll::new(bus.clone(), testing)), Roll::SUBSCRIPTIONS);

        Self {
            dir,
            bus,
            dispatcher,
            fatal,
            clock,
            responses,
            parking,
            workspaces,
            roster,
        }
    }

    /// Publish and run every handler, including the ones triggered by responses.
    pub async fn send(&mut self, event: Event) {
        self.bus.publish(event).await.unwrap();
        self.dispatcher.drain().await;
    }
}
