mod common;

use common::Harness;
use spacebot_manager::views::{self, ids};
use spacebot_testing::{click, closed, datetime, form, opened, pick_date, submit, timer};

const SPACE: &str = "1st floor 10";

/// alice opens the release modal `release` on top of her booking modal `booking`.
async fn draft(h: &mut Harness, booking: &str, release: &str) {
    h.send(click("alice", "U1", booking, "Parking", ids::TEMP_RELEASE_SPACE, SPACE))
        .await;
    h.send(opened("alice", "U1", release, booking, "Release parking"))
        .await;
}

async fn submit_dates(h: &mut Harness, release: &str, start: &str, end: &str) {
    h.send(submit(
        "alice",
        "U1",
        release,
        "Release parking",
        form(&[(ids::RELEASE_START_DATE, start), (ids::RELEASE_END_DATE, end)]),
    ))
    .await;
}

async fn release_count(h: &Harness) -> usize {
    h.parking.lock().await.to_be_released.releases().count()
}

async fn cancel_value(h: &Harness) -> String {
    let lot = h.parking.lock().await;
    let value = views::release_value(lot.to_be_released.releases().next().unwrap());
    value
}

#[tokio::test]
async fn scheduled_release_lends_and_returns_the_space() {
    let mut h = Harness::new();
    draft(&mut h, "B1", "R1").await;

    let modal = h.responses.pushed_modal().unwrap();
    assert_eq!(modal.title, "Release parking");
    assert!(modal.text().contains("Release 1st floor 10 of alice"));

    h.send(pick_date("alice", "U1", "R1", "Release parking", ids::RELEASE_START_DATE, "2025-03-10"))
        .await;
    assert!(h.responses.update_of("R1").unwrap().1.is_some());
    h.send(pick_date("alice", "U1", "R1", "Release parking", ids::RELEASE_END_DATE, "2025-03-12"))
        .await;
    assert_eq!(h.responses.update_of("R1").unwrap().1, None);

    submit_dates(&mut h, "R1", "2025-03-10", "2025-03-12").await;
    assert_eq!(
        h.responses.ephemerals_to("U1"),
        vec!["1st floor 10 is released for 2025-03-10 -> 2025-03-12. It becomes free at 17:00 the day before.".to_string()]
    );
    let (booking, _) = h.responses.update_of("B1").unwrap();
    assert!(booking
        .text()
        .contains("1st floor 10: 2025-03-10 -> 2025-03-12 (scheduled)"));
    assert_eq!(h.parking.lock().await.space(SPACE).unwrap().reserved_by_id, "U1");

    // Sunday's cutoff hands the space over for Monday.
    let sunday = datetime(2025, 3, 9, 17, 0);
    h.clock.set(sunday);
    h.send(timer("Reset parking status", sunday)).await;
    {
        let lot = h.parking.lock().await;
        assert!(!lot.space(SPACE).unwrap().reserved);
        assert!(lot.has_temp_release("U1"));
    }

    h.clock.set(datetime(2025, 3, 10, 9, 0));
    h.send(click("bob", "U2", "V2", "Parking", ids::RESERVE_SPACE, SPACE))
        .await;
    assert_eq!(h.parking.lock().await.space(SPACE).unwrap().reserved_by_id, "U2");

    // Cancelled while borrowed: alice gets it back at today's cutoff.
    h.clock.set(datetime(2025, 3, 10, 10, 0));
    let value = cancel_value(&h).await;
    h.send(click("alice", "U1", "B1", "Parking", ids::CANCEL_TEMP_RELEASE, &value))
        .await;
    assert_eq!(
        h.responses.ephemerals_to("U1").last().unwrap(),
        "1st floor 10 is currently used by bob. The release was cancelled and the space will come back to you today at 17:00."
    );
    assert_eq!(h.parking.lock().await.space(SPACE).unwrap().reserved_by_id, "U2");

    let monday = datetime(2025, 3, 10, 17, 0);
    h.clock.set(monday);
    h.send(timer("Reset parking status", monday)).await;
    let lot = h.parking.lock().await;
    let space = lot.space(SPACE).unwrap();
    assert_eq!(space.reserved_by_id, "U1");
    assert!(!space.auto_release);
    assert_eq!(lot.to_be_released.releases().count(), 0);
}

#[tokio::test]
async fn release_starting_today_frees_the_space_at_once() {
    let mut h = Harness::new();
    draft(&mut h, "B1", "R1").await;
    submit_dates(&mut h, "R1", "2025-03-05", "2025-03-06").await;

    assert_eq!(
        h.responses.ephemerals_to("U1"),
        vec!["1st floor 10 is released for 2025-03-05 -> 2025-03-06 and is free from now on.".to_string()]
    );
    assert!(!h.parking.lock().await.space(SPACE).unwrap().reserved);

    // Nobody took it yet, so cancelling restores it right away.
    let value = cancel_value(&h).await;
    h.send(click("alice", "U1", "B1", "Parking", ids::CANCEL_TEMP_RELEASE, &value))
        .await;
    assert_eq!(
        h.responses.ephemerals_to("U1").last().unwrap(),
        "The temporary release of 1st floor 10 was cancelled, the space is yours again."
    );
    assert_eq!(h.parking.lock().await.space(SPACE).unwrap().reserved_by_id, "U1");
    assert_eq!(release_count(&h).await, 0);
}

#[tokio::test]
async fn release_starting_tomorrow_after_cutoff_frees_the_space_at_once() {
    let mut h = Harness::new();
    h.clock.set(datetime(2025, 3, 5, 18, 0));
    draft(&mut h, "B1", "R1").await;
    submit_dates(&mut h, "R1", "2025-03-06", "2025-03-07").await;
    assert!(!h.parking.lock().await.space(SPACE).unwrap().reserved);
}

#[tokio::test]
async fn invalid_dates_drop_the_draft() {
    let mut h = Harness::new();
    draft(&mut h, "B1", "R1").await;
    submit_dates(&mut h, "R1", "2025-03-01", "2025-03-02").await;

    assert_eq!(h.responses.ephemerals_to("U1").len(), 1);
    assert_eq!(release_count(&h).await, 0);
    assert!(h.parking.lock().await.space(SPACE).unwrap().reserved);
    assert!(h.responses.update_of("B1").is_some());
}

#[tokio::test]
async fn overlapping_release_is_refused() {
    let mut h = Harness::new();
    draft(&mut h, "B1", "R1").await;
    submit_dates(&mut h, "R1", "2025-03-10", "2025-03-12").await;
    draft(&mut h, "B2", "R2").await;
    submit_dates(&mut h, "R2", "2025-03-11", "2025-03-14").await;

    let last = h.responses.ephemerals_to("U1").pop().unwrap();
    assert!(last.contains("2025-03-10 -> 2025-03-12"), "{last}");
    assert_eq!(release_count(&h).await, 1);
}

#[tokio::test]
async fn closing_the_release_modal_discards_the_draft() {
    let mut h = Harness::new();
    draft(&mut h, "B1", "R1").await;
    assert_eq!(release_count(&h).await, 1);

    h.send(closed("alice", "U1", "R1", "Release parking")).await;
    assert_eq!(release_count(&h).await, 0);
}

#[tokio::test]
async fn picking_a_date_for_a_stale_modal_is_reported() {
    let mut h = Harness::new();
    h.send(pick_date("alice", "U1", "R9", "Release parking", ids::RELEASE_START_DATE, "2025-03-10"))
        .await;
    assert_eq!(
        h.responses.ephemerals_to("U1"),
        vec!["This release request is no longer open, please start again".to_string()]
    );
}

#[tokio::test]
async fn only_the_owner_or_an_admin_may_release() {
    let mut h = Harness::new();
    h.send(click("bob", "U2", "B2", "Parking", ids::TEMP_RELEASE_SPACE, SPACE))
        .await;
    let (_, err) = h.responses.update_of("B2").unwrap();
    assert_eq!(err.as_deref(), Some("Only the owner of 1st floor 10 can release it"));
    assert!(h.responses.pushed_modal().is_none());

    h.send(click("admin", "U0", "B0", "Parking", ids::TEMP_RELEASE_SPACE, SPACE))
        .await;
    assert!(h.responses.pushed_modal().is_some());
    let lot = h.parking.lock().await;
    let info = lot.to_be_released.releases().next().unwrap();
    assert_eq!(info.owner_id, "U1");
    assert_eq!(info.releaser_id, "U0");
}

#[tokio::test]
async fn owner_needs_permanent_parking_rights() {
    let mut h = Harness::new();
    h.roster
        .lock()
        .await
        .set_parking_permission("U1", false)
        .unwrap();
    h.send(click("alice", "U1", "B1", "Parking", ids::TEMP_RELEASE_SPACE, SPACE))
        .await;
    let (_, err) = h.responses.update_of("B1").unwrap();
    assert_eq!(
        err.as_deref(),
        Some("alice has no permanent parking space to release")
    );
    assert_eq!(release_count(&h).await, 0);
}

#[tokio::test]
async fn strangers_cannot_cancel() {
    let mut h = Harness::new();
    draft(&mut h, "B1", "R1").await;
    submit_dates(&mut h, "R1", "2025-03-10", "2025-03-12").await;

    let value = cancel_value(&h).await;
    h.send(click("bob", "U2", "B2", "Parking", ids::CANCEL_TEMP_RELEASE, &value))
        .await;
    let (_, err) = h.responses.update_of("B2").unwrap();
    assert_eq!(err.as_deref(), Some("Only alice can cancel this release"));
    assert_eq!(release_count(&h).await, 1);
}

#[tokio::test]
async fn admin_release_purges_scheduled_releases() {
    let mut h = Harness::new();
    draft(&mut h, "B1", "R1").await;
    submit_dates(&mut h, "R1", "2025-03-10", "2025-03-12").await;

    h.send(click("admin", "U0", "B0", "Parking", ids::RELEASE_SPACE, SPACE))
        .await;
    assert_eq!(release_count(&h).await, 0);
    assert!(!h.parking.lock().await.space(SPACE).unwrap().reserved);
}
