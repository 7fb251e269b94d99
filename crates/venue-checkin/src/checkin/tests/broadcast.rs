use super::common::*;
use crate::checkin::coordinator::CheckinRequest;
use crate::checkin::domain::{Role, VenueStatus};

fn manual(candidate_id: &str, schedule_id: &str) -> CheckinRequest {
    CheckinRequest::Manual {
        candidate_id: candidate(candidate_id),
        schedule_id: schedule(schedule_id),
    }
}

#[test]
fn summary_counts_match_the_returned_views() {
    let (app, _ledger) = build_app();
    app.registry
        .register(definition("v-1", "Practical Bay 1"))
        .expect("registration succeeds");
    app.registry
        .register(definition("v-2", "Theory Room 1"))
        .expect("registration succeeds");
    app.registry
        .set_status(&venue("v-2"), VenueStatus::Maintenance)
        .expect("maintenance transition succeeds");

    app.coordinator
        .perform_checkin(manual("c-1", "s-1"), &venue("v-1"), Role::Staff)
        .expect("occupant claims the venue");
    app.coordinator
        .perform_checkin(manual("c-2", "s-2"), &venue("v-1"), Role::Staff)
        .expect("second candidate queues");

    let snapshot = app.broadcaster.snapshot();
    assert_eq!(snapshot.summary.total_venues, 2);
    assert_eq!(snapshot.summary.active_venues, 1);
    assert_eq!(snapshot.summary.total_waiting, 1);
    assert_eq!(
        snapshot.summary.total_waiting,
        snapshot
            .venues
            .iter()
            .map(|view| view.waiting_count)
            .sum::<usize>()
    );
}

#[test]
fn views_are_ordered_by_venue_id() {
    let (app, _ledger) = build_app();
    app.registry
        .register(definition("v-2", "Theory Room 1"))
        .expect("registration succeeds");
    app.registry
        .register(definition("v-1", "Practical Bay 1"))
        .expect("registration succeeds");

    let snapshot = app.broadcaster.snapshot();
    let ids: Vec<&str> = snapshot
        .venues
        .iter()
        .map(|view| view.venue_id.0.as_str())
        .collect();
    assert_eq!(ids, ["v-1", "v-2"]);
}

#[test]
fn revision_advances_with_every_status_change() {
    let (app, _ledger) = build_app();
    app.registry
        .register(definition("v-1", "Practical Bay 1"))
        .expect("registration succeeds");

    let before = app.broadcaster.snapshot().revision;
    app.registry
        .set_status(&venue("v-1"), VenueStatus::Maintenance)
        .expect("maintenance transition succeeds");
    app.registry
        .set_status(&venue("v-1"), VenueStatus::Available)
        .expect("available transition succeeds");
    let after = app.broadcaster.snapshot().revision;

    assert_eq!(after, before + 2);
}

#[test]
fn redacted_snapshot_hides_occupants() {
    let (app, _ledger) = build_app();
    app.registry
        .register(definition("v-1", "Practical Bay 1"))
        .expect("registration succeeds");
    app.coordinator
        .perform_checkin(manual("c-1", "s-1"), &venue("v-1"), Role::Staff)
        .expect("occupant claims the venue");

    let full = app.broadcaster.snapshot();
    assert_eq!(full.venues[0].current_occupant, Some(candidate("c-1")));

    let public = app.broadcaster.snapshot().redacted();
    assert!(public.venues[0].current_occupant.is_none());
    assert_eq!(public.venues[0].waiting_count, 0);
}
