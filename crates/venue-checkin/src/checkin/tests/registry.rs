use std::sync::{Arc, Mutex};

use super::common::*;
use crate::checkin::coordinator::CheckinRequest;
use crate::checkin::domain::{Role, VenueId, VenueStatus};
use crate::checkin::registry::{RegistryError, StatusListener, VenueRegistry};

struct RecordingListener {
    events: Mutex<Vec<(VenueId, VenueStatus)>>,
}

impl StatusListener for RecordingListener {
    fn venue_changed(&self, venue_id: &VenueId, status: VenueStatus) {
        self.events
            .lock()
            .expect("listener mutex poisoned")
            .push((venue_id.clone(), status));
    }
}

#[test]
fn register_rejects_zero_capacity() {
    let registry = VenueRegistry::new();
    let mut bad = definition("v-1", "Theory Room 1");
    bad.capacity = 0;
    assert_eq!(registry.register(bad), Err(RegistryError::ZeroCapacity));
}

#[test]
fn register_rejects_duplicate_ids() {
    let registry = VenueRegistry::new();
    registry
        .register(definition("v-1", "Theory Room 1"))
        .expect("first registration succeeds");
    assert_eq!(
        registry.register(definition("v-1", "Theory Room 1 again")),
        Err(RegistryError::AlreadyRegistered)
    );
}

#[test]
fn fresh_venues_start_available() {
    let registry = VenueRegistry::new();
    let venue = registry
        .register(definition("v-1", "Theory Room 1"))
        .expect("registration succeeds");
    assert_eq!(venue.status, VenueStatus::Available);
    assert!(venue.current_occupant.is_none());
}

#[test]
fn occupied_cannot_be_set_administratively() {
    let registry = VenueRegistry::new();
    registry
        .register(definition("v-1", "Theory Room 1"))
        .expect("registration succeeds");
    assert_eq!(
        registry.set_status(&venue("v-1"), VenueStatus::Occupied),
        Err(RegistryError::OccupiedIsDerived)
    );
}

#[test]
fn disabled_venues_reject_all_transitions() {
    let registry = VenueRegistry::new();
    registry
        .register(definition("v-1", "Theory Room 1"))
        .expect("registration succeeds");
    registry
        .set_status(&venue("v-1"), VenueStatus::Disabled)
        .expect("disable succeeds");
    assert_eq!(
        registry.set_status(&venue("v-1"), VenueStatus::Available),
        Err(RegistryError::VenueDisabled)
    );
}

#[test]
fn maintenance_round_trip_notifies_listeners() {
    let registry = VenueRegistry::new();
    let listener = Arc::new(RecordingListener {
        events: Mutex::new(Vec::new()),
    });
    registry.subscribe(listener.clone());

    registry
        .register(definition("v-1", "Theory Room 1"))
        .expect("registration succeeds");
    registry
        .set_status(&venue("v-1"), VenueStatus::Maintenance)
        .expect("maintenance transition succeeds");
    registry
        .set_status(&venue("v-1"), VenueStatus::Available)
        .expect("available transition succeeds");

    let events = listener.events.lock().expect("listener mutex poisoned");
    assert_eq!(
        events.as_slice(),
        &[
            (venue("v-1"), VenueStatus::Maintenance),
            (venue("v-1"), VenueStatus::Available),
        ]
    );
}

#[test]
fn status_change_rejected_while_occupied() {
    let (app, _ledger) = build_app();
    app.registry
        .register(definition("v-1", "Theory Room 1"))
        .expect("registration succeeds");
    app.coordinator
        .perform_checkin(
            CheckinRequest::Manual {
                candidate_id: candidate("c-1"),
                schedule_id: schedule("s-1"),
            },
            &venue("v-1"),
            Role::Staff,
        )
        .expect("manual check-in succeeds");

    assert_eq!(
        app.registry
            .set_status(&venue("v-1"), VenueStatus::Maintenance),
        Err(RegistryError::OccupantPresent)
    );
}

#[test]
fn get_returns_not_found_for_unknown_venue() {
    let registry = VenueRegistry::new();
    assert_eq!(registry.get(&venue("missing")), Err(RegistryError::NotFound));
}
