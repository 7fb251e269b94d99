use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::Utc;

use super::domain::{Venue, VenueDefinition, VenueId, VenueStatus};

/// Observer notified after every venue status change.
///
/// Listeners run outside the venue's critical section and must not call back
/// into the registry.
pub trait StatusListener: Send + Sync {
    fn venue_changed(&self, venue_id: &VenueId, status: VenueStatus);
}

/// Error enumeration for registry operations.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("venue not found")]
    NotFound,
    #[error("venue is already registered")]
    AlreadyRegistered,
    #[error("venue capacity must be at least 1")]
    ZeroCapacity,
    #[error("occupied status is driven by check-in and cannot be set directly")]
    OccupiedIsDerived,
    #[error("disabled venues do not accept status transitions")]
    VenueDisabled,
    #[error("venue has an occupant; release it before changing status")]
    OccupantPresent,
}

/// Single-writer cell holding one venue's mutable state.
///
/// The coordinator locks a cell for the whole of a check-in or release so
/// occupancy and queue mutations for that venue are serialized.
pub struct VenueCell {
    state: Mutex<Venue>,
}

impl VenueCell {
    fn new(venue: Venue) -> Self {
        Self {
            state: Mutex::new(venue),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Venue> {
        self.state.lock().expect("venue mutex poisoned")
    }

    pub fn snapshot(&self) -> Venue {
        self.lock().clone()
    }
}

/// Holds canonical venue records; per-venue mutation is serialized while
/// reads take brief shared sections and may observe a slightly stale view.
#[derive(Default)]
pub struct VenueRegistry {
    cells: RwLock<HashMap<VenueId, Arc<VenueCell>>>,
    listeners: Mutex<Vec<Arc<dyn StatusListener>>>,
}

impl VenueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn StatusListener>) {
        self.listeners
            .lock()
            .expect("listener mutex poisoned")
            .push(listener);
    }

    /// Register a new venue. Freshly registered venues start `Available`.
    pub fn register(&self, definition: VenueDefinition) -> Result<Venue, RegistryError> {
        if definition.capacity == 0 {
            return Err(RegistryError::ZeroCapacity);
        }

        let venue = Venue {
            id: definition.id.clone(),
            name: definition.name,
            venue_type: definition.venue_type,
            capacity: definition.capacity,
            status: VenueStatus::Available,
            current_occupant: None,
            updated_at: Utc::now(),
        };

        let mut cells = self.cells.write().expect("registry lock poisoned");
        if cells.contains_key(&definition.id) {
            return Err(RegistryError::AlreadyRegistered);
        }
        cells.insert(definition.id, Arc::new(VenueCell::new(venue.clone())));
        Ok(venue)
    }

    pub fn get(&self, venue_id: &VenueId) -> Result<Venue, RegistryError> {
        Ok(self.cell(venue_id)?.snapshot())
    }

    pub(crate) fn cell(&self, venue_id: &VenueId) -> Result<Arc<VenueCell>, RegistryError> {
        self.cells
            .read()
            .expect("registry lock poisoned")
            .get(venue_id)
            .cloned()
            .ok_or(RegistryError::NotFound)
    }

    /// Administrative status change between `Available`, `Maintenance`, and
    /// `Disabled`. Occupancy transitions belong to the coordinator: setting
    /// `Occupied` here is rejected, as is any transition on a disabled venue
    /// or away from a venue that still has an occupant.
    pub fn set_status(&self, venue_id: &VenueId, status: VenueStatus) -> Result<Venue, RegistryError> {
        let cell = self.cell(venue_id)?;
        let updated = {
            let mut venue = cell.lock();
            if venue.status == VenueStatus::Disabled {
                return Err(RegistryError::VenueDisabled);
            }
            if status == VenueStatus::Occupied {
                return Err(RegistryError::OccupiedIsDerived);
            }
            if venue.current_occupant.is_some() {
                return Err(RegistryError::OccupantPresent);
            }
            venue.status = status;
            venue.updated_at = Utc::now();
            venue.clone()
        };

        self.notify(&updated.id, updated.status);
        Ok(updated)
    }

    /// Clone a snapshot of every venue, ordered by id for stable output.
    pub fn snapshots(&self) -> Vec<Venue> {
        let cells: Vec<Arc<VenueCell>> = self
            .cells
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect();

        let mut venues: Vec<Venue> = cells.iter().map(|cell| cell.snapshot()).collect();
        venues.sort_by(|a, b| a.id.cmp(&b.id));
        venues
    }

    pub(crate) fn notify(&self, venue_id: &VenueId, status: VenueStatus) {
        let listeners = self.listeners.lock().expect("listener mutex poisoned");
        for listener in listeners.iter() {
            listener.venue_changed(venue_id, status);
        }
    }
}
