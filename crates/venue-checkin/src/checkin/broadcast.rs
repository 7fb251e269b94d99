use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use super::domain::{StatusSnapshot, StatusSummary, VenueId, VenueStatus, VenueView};
use super::queue::QueueManager;
use super::registry::{StatusListener, VenueRegistry};

/// Aggregates current venue and queue state into summaries for polling
/// clients. Snapshots are recomputed from the source entities on every call;
/// there is no cached aggregate that can drift.
pub struct StatusBroadcaster {
    registry: Arc<VenueRegistry>,
    queues: Arc<QueueManager>,
    revision: AtomicU64,
}

impl StatusBroadcaster {
    pub fn new(registry: Arc<VenueRegistry>, queues: Arc<QueueManager>) -> Self {
        Self {
            registry,
            queues,
            revision: AtomicU64::new(0),
        }
    }

    /// Point-in-time view of every venue plus aggregate counters.
    ///
    /// `total_waiting` is summed from the per-venue counts gathered in the
    /// same pass, so it always equals the sum of the returned
    /// `waiting_count` fields. Each venue is read under its own brief lock;
    /// the view is internally consistent but may trail concurrent writers.
    pub fn snapshot(&self) -> StatusSnapshot {
        let venues: Vec<VenueView> = self
            .registry
            .snapshots()
            .into_iter()
            .map(|venue| {
                let waiting_count = self.queues.waiting_count(&venue.id);
                VenueView {
                    venue_id: venue.id,
                    name: venue.name,
                    venue_type: venue.venue_type,
                    status: venue.status,
                    capacity: venue.capacity,
                    waiting_count,
                    current_occupant: venue.current_occupant,
                    updated_at: venue.updated_at,
                }
            })
            .collect();

        let summary = StatusSummary {
            total_venues: venues.len(),
            active_venues: venues
                .iter()
                .filter(|view| view.status.in_service())
                .count(),
            total_waiting: venues.iter().map(|view| view.waiting_count).sum(),
        };

        StatusSnapshot {
            venues,
            summary,
            revision: self.revision.load(Ordering::Acquire),
            generated_at: Utc::now(),
        }
    }
}

impl StatusListener for StatusBroadcaster {
    fn venue_changed(&self, _venue_id: &VenueId, _status: VenueStatus) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }
}
