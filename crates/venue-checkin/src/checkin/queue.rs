use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;

use super::domain::{CandidateId, QueueEntry, ScheduleId, VenueId};

/// Error enumeration for queue operations.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("candidate is already waiting in a queue")]
    AlreadyQueued,
    #[error("queue is empty")]
    EmptyQueue,
    #[error("candidate is not waiting in this queue")]
    NotFound,
}

/// Per-venue FIFO waiting lists.
///
/// A candidate holds at most one queue membership system-wide, enforced by an
/// atomic check-and-insert on the membership index. Each venue's lane has its
/// own lock; the index lock is never held across a lane lock.
#[derive(Default)]
pub struct QueueManager {
    lanes: RwLock<HashMap<VenueId, Arc<Mutex<VecDeque<QueueEntry>>>>>,
    members: Mutex<HashMap<CandidateId, VenueId>>,
    seq: AtomicU64,
}

impl QueueManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lane(&self, venue_id: &VenueId) -> Arc<Mutex<VecDeque<QueueEntry>>> {
        if let Some(lane) = self
            .lanes
            .read()
            .expect("queue lock poisoned")
            .get(venue_id)
        {
            return lane.clone();
        }

        self.lanes
            .write()
            .expect("queue lock poisoned")
            .entry(venue_id.clone())
            .or_default()
            .clone()
    }

    /// Append a candidate to the venue's queue, returning the 1-based
    /// position. Fails with `AlreadyQueued` if the candidate is waiting
    /// anywhere, rather than silently moving them.
    pub fn enqueue(
        &self,
        venue_id: &VenueId,
        candidate_id: &CandidateId,
        schedule_id: &ScheduleId,
    ) -> Result<usize, QueueError> {
        {
            let mut members = self.members.lock().expect("member index poisoned");
            if members.contains_key(candidate_id) {
                return Err(QueueError::AlreadyQueued);
            }
            members.insert(candidate_id.clone(), venue_id.clone());
        }

        let lane = self.lane(venue_id);
        let mut lane = lane.lock().expect("queue lane poisoned");
        lane.push_back(QueueEntry {
            venue_id: venue_id.clone(),
            candidate_id: candidate_id.clone(),
            schedule_id: schedule_id.clone(),
            enqueued_at: Utc::now(),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        });
        Ok(lane.len())
    }

    /// Pop the longest-waiting entry for the venue.
    pub fn dequeue_front(&self, venue_id: &VenueId) -> Result<QueueEntry, QueueError> {
        let lane = self.lane(venue_id);
        let entry = lane
            .lock()
            .expect("queue lane poisoned")
            .pop_front()
            .ok_or(QueueError::EmptyQueue)?;

        self.members
            .lock()
            .expect("member index poisoned")
            .remove(&entry.candidate_id);
        Ok(entry)
    }

    /// Restore an entry to the head of its lane. Used to unwind a promotion
    /// whose audit write could not be completed.
    pub(crate) fn requeue_front(&self, entry: QueueEntry) {
        {
            let mut members = self.members.lock().expect("member index poisoned");
            members.insert(entry.candidate_id.clone(), entry.venue_id.clone());
        }
        let lane = self.lane(&entry.venue_id);
        lane.lock().expect("queue lane poisoned").push_front(entry);
    }

    /// Explicit cancellation of a waiting candidate.
    pub fn remove(&self, venue_id: &VenueId, candidate_id: &CandidateId) -> Result<(), QueueError> {
        let lane = self.lane(venue_id);
        {
            let mut lane = lane.lock().expect("queue lane poisoned");
            let index = lane
                .iter()
                .position(|entry| &entry.candidate_id == candidate_id)
                .ok_or(QueueError::NotFound)?;
            lane.remove(index);
        }

        self.members
            .lock()
            .expect("member index poisoned")
            .remove(candidate_id);
        Ok(())
    }

    /// 1-based rank of the candidate in the venue's queue, recomputed from
    /// the FIFO order on every call so it never drifts after removals.
    pub fn position(&self, venue_id: &VenueId, candidate_id: &CandidateId) -> Result<usize, QueueError> {
        let lane = self.lane(venue_id);
        let lane = lane.lock().expect("queue lane poisoned");
        lane.iter()
            .position(|entry| &entry.candidate_id == candidate_id)
            .map(|index| index + 1)
            .ok_or(QueueError::NotFound)
    }

    /// Which venue, if any, the candidate is currently waiting for.
    pub fn locate(&self, candidate_id: &CandidateId) -> Option<VenueId> {
        self.members
            .lock()
            .expect("member index poisoned")
            .get(candidate_id)
            .cloned()
    }

    pub fn waiting_count(&self, venue_id: &VenueId) -> usize {
        match self
            .lanes
            .read()
            .expect("queue lock poisoned")
            .get(venue_id)
        {
            Some(lane) => lane.lock().expect("queue lane poisoned").len(),
            None => 0,
        }
    }
}
