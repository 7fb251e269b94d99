use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use super::domain::{
    CandidateId, CheckinMethod, CheckinOutcome, CheckinProgress, CheckinRecord, CheckinResult,
    ReleaseOutcome, Role, ScheduleId, VenueId, VenueStatus,
};
use super::ledger::{CheckinLedger, LedgerError};
use super::queue::QueueManager;
use super::registry::VenueRegistry;
use super::token::{QrTokenService, TokenError};

const LEDGER_RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Identity presented at the venue: a scanned token, or a staff-entered
/// candidate/schedule pair.
#[derive(Debug, Clone)]
pub enum CheckinRequest {
    Token { raw: String },
    Manual {
        candidate_id: CandidateId,
        schedule_id: ScheduleId,
    },
}

/// Error raised by the check-in coordinator.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("manual check-in requires the staff role")]
    StaffOnly,
    #[error("venue is not accepting check-ins")]
    VenueUnavailable,
    #[error("candidate is already waiting in a queue")]
    AlreadyQueued,
    #[error("candidate has already checked in for this schedule")]
    AlreadyCheckedIn,
    #[error("venue has no current occupant")]
    NotOccupied,
    #[error("venue not found")]
    VenueNotFound,
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// State machine validating check-in events and transitioning venue, queue,
/// and candidate state atomically.
///
/// Each check-in or release runs inside the target venue's exclusive cell;
/// operations on different venues never contend. Lock order is always venue
/// cell, then queue structures, then the progress map.
pub struct CheckinCoordinator<L: CheckinLedger> {
    registry: Arc<VenueRegistry>,
    queues: Arc<QueueManager>,
    tokens: Arc<QrTokenService>,
    ledger: Arc<L>,
    progress: Mutex<HashMap<(CandidateId, ScheduleId), CheckinProgress>>,
}

impl<L: CheckinLedger> CheckinCoordinator<L> {
    pub fn new(
        registry: Arc<VenueRegistry>,
        queues: Arc<QueueManager>,
        tokens: Arc<QrTokenService>,
        ledger: Arc<L>,
    ) -> Self {
        Self {
            registry,
            queues,
            tokens,
            ledger,
            progress: Mutex::new(HashMap::new()),
        }
    }

    /// Validate a check-in event and claim a slot or a queue position.
    ///
    /// The venue mutation, the queue mutation, and the audit append happen
    /// under the venue's critical section; a failure leaves no partial state
    /// behind. Rejections are ledgered whenever the candidate is known.
    pub fn perform_checkin(
        &self,
        request: CheckinRequest,
        venue_id: &VenueId,
        caller: Role,
    ) -> Result<CheckinOutcome, CoordinatorError> {
        let (candidate_id, schedule_id, method) = match request {
            CheckinRequest::Token { raw } => match self.tokens.validate_and_consume(&raw) {
                Ok((candidate_id, schedule_id)) => {
                    (candidate_id, schedule_id, CheckinMethod::QrCode)
                }
                Err(err) => {
                    match &err {
                        TokenError::Expired {
                            candidate_id,
                            schedule_id,
                        }
                        | TokenError::AlreadyConsumed {
                            candidate_id,
                            schedule_id,
                        } => {
                            self.record_rejection(
                                candidate_id,
                                venue_id,
                                schedule_id,
                                CheckinMethod::QrCode,
                                &err.to_string(),
                            );
                        }
                        TokenError::Unknown => {
                            warn!(venue = %venue_id.0, "unrecognized check-in token presented");
                        }
                    }
                    return Err(err.into());
                }
            },
            CheckinRequest::Manual {
                candidate_id,
                schedule_id,
            } => {
                if caller != Role::Staff {
                    self.record_rejection(
                        &candidate_id,
                        venue_id,
                        &schedule_id,
                        CheckinMethod::Manual,
                        "manual check-in requires the staff role",
                    );
                    return Err(CoordinatorError::StaffOnly);
                }
                (candidate_id, schedule_id, CheckinMethod::Manual)
            }
        };

        if self.progress_of(&candidate_id, &schedule_id) == Some(CheckinProgress::CheckedIn) {
            self.record_rejection(
                &candidate_id,
                venue_id,
                &schedule_id,
                method,
                "candidate has already checked in for this schedule",
            );
            return Err(CoordinatorError::AlreadyCheckedIn);
        }

        let cell = match self.registry.cell(venue_id) {
            Ok(cell) => cell,
            Err(_) => {
                self.record_rejection(
                    &candidate_id,
                    venue_id,
                    &schedule_id,
                    method,
                    "unknown venue",
                );
                return Err(CoordinatorError::VenueNotFound);
            }
        };

        let outcome = {
            let mut venue = cell.lock();

            if !venue.status.in_service() {
                drop(venue);
                self.record_rejection(
                    &candidate_id,
                    venue_id,
                    &schedule_id,
                    method,
                    "venue is not accepting check-ins",
                );
                return Err(CoordinatorError::VenueUnavailable);
            }

            if venue.current_occupant.is_none() {
                self.append_with_retry(CheckinRecord {
                    candidate_id: candidate_id.clone(),
                    venue_id: venue_id.clone(),
                    schedule_id: schedule_id.clone(),
                    timestamp: Utc::now(),
                    result: CheckinResult::Success,
                    method,
                    detail: None,
                })?;

                venue.status = VenueStatus::Occupied;
                venue.current_occupant = Some(candidate_id.clone());
                venue.updated_at = Utc::now();
                self.set_progress(&candidate_id, &schedule_id, CheckinProgress::CheckedIn);
                CheckinOutcome::CheckedIn {
                    venue: venue.clone(),
                }
            } else {
                let position = match self.queues.enqueue(venue_id, &candidate_id, &schedule_id) {
                    Ok(position) => position,
                    Err(_) => {
                        drop(venue);
                        self.record_rejection(
                            &candidate_id,
                            venue_id,
                            &schedule_id,
                            method,
                            "candidate is already waiting in a queue",
                        );
                        return Err(CoordinatorError::AlreadyQueued);
                    }
                };

                if let Err(err) = self.append_with_retry(CheckinRecord {
                    candidate_id: candidate_id.clone(),
                    venue_id: venue_id.clone(),
                    schedule_id: schedule_id.clone(),
                    timestamp: Utc::now(),
                    result: CheckinResult::Queued,
                    method,
                    detail: None,
                }) {
                    let _ = self.queues.remove(venue_id, &candidate_id);
                    return Err(err);
                }

                self.set_progress(&candidate_id, &schedule_id, CheckinProgress::Queued);
                CheckinOutcome::Queued {
                    venue: venue.clone(),
                    position,
                }
            }
        };

        if matches!(outcome, CheckinOutcome::CheckedIn { .. }) {
            self.registry.notify(venue_id, VenueStatus::Occupied);
        }
        Ok(outcome)
    }

    /// Release a venue after its occupant finishes, promoting the queue
    /// front if one is waiting. Runs under the same venue critical section
    /// as check-ins, so a promotion can never race a fresh walk-in.
    pub fn release(&self, venue_id: &VenueId) -> Result<ReleaseOutcome, CoordinatorError> {
        let cell = self
            .registry
            .cell(venue_id)
            .map_err(|_| CoordinatorError::VenueNotFound)?;

        let (outcome, new_status) = {
            let mut venue = cell.lock();
            if venue.current_occupant.is_none() {
                return Err(CoordinatorError::NotOccupied);
            }

            match self.queues.dequeue_front(venue_id) {
                Ok(entry) => {
                    if let Err(err) = self.append_with_retry(CheckinRecord {
                        candidate_id: entry.candidate_id.clone(),
                        venue_id: venue_id.clone(),
                        schedule_id: entry.schedule_id.clone(),
                        timestamp: Utc::now(),
                        result: CheckinResult::Success,
                        method: CheckinMethod::Promotion,
                        detail: None,
                    }) {
                        self.queues.requeue_front(entry);
                        return Err(err);
                    }

                    venue.current_occupant = Some(entry.candidate_id.clone());
                    venue.updated_at = Utc::now();
                    self.set_progress(
                        &entry.candidate_id,
                        &entry.schedule_id,
                        CheckinProgress::CheckedIn,
                    );
                    (
                        ReleaseOutcome::Promoted {
                            venue: venue.clone(),
                            candidate_id: entry.candidate_id,
                        },
                        VenueStatus::Occupied,
                    )
                }
                Err(_) => {
                    venue.current_occupant = None;
                    venue.status = VenueStatus::Available;
                    venue.updated_at = Utc::now();
                    (
                        ReleaseOutcome::Vacated {
                            venue: venue.clone(),
                        },
                        VenueStatus::Available,
                    )
                }
            }
        };

        self.registry.notify(venue_id, new_status);
        Ok(outcome)
    }

    /// Current queue placement for a candidate, if any.
    pub fn queue_position(&self, candidate_id: &CandidateId) -> Option<(VenueId, usize)> {
        let venue_id = self.queues.locate(candidate_id)?;
        let position = self.queues.position(&venue_id, candidate_id).ok()?;
        Some((venue_id, position))
    }

    pub fn progress_of(
        &self,
        candidate_id: &CandidateId,
        schedule_id: &ScheduleId,
    ) -> Option<CheckinProgress> {
        self.progress
            .lock()
            .expect("progress map poisoned")
            .get(&(candidate_id.clone(), schedule_id.clone()))
            .copied()
    }

    fn set_progress(
        &self,
        candidate_id: &CandidateId,
        schedule_id: &ScheduleId,
        progress: CheckinProgress,
    ) {
        self.progress
            .lock()
            .expect("progress map poisoned")
            .insert((candidate_id.clone(), schedule_id.clone()), progress);
    }

    /// Append an audit record, retrying once with a short backoff when the
    /// ledger reports a transient outage. Conflict and validation failures
    /// never reach this path.
    fn append_with_retry(&self, record: CheckinRecord) -> Result<(), CoordinatorError> {
        match self.ledger.append(record.clone()) {
            Ok(()) => Ok(()),
            Err(LedgerError::Unavailable(_)) => {
                std::thread::sleep(LEDGER_RETRY_BACKOFF);
                self.ledger.append(record).map_err(CoordinatorError::from)
            }
        }
    }

    /// Ledger a rejection for audit. Rejection logging is best-effort: a
    /// ledger outage here must not mask the original failure returned to the
    /// caller.
    fn record_rejection(
        &self,
        candidate_id: &CandidateId,
        venue_id: &VenueId,
        schedule_id: &ScheduleId,
        method: CheckinMethod,
        detail: &str,
    ) {
        let record = CheckinRecord {
            candidate_id: candidate_id.clone(),
            venue_id: venue_id.clone(),
            schedule_id: schedule_id.clone(),
            timestamp: Utc::now(),
            result: CheckinResult::Rejected,
            method,
            detail: Some(detail.to_string()),
        };

        if let Err(err) = self.append_with_retry(record) {
            warn!(
                venue = %venue_id.0,
                candidate = %candidate_id.0,
                error = %err,
                "failed to ledger a check-in rejection"
            );
        }

        let mut progress = self.progress.lock().expect("progress map poisoned");
        let key = (candidate_id.clone(), schedule_id.clone());
        match progress.get(&key) {
            Some(CheckinProgress::Queued) | Some(CheckinProgress::CheckedIn) => {}
            _ => {
                progress.insert(key, CheckinProgress::Rejected);
            }
        }
    }
}
