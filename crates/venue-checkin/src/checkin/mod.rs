//! Venue occupancy, waiting queues, and scan-based check-in coordination.
//!
//! Control flow: the token service issues a short-lived token to a candidate,
//! the candidate presents it at a venue, the coordinator validates it and
//! mutates the registry and queues atomically, and the broadcaster exposes
//! the updated aggregate to polling clients.

pub mod broadcast;
pub mod coordinator;
pub mod domain;
pub mod ledger;
pub mod queue;
pub mod registry;
pub mod router;
pub mod token;

#[cfg(test)]
mod tests;

pub use broadcast::StatusBroadcaster;
pub use coordinator::{CheckinCoordinator, CheckinRequest, CoordinatorError};
pub use domain::{
    CandidateId, CheckinMethod, CheckinOutcome, CheckinProgress, CheckinRecord, CheckinResult,
    QueueEntry, ReleaseOutcome, Role, ScheduleId, StatusSnapshot, StatusSummary, Venue,
    VenueDefinition, VenueId, VenueStatus, VenueView,
};
pub use ledger::{CheckinLedger, LedgerError};
pub use queue::{QueueError, QueueManager};
pub use registry::{RegistryError, StatusListener, VenueRegistry};
pub use router::{checkin_router, CheckinApp};
pub use token::{IssuedToken, QrTokenService, TokenError};
