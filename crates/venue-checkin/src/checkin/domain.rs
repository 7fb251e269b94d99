use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for venues.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VenueId(pub String);

/// Identifier wrapper for candidates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub String);

/// Identifier wrapper for exam schedule slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleId(pub String);

/// Role claim attached to a request by the upstream identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Staff,
    Candidate,
}

impl Role {
    pub fn from_claim(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "staff" | "admin" | "examiner" => Some(Self::Staff),
            "candidate" => Some(Self::Candidate),
            _ => None,
        }
    }
}

/// Lifecycle states for a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueStatus {
    Available,
    Occupied,
    Maintenance,
    Disabled,
}

impl VenueStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VenueStatus::Available => "available",
            VenueStatus::Occupied => "occupied",
            VenueStatus::Maintenance => "maintenance",
            VenueStatus::Disabled => "disabled",
        }
    }

    /// Whether the venue participates in check-in traffic at all.
    pub const fn in_service(self) -> bool {
        matches!(self, VenueStatus::Available | VenueStatus::Occupied)
    }
}

/// Administrative description used to register a venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueDefinition {
    pub id: VenueId,
    pub name: String,
    pub venue_type: String,
    pub capacity: u32,
}

/// Canonical venue record held by the registry.
///
/// Invariant: `status == Occupied` exactly when `current_occupant` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Venue {
    pub id: VenueId,
    pub name: String,
    pub venue_type: String,
    pub capacity: u32,
    pub status: VenueStatus,
    pub current_occupant: Option<CandidateId>,
    pub updated_at: DateTime<Utc>,
}

/// Entry in a venue's FIFO waiting list.
///
/// `seq` is a monotonic insertion counter; together with `enqueued_at` it
/// fixes the dequeue order. Positions are always recomputed from the queue,
/// never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueEntry {
    pub venue_id: VenueId,
    pub candidate_id: CandidateId,
    pub schedule_id: ScheduleId,
    pub enqueued_at: DateTime<Utc>,
    pub seq: u64,
}

/// Result class recorded for every check-in attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinResult {
    Success,
    Queued,
    Rejected,
}

impl CheckinResult {
    pub const fn label(self) -> &'static str {
        match self {
            CheckinResult::Success => "success",
            CheckinResult::Queued => "queued",
            CheckinResult::Rejected => "rejected",
        }
    }
}

/// How the candidate was identified at the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinMethod {
    QrCode,
    Manual,
    Promotion,
}

/// Append-only audit entry; the source of truth for statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckinRecord {
    pub candidate_id: CandidateId,
    pub venue_id: VenueId,
    pub schedule_id: ScheduleId,
    pub timestamp: DateTime<Utc>,
    pub result: CheckinResult,
    pub method: CheckinMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Per-(candidate, schedule) progress through the check-in state machine.
///
/// The absent state is "not arrived"; `Rejected` is terminal but
/// re-attemptable, `CheckedIn` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckinProgress {
    Queued,
    CheckedIn,
    Rejected,
}

/// Outcome of a successful check-in attempt.
#[derive(Debug, Clone)]
pub enum CheckinOutcome {
    CheckedIn { venue: Venue },
    Queued { venue: Venue, position: usize },
}

/// Outcome of releasing a venue.
#[derive(Debug, Clone)]
pub enum ReleaseOutcome {
    Promoted { venue: Venue, candidate_id: CandidateId },
    Vacated { venue: Venue },
}

/// Per-venue slice of a status snapshot, with the derived waiting count.
#[derive(Debug, Clone, Serialize)]
pub struct VenueView {
    pub venue_id: VenueId,
    pub name: String,
    pub venue_type: String,
    pub status: VenueStatus,
    pub capacity: u32,
    pub waiting_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_occupant: Option<CandidateId>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate counters across all venues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub total_venues: usize,
    pub active_venues: usize,
    pub total_waiting: usize,
}

/// Point-in-time view served to polling clients.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub venues: Vec<VenueView>,
    pub summary: StatusSummary,
    pub revision: u64,
    pub generated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Public variant of the snapshot with occupant identities removed.
    pub fn redacted(mut self) -> Self {
        for venue in &mut self.venues {
            venue.current_occupant = None;
        }
        self
    }
}
