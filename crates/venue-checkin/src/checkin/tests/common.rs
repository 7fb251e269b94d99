use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::checkin::domain::{CandidateId, CheckinRecord, ScheduleId, VenueDefinition, VenueId};
use crate::checkin::ledger::{CheckinLedger, LedgerError};
use crate::checkin::router::CheckinApp;

/// In-memory ledger that can be told to fail its next appends, so
/// transient-outage handling can be exercised.
#[derive(Default)]
pub(super) struct MemoryLedger {
    records: Mutex<Vec<CheckinRecord>>,
    failures: AtomicU32,
}

impl MemoryLedger {
    pub(super) fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub(super) fn entries(&self) -> Vec<CheckinRecord> {
        self.records.lock().expect("ledger mutex poisoned").clone()
    }
}

impl CheckinLedger for MemoryLedger {
    fn append(&self, record: CheckinRecord) -> Result<(), LedgerError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(LedgerError::Unavailable("ledger offline".to_string()));
        }
        self.records
            .lock()
            .expect("ledger mutex poisoned")
            .push(record);
        Ok(())
    }

    fn records(&self) -> Result<Vec<CheckinRecord>, LedgerError> {
        Ok(self.entries())
    }
}

pub(super) fn candidate(id: &str) -> CandidateId {
    CandidateId(id.to_string())
}

pub(super) fn schedule(id: &str) -> ScheduleId {
    ScheduleId(id.to_string())
}

pub(super) fn venue(id: &str) -> VenueId {
    VenueId(id.to_string())
}

pub(super) fn definition(id: &str, name: &str) -> VenueDefinition {
    VenueDefinition {
        id: venue(id),
        name: name.to_string(),
        venue_type: "practical".to_string(),
        capacity: 1,
    }
}

pub(super) fn build_app() -> (Arc<CheckinApp<MemoryLedger>>, Arc<MemoryLedger>) {
    let ledger = Arc::new(MemoryLedger::default());
    let app = CheckinApp::new(10, ledger.clone());
    (app, ledger)
}
