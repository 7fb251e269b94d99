use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use venue_checkin::checkin::{CheckinLedger, CheckinRecord, LedgerError};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local append-only audit log. A durable store replaces this by
/// implementing the same `CheckinLedger` seam; the coordinator is unchanged.
#[derive(Default)]
pub(crate) struct InMemoryCheckinLedger {
    records: Mutex<Vec<CheckinRecord>>,
}

impl InMemoryCheckinLedger {
    pub(crate) fn entries(&self) -> Vec<CheckinRecord> {
        self.records.lock().expect("ledger mutex poisoned").clone()
    }
}

impl CheckinLedger for InMemoryCheckinLedger {
    fn append(&self, record: CheckinRecord) -> Result<(), LedgerError> {
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
