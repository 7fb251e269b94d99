use super::domain::CheckinRecord;

/// Append-only audit log seam so the coordinator can be exercised in
/// isolation. Records are immutable once written; the ledger is the source
/// of truth for statistics.
pub trait CheckinLedger: Send + Sync {
    fn append(&self, record: CheckinRecord) -> Result<(), LedgerError>;
    fn records(&self) -> Result<Vec<CheckinRecord>, LedgerError>;
}

/// Error enumeration for ledger failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("check-in ledger unavailable: {0}")]
    Unavailable(String),
}
