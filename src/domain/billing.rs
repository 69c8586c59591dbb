use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Successful,
    Failure,
}

impl AttemptStatus {
    /// `InProgress` is the only non-terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

/// The durable ledger entry for one charge attempt against an invoice.
///
/// At most one attempt exists per invoice; the storage layer enforces the
/// uniqueness and creation is idempotent. The attempt status is reconciled
/// with the invoice's own status but stored independently of it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct BillingAttempt {
    pub id: u32,
    pub invoice_id: u32,
    pub status: AttemptStatus,
    pub charging_date: NaiveDate,
    pub status_message: Option<String>,
}
