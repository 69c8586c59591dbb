use super::billing::AttemptStatus;
use super::invoice::InvoiceStatus;
use super::ports::ChargeError;

/// Message recorded when the gateway declines a charge.
pub const DECLINED_MESSAGE: &str = "account balance did not allow the charge";

/// The raw result of charge execution, after the retry budget is spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// The gateway captured the funds.
    Captured,
    /// The gateway declined the charge for insufficient balance.
    Declined,
    /// The final call failed with a typed error.
    Failed(ChargeError),
}

/// The terminal status and message to persist for an attempt.
///
/// A `Failure` verdict always carries a message, `Successful` never does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: AttemptStatus,
    pub message: Option<String>,
}

impl Verdict {
    /// The invoice status to project once the attempt is finalized, if any.
    ///
    /// Only a captured charge touches the invoice; every failure leaves it
    /// `Pending` and eligible for a future run.
    pub fn invoice_status(&self) -> Option<InvoiceStatus> {
        match self.status {
            AttemptStatus::Successful => Some(InvoiceStatus::Paid),
            AttemptStatus::Failure | AttemptStatus::InProgress => None,
        }
    }
}

/// Maps a charge outcome to the attempt state to persist.
pub fn classify(outcome: ChargeOutcome) -> Verdict {
    match outcome {
        ChargeOutcome::Captured => Verdict {
            status: AttemptStatus::Successful,
            message: None,
        },
        ChargeOutcome::Declined => Verdict {
            status: AttemptStatus::Failure,
            message: Some(DECLINED_MESSAGE.to_string()),
        },
        ChargeOutcome::Failed(err) => Verdict {
            status: AttemptStatus::Failure,
            // The error's display form is the operator-facing record.
            message: Some(err.to_string()),
        },
    }
}
