use super::billing::{AttemptStatus, BillingAttempt};
use super::customer::Customer;
use super::invoice::{Currency, Invoice, InvoiceStatus, Money};
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// Failure kinds a payment gateway charge can produce.
///
/// A closed set: the outcome classifier matches over it exhaustively.
/// `Network` is the only transient kind and the only one the retry policy
/// ever retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChargeError {
    #[error("Customer '{0}' was not found")]
    CustomerNotFound(u32),
    #[error("Currency of invoice '{invoice_id}' does not match currency of customer '{customer_id}'")]
    CurrencyMismatch { invoice_id: u32, customer_id: u32 },
    #[error("A network error happened please try again.")]
    Network,
    #[error("{0}")]
    Other(String),
}

impl ChargeError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ChargeError::Network)
    }
}

/// The payment gateway capability.
///
/// `Ok(true)` means the funds were captured, `Ok(false)` means the gateway
/// declined because the account balance was insufficient. Both are
/// non-exceptional outcomes.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, invoice: &Invoice) -> std::result::Result<bool, ChargeError>;
}

/// The storage collaborator for customers, invoices and billing attempts.
///
/// Every write is a single atomic operation from the pipeline's point of
/// view. `create_attempt` must enforce the one-attempt-per-invoice
/// uniqueness itself; the pipeline's concurrency bound does not protect
/// against two runs racing on the same invoice.
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn create_customer(&self, currency: Currency) -> Result<Customer>;
    async fn fetch_customer(&self, id: u32) -> Result<Option<Customer>>;

    async fn create_invoice(&self, customer_id: u32, amount: Money) -> Result<Invoice>;
    async fn fetch_invoice(&self, id: u32) -> Result<Option<Invoice>>;
    /// Invoices currently eligible for charging, i.e. still `Pending`.
    async fn fetch_pending_invoices(&self) -> Result<Vec<Invoice>>;
    /// Persists invoice status and message together.
    async fn set_invoice_status(
        &self,
        id: u32,
        status: InvoiceStatus,
        message: Option<String>,
    ) -> Result<Invoice>;

    /// Idempotent: returns the existing attempt if one already exists for
    /// the invoice, never a duplicate.
    async fn create_attempt(&self, invoice: &Invoice) -> Result<BillingAttempt>;
    /// Persists the terminal state of an attempt.
    async fn finalize_attempt(
        &self,
        id: u32,
        status: AttemptStatus,
        message: Option<String>,
        charging_date: NaiveDate,
    ) -> Result<BillingAttempt>;
    async fn fetch_attempt(&self, id: u32) -> Result<Option<BillingAttempt>>;
    /// Attempts whose charging date falls within the given month.
    async fn fetch_attempts_by_month(&self, year: i32, month: u32) -> Result<Vec<BillingAttempt>>;
}

pub type BillingStoreBox = Box<dyn BillingStore>;
pub type PaymentGatewayBox = Box<dyn PaymentGateway>;
