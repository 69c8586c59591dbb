use crate::domain::billing::{AttemptStatus, BillingAttempt};
use crate::domain::invoice::{Invoice, InvoiceStatus};
use crate::domain::outcome::{ChargeOutcome, classify};
use crate::domain::ports::{BillingStoreBox, PaymentGatewayBox};
use crate::error::{BillingError, Result};
use futures::StreamExt;
use futures::stream;
use tracing::{debug, error, info, warn};

/// Maximum number of invoices concurrently in flight per cycle.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// A storage failure scoped to a single invoice's slot in a cycle.
#[derive(Debug)]
pub struct CycleFailure {
    pub invoice_id: u32,
    pub error: BillingError,
}

/// The result of one full billing pass.
///
/// Every eligible invoice ends up in exactly one of the two lists: either
/// its finalized attempt, or the storage error that aborted its slot.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub finalized: Vec<BillingAttempt>,
    pub failures: Vec<CycleFailure>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The main entry point for the billing pipeline.
///
/// `BillingEngine` drives one full pass over the eligible invoices: it fans
/// them out with a bounded concurrency limit, charges each through the
/// payment gateway with a single-retry policy for transient errors, and
/// commits the classified outcome through the storage collaborator. The
/// caller decides cadence; the engine only ever runs to completion over the
/// currently eligible set.
pub struct BillingEngine {
    store: BillingStoreBox,
    gateway: PaymentGatewayBox,
    concurrency: usize,
}

impl BillingEngine {
    /// Creates a new `BillingEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `store` - The storage collaborator for invoices and attempts.
    /// * `gateway` - The payment gateway capability.
    pub fn new(store: BillingStoreBox, gateway: PaymentGatewayBox) -> Self {
        Self {
            store,
            gateway,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Overrides the number of invoices processed concurrently.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Runs one full billing pass over all pending invoices.
    ///
    /// Invoices complete independently and in no guaranteed order; a storage
    /// failure on one invoice never aborts the others. The returned report
    /// holds one terminal result per input invoice.
    pub async fn run_billing_cycle(&self) -> Result<CycleReport> {
        let invoices = self.store.fetch_pending_invoices().await?;
        info!(count = invoices.len(), "starting billing cycle");

        let results: Vec<(u32, Result<BillingAttempt>)> = stream::iter(invoices)
            .map(|invoice| {
                let invoice_id = invoice.id;
                async move { (invoice_id, self.process_invoice(invoice).await) }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = CycleReport::default();
        for (invoice_id, result) in results {
            match result {
                Ok(attempt) => report.finalized.push(attempt),
                Err(err) => {
                    error!(invoice_id, %err, "invoice processing aborted");
                    report.failures.push(CycleFailure {
                        invoice_id,
                        error: err,
                    });
                }
            }
        }
        info!(
            finalized = report.finalized.len(),
            failures = report.failures.len(),
            "billing cycle complete"
        );
        Ok(report)
    }

    /// Attempts recorded within the given month, for operator reporting.
    pub async fn attempts_for_month(&self, year: i32, month: u32) -> Result<Vec<BillingAttempt>> {
        self.store.fetch_attempts_by_month(year, month).await
    }

    /// Processes a single invoice end-to-end.
    ///
    /// The sequence is strict and not interruptible once begun: mark the
    /// attempt in progress, charge with at most one retry, classify,
    /// finalize the attempt, then project `Paid` onto the invoice only when
    /// the attempt is `Successful`.
    async fn process_invoice(&self, invoice: Invoice) -> Result<BillingAttempt> {
        let attempt = self.store.create_attempt(&invoice).await?;

        // An already-successful attempt means an earlier run captured the
        // funds but died before marking the invoice paid. Re-project the
        // status instead of charging twice.
        if attempt.status == AttemptStatus::Successful {
            warn!(
                invoice_id = invoice.id,
                attempt_id = attempt.id,
                "attempt already successful, reconciling invoice status"
            );
            self.project_paid(invoice.id).await?;
            return Ok(attempt);
        }

        let outcome = self.charge_with_retry(&invoice).await;
        match &outcome {
            ChargeOutcome::Captured => {
                info!(invoice_id = invoice.id, "payment captured");
            }
            ChargeOutcome::Declined => {
                warn!(invoice_id = invoice.id, "charge declined, account balance insufficient");
            }
            ChargeOutcome::Failed(err) => {
                error!(invoice_id = invoice.id, %err, "charge failed");
            }
        }

        let verdict = classify(outcome);
        let charging_date = chrono::Utc::now().date_naive();
        let finalized = self
            .store
            .finalize_attempt(attempt.id, verdict.status, verdict.message.clone(), charging_date)
            .await?;

        if let Some(status) = verdict.invoice_status() {
            self.store
                .set_invoice_status(invoice.id, status, None)
                .await
                .map_err(|source| BillingError::ReconciliationError {
                    invoice_id: invoice.id,
                    source: Box::new(source),
                })?;
        }

        Ok(finalized)
    }

    /// Invokes the gateway, retrying exactly once on a transient error.
    ///
    /// The outcome of the final call, original or retried, is returned
    /// unmodified. Declines and non-transient errors are never retried.
    async fn charge_with_retry(&self, invoice: &Invoice) -> ChargeOutcome {
        let result = match self.gateway.charge(invoice).await {
            Err(err) if err.is_transient() => {
                debug!(invoice_id = invoice.id, "transient network error, retrying charge");
                self.gateway.charge(invoice).await
            }
            first => first,
        };
        match result {
            Ok(true) => ChargeOutcome::Captured,
            Ok(false) => ChargeOutcome::Declined,
            Err(err) => ChargeOutcome::Failed(err),
        }
    }

    async fn project_paid(&self, invoice_id: u32) -> Result<()> {
        self.store
            .set_invoice_status(invoice_id, InvoiceStatus::Paid, None)
            .await
            .map_err(|source| BillingError::ReconciliationError {
                invoice_id,
                source: Box::new(source),
            })?;
        Ok(())
    }
}
