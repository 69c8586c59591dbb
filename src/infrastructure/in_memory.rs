use crate::domain::billing::{AttemptStatus, BillingAttempt};
use crate::domain::customer::Customer;
use crate::domain::invoice::{Currency, Invoice, InvoiceStatus, Money};
use crate::domain::ports::BillingStore;
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

/// A thread-safe in-memory billing store.
///
/// Uses `Arc<RwLock<HashMap>>` tables to allow shared concurrent access.
/// Attempts are keyed by invoice id, which makes the one-attempt-per-invoice
/// uniqueness structural. Ideal for tests or single-shot runs where
/// persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    customers: Arc<RwLock<HashMap<u32, Customer>>>,
    invoices: Arc<RwLock<HashMap<u32, Invoice>>>,
    attempts: Arc<RwLock<HashMap<u32, BillingAttempt>>>,
    customer_seq: Arc<AtomicU32>,
    invoice_seq: Arc<AtomicU32>,
    attempt_seq: Arc<AtomicU32>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BillingStore for InMemoryStore {
    async fn create_customer(&self, currency: Currency) -> Result<Customer> {
        let id = self.customer_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let customer = Customer { id, currency };
        self.customers.write().await.insert(id, customer);
        Ok(customer)
    }

    async fn fetch_customer(&self, id: u32) -> Result<Option<Customer>> {
        Ok(self.customers.read().await.get(&id).copied())
    }

    async fn create_invoice(&self, customer_id: u32, amount: Money) -> Result<Invoice> {
        if !self.customers.read().await.contains_key(&customer_id) {
            return Err(BillingError::StorageError(format!(
                "customer '{customer_id}' does not exist"
            )));
        }
        let id = self.invoice_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let invoice = Invoice {
            id,
            customer_id,
            amount,
            status: InvoiceStatus::Pending,
            status_message: None,
        };
        self.invoices.write().await.insert(id, invoice.clone());
        Ok(invoice)
    }

    async fn fetch_invoice(&self, id: u32) -> Result<Option<Invoice>> {
        Ok(self.invoices.read().await.get(&id).cloned())
    }

    async fn fetch_pending_invoices(&self) -> Result<Vec<Invoice>> {
        let invoices = self.invoices.read().await;
        let mut pending: Vec<Invoice> = invoices
            .values()
            .filter(|invoice| invoice.is_pending())
            .cloned()
            .collect();
        pending.sort_by_key(|invoice| invoice.id);
        Ok(pending)
    }

    async fn set_invoice_status(
        &self,
        id: u32,
        status: InvoiceStatus,
        message: Option<String>,
    ) -> Result<Invoice> {
        let mut invoices = self.invoices.write().await;
        let invoice = invoices
            .get_mut(&id)
            .ok_or_else(|| BillingError::StorageError(format!("invoice '{id}' does not exist")))?;
        invoice.status = status;
        invoice.status_message = message;
        Ok(invoice.clone())
    }

    async fn create_attempt(&self, invoice: &Invoice) -> Result<BillingAttempt> {
        let mut attempts = self.attempts.write().await;
        if let Some(existing) = attempts.get(&invoice.id) {
            return Ok(existing.clone());
        }
        let id = self.attempt_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let attempt = BillingAttempt {
            id,
            invoice_id: invoice.id,
            status: AttemptStatus::InProgress,
            charging_date: chrono::Utc::now().date_naive(),
            status_message: None,
        };
        attempts.insert(invoice.id, attempt.clone());
        Ok(attempt)
    }

    async fn finalize_attempt(
        &self,
        id: u32,
        status: AttemptStatus,
        message: Option<String>,
        charging_date: NaiveDate,
    ) -> Result<BillingAttempt> {
        let mut attempts = self.attempts.write().await;
        let attempt = attempts
            .values_mut()
            .find(|attempt| attempt.id == id)
            .ok_or_else(|| BillingError::StorageError(format!("attempt '{id}' does not exist")))?;
        attempt.status = status;
        attempt.status_message = message;
        attempt.charging_date = charging_date;
        Ok(attempt.clone())
    }

    async fn fetch_attempt(&self, id: u32) -> Result<Option<BillingAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(attempts.values().find(|attempt| attempt.id == id).cloned())
    }

    async fn fetch_attempts_by_month(&self, year: i32, month: u32) -> Result<Vec<BillingAttempt>> {
        let attempts = self.attempts.read().await;
        let mut matching: Vec<BillingAttempt> = attempts
            .values()
            .filter(|attempt| {
                attempt.charging_date.year() == year && attempt.charging_date.month() == month
            })
            .cloned()
            .collect();
        matching.sort_by_key(|attempt| attempt.id);
        Ok(matching)
    }
}
