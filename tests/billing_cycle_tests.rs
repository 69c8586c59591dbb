use async_trait::async_trait;
use billrun::application::engine::BillingEngine;
use billrun::domain::billing::AttemptStatus;
use billrun::domain::invoice::{Currency, Invoice, InvoiceStatus, Money};
use billrun::domain::ports::{BillingStore, ChargeError, PaymentGateway};
use billrun::infrastructure::in_memory::InMemoryStore;
use chrono::Datelike;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Replays a fixed sequence of gateway responses and counts calls.
struct QueueGateway {
    script: Mutex<VecDeque<Result<bool, ChargeError>>>,
    calls: AtomicUsize,
}

impl QueueGateway {
    fn new(script: Vec<Result<bool, ChargeError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct SharedGateway(Arc<QueueGateway>);

#[async_trait]
impl PaymentGateway for SharedGateway {
    async fn charge(&self, _invoice: &Invoice) -> Result<bool, ChargeError> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        self.0
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(true))
    }
}

async fn store_with_invoices(count: usize) -> (InMemoryStore, Vec<Invoice>) {
    let store = InMemoryStore::new();
    let mut invoices = Vec::with_capacity(count);
    for _ in 0..count {
        let customer = store.create_customer(Currency::Eur).await.unwrap();
        let invoice = store
            .create_invoice(customer.id, Money::new(dec!(100.00), Currency::Eur))
            .await
            .unwrap();
        invoices.push(invoice);
    }
    (store, invoices)
}

fn engine_with(store: &InMemoryStore, gateway: &Arc<QueueGateway>) -> BillingEngine {
    BillingEngine::new(
        Box::new(store.clone()),
        Box::new(SharedGateway(gateway.clone())),
    )
}

#[tokio::test]
async fn test_captured_charge_yields_paid_invoice() {
    let (store, invoices) = store_with_invoices(1).await;
    let gateway = QueueGateway::new(vec![Ok(true)]);

    let report = engine_with(&store, &gateway)
        .run_billing_cycle()
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.finalized.len(), 1);
    assert_eq!(report.finalized[0].status, AttemptStatus::Successful);
    assert_eq!(report.finalized[0].status_message, None);

    let invoice = store.fetch_invoice(invoices[0].id).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
}

#[tokio::test]
async fn test_declined_charge_records_message_and_keeps_invoice_pending() {
    let (store, invoices) = store_with_invoices(1).await;
    let gateway = QueueGateway::new(vec![Ok(false)]);

    let report = engine_with(&store, &gateway)
        .run_billing_cycle()
        .await
        .unwrap();

    assert_eq!(report.finalized[0].status, AttemptStatus::Failure);
    assert_eq!(
        report.finalized[0].status_message.as_deref(),
        Some("account balance did not allow the charge")
    );

    let invoice = store.fetch_invoice(invoices[0].id).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);
}

#[tokio::test]
async fn test_network_error_then_success_retries_once() {
    let (store, invoices) = store_with_invoices(1).await;
    let gateway = QueueGateway::new(vec![Err(ChargeError::Network), Ok(true)]);

    let report = engine_with(&store, &gateway)
        .run_billing_cycle()
        .await
        .unwrap();

    assert_eq!(gateway.calls(), 2);
    assert_eq!(report.finalized[0].status, AttemptStatus::Successful);
    assert_eq!(report.finalized[0].status_message, None);

    let invoice = store.fetch_invoice(invoices[0].id).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
}

#[tokio::test]
async fn test_network_error_twice_exhausts_the_retry_budget() {
    let (store, invoices) = store_with_invoices(1).await;
    let gateway = QueueGateway::new(vec![Err(ChargeError::Network), Err(ChargeError::Network)]);

    let report = engine_with(&store, &gateway)
        .run_billing_cycle()
        .await
        .unwrap();

    assert_eq!(gateway.calls(), 2);
    assert_eq!(report.finalized[0].status, AttemptStatus::Failure);
    assert_eq!(
        report.finalized[0].status_message.as_deref(),
        Some("A network error happened please try again.")
    );

    let invoice = store.fetch_invoice(invoices[0].id).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);
}

#[tokio::test]
async fn test_customer_not_found_records_the_customer_id() {
    let (store, invoices) = store_with_invoices(1).await;
    let gateway = QueueGateway::new(vec![Err(ChargeError::CustomerNotFound(7))]);

    let report = engine_with(&store, &gateway)
        .run_billing_cycle()
        .await
        .unwrap();

    assert_eq!(gateway.calls(), 1);
    assert_eq!(
        report.finalized[0].status_message.as_deref(),
        Some("Customer '7' was not found")
    );

    let invoice = store.fetch_invoice(invoices[0].id).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Pending);
}

#[tokio::test]
async fn test_currency_mismatch_records_both_ids() {
    let (store, _invoices) = store_with_invoices(1).await;
    let gateway = QueueGateway::new(vec![Err(ChargeError::CurrencyMismatch {
        invoice_id: 3,
        customer_id: 3,
    })]);

    let report = engine_with(&store, &gateway)
        .run_billing_cycle()
        .await
        .unwrap();

    assert_eq!(gateway.calls(), 1);
    assert_eq!(
        report.finalized[0].status_message.as_deref(),
        Some("Currency of invoice '3' does not match currency of customer '3'")
    );
}

#[tokio::test]
async fn test_unclassified_error_keeps_its_own_message() {
    let (store, _invoices) = store_with_invoices(1).await;
    let gateway = QueueGateway::new(vec![Err(ChargeError::Other(
        "gateway returned a malformed response".into(),
    ))]);

    let report = engine_with(&store, &gateway)
        .run_billing_cycle()
        .await
        .unwrap();

    assert_eq!(gateway.calls(), 1);
    assert_eq!(
        report.finalized[0].status_message.as_deref(),
        Some("gateway returned a malformed response")
    );
}

#[tokio::test]
async fn test_exactly_one_attempt_per_invoice() {
    let (store, invoices) = store_with_invoices(25).await;
    let gateway = QueueGateway::new(vec![]);

    let report = engine_with(&store, &gateway)
        .run_billing_cycle()
        .await
        .unwrap();

    assert_eq!(report.finalized.len(), 25);
    let mut seen: Vec<u32> = report
        .finalized
        .iter()
        .map(|attempt| attempt.invoice_id)
        .collect();
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), invoices.len());
}

#[tokio::test]
async fn test_rerun_does_not_touch_finalized_invoices() {
    let (store, invoices) = store_with_invoices(1).await;
    let gateway = QueueGateway::new(vec![Ok(true)]);

    let first = engine_with(&store, &gateway)
        .run_billing_cycle()
        .await
        .unwrap();
    assert_eq!(first.finalized.len(), 1);
    let attempt_id = first.finalized[0].id;

    // The invoice is now paid, so a second pass has nothing eligible.
    let second = engine_with(&store, &gateway)
        .run_billing_cycle()
        .await
        .unwrap();
    assert!(second.finalized.is_empty());
    assert_eq!(gateway.calls(), 1);

    let attempt = store.fetch_attempt(attempt_id).await.unwrap().unwrap();
    assert_eq!(attempt.status, AttemptStatus::Successful);
    let invoice = store.fetch_invoice(invoices[0].id).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
}

#[tokio::test]
async fn test_failed_invoice_is_recharged_on_the_next_run_without_a_second_attempt() {
    let (store, invoices) = store_with_invoices(1).await;
    let gateway = QueueGateway::new(vec![Ok(false), Ok(true)]);

    let first = engine_with(&store, &gateway)
        .run_billing_cycle()
        .await
        .unwrap();
    assert_eq!(first.finalized[0].status, AttemptStatus::Failure);
    let attempt_id = first.finalized[0].id;

    // Still pending, so the next run picks the invoice up again and
    // re-finalizes the same attempt row.
    let second = engine_with(&store, &gateway)
        .run_billing_cycle()
        .await
        .unwrap();
    assert_eq!(second.finalized.len(), 1);
    assert_eq!(second.finalized[0].id, attempt_id);
    assert_eq!(second.finalized[0].status, AttemptStatus::Successful);

    let invoice = store.fetch_invoice(invoices[0].id).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
}

#[tokio::test]
async fn test_attempts_for_month_reports_this_months_attempts() {
    let (store, _invoices) = store_with_invoices(3).await;
    let gateway = QueueGateway::new(vec![]);
    let engine = engine_with(&store, &gateway);

    engine.run_billing_cycle().await.unwrap();

    let today = chrono::Utc::now().date_naive();
    let attempts = engine
        .attempts_for_month(today.year(), today.month())
        .await
        .unwrap();
    assert_eq!(attempts.len(), 3);
}
