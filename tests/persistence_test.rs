#![cfg(feature = "storage-rocksdb")]

use billrun::application::engine::BillingEngine;
use billrun::domain::billing::AttemptStatus;
use billrun::domain::invoice::{Currency, InvoiceStatus, Money};
use billrun::domain::ports::BillingStore;
use billrun::infrastructure::gateway::SimulatedGateway;
use billrun::infrastructure::rocksdb::RocksDbStore;
use rust_decimal_macros::dec;
use tempfile::tempdir;

#[tokio::test]
async fn test_billing_outcome_survives_a_reopen() {
    let dir = tempdir().unwrap();

    let invoice_id = {
        let store = RocksDbStore::open(dir.path()).unwrap();
        let customer = store.create_customer(Currency::Dkk).await.unwrap();
        let invoice = store
            .create_invoice(customer.id, Money::new(dec!(199.00), Currency::Dkk))
            .await
            .unwrap();

        let engine = BillingEngine::new(
            Box::new(store.clone()),
            Box::new(SimulatedGateway::approving()),
        );
        let report = engine.run_billing_cycle().await.unwrap();
        assert_eq!(report.finalized.len(), 1);
        invoice.id
    };

    let reopened = RocksDbStore::open(dir.path()).unwrap();
    let invoice = reopened.fetch_invoice(invoice_id).await.unwrap().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);

    let pending = reopened.fetch_pending_invoices().await.unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_attempt_uniqueness_survives_a_reopen() {
    let dir = tempdir().unwrap();

    let (invoice, first_attempt) = {
        let store = RocksDbStore::open(dir.path()).unwrap();
        let customer = store.create_customer(Currency::Eur).await.unwrap();
        let invoice = store
            .create_invoice(customer.id, Money::new(dec!(10.00), Currency::Eur))
            .await
            .unwrap();
        let attempt = store.create_attempt(&invoice).await.unwrap();
        (invoice, attempt)
    };

    let reopened = RocksDbStore::open(dir.path()).unwrap();
    let second_attempt = reopened.create_attempt(&invoice).await.unwrap();
    assert_eq!(second_attempt, first_attempt);
}

#[tokio::test]
async fn test_rerun_against_a_persistent_store_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = RocksDbStore::open(dir.path()).unwrap();

    let customer = store.create_customer(Currency::Gbp).await.unwrap();
    store
        .create_invoice(customer.id, Money::new(dec!(75.00), Currency::Gbp))
        .await
        .unwrap();

    let engine = BillingEngine::new(
        Box::new(store.clone()),
        Box::new(SimulatedGateway::approving()),
    );
    let first = engine.run_billing_cycle().await.unwrap();
    assert_eq!(first.finalized.len(), 1);
    assert_eq!(first.finalized[0].status, AttemptStatus::Successful);

    let second = engine.run_billing_cycle().await.unwrap();
    assert!(second.finalized.is_empty());

    let attempt = store
        .fetch_attempt(first.finalized[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(attempt.status, AttemptStatus::Successful);
}
