use crate::domain::billing::{AttemptStatus, BillingAttempt};
use crate::domain::customer::Customer;
use crate::domain::invoice::{Currency, Invoice, InvoiceStatus, Money};
use crate::domain::ports::BillingStore;
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Column family for customers.
pub const CF_CUSTOMERS: &str = "customers";
/// Column family for invoices.
pub const CF_INVOICES: &str = "invoices";
/// Column family for billing attempts, keyed by invoice id.
pub const CF_ATTEMPTS: &str = "attempts";
/// Column family for id sequences.
pub const CF_META: &str = "meta";

/// A persistent billing store backed by RocksDB.
///
/// Each entity lives in its own column family. Attempts are keyed by their
/// invoice id, so the one-attempt-per-invoice constraint is enforced by the
/// keyspace itself. Writers are assumed to live in a single process; the
/// internal mutex serializes the read-modify-write sections (id allocation,
/// attempt creation) against each other.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_CUSTOMERS, CF_INVOICES, CF_ATTEMPTS, CF_META]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)
            .map_err(|e| BillingError::StorageError(format!("failed to open database: {e}")))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| BillingError::StorageError(format!("column family '{name}' not found")))
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: u32) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        let bytes = self
            .db
            .get_cf(cf, key.to_be_bytes())
            .map_err(|e| BillingError::StorageError(e.to_string()))?;
        match bytes {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).map_err(|e| {
                    BillingError::StorageError(format!("deserialization error: {e}"))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: u32, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)
            .map_err(|e| BillingError::StorageError(format!("serialization error: {e}")))?;
        self.db
            .put_cf(cf, key.to_be_bytes(), bytes)
            .map_err(|e| BillingError::StorageError(e.to_string()))?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, bytes) =
                item.map_err(|e| BillingError::StorageError(format!("iteration error: {e}")))?;
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| BillingError::StorageError(format!("deserialization error: {e}")))?;
            values.push(value);
        }
        Ok(values)
    }

    /// Allocates the next id for the given sequence. Callers must hold the
    /// write lock.
    fn next_id(&self, sequence: &str) -> Result<u32> {
        let cf = self.cf(CF_META)?;
        let current = self
            .db
            .get_cf(cf, sequence)
            .map_err(|e| BillingError::StorageError(e.to_string()))?
            .map(|bytes| {
                let array: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
                    BillingError::StorageError(format!("corrupt sequence '{sequence}'"))
                })?;
                Ok::<u32, BillingError>(u32::from_be_bytes(array))
            })
            .transpose()?
            .unwrap_or(0);
        let next = current + 1;
        self.db
            .put_cf(cf, sequence, next.to_be_bytes())
            .map_err(|e| BillingError::StorageError(e.to_string()))?;
        Ok(next)
    }
}

#[async_trait]
impl BillingStore for RocksDbStore {
    async fn create_customer(&self, currency: Currency) -> Result<Customer> {
        let _guard = self.write_lock.lock().unwrap();
        let id = self.next_id("customer_seq")?;
        let customer = Customer { id, currency };
        self.put(CF_CUSTOMERS, id, &customer)?;
        Ok(customer)
    }

    async fn fetch_customer(&self, id: u32) -> Result<Option<Customer>> {
        self.get(CF_CUSTOMERS, id)
    }

    async fn create_invoice(&self, customer_id: u32, amount: Money) -> Result<Invoice> {
        if self.get::<Customer>(CF_CUSTOMERS, customer_id)?.is_none() {
            return Err(BillingError::StorageError(format!(
                "customer '{customer_id}' does not exist"
            )));
        }
        let _guard = self.write_lock.lock().unwrap();
        let id = self.next_id("invoice_seq")?;
        let invoice = Invoice {
            id,
            customer_id,
            amount,
            status: InvoiceStatus::Pending,
            status_message: None,
        };
        self.put(CF_INVOICES, id, &invoice)?;
        Ok(invoice)
    }

    async fn fetch_invoice(&self, id: u32) -> Result<Option<Invoice>> {
        self.get(CF_INVOICES, id)
    }

    async fn fetch_pending_invoices(&self) -> Result<Vec<Invoice>> {
        let mut pending: Vec<Invoice> = self
            .scan::<Invoice>(CF_INVOICES)?
            .into_iter()
            .filter(|invoice| invoice.is_pending())
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
        let _guard = self.write_lock.lock().unwrap();
        let mut invoice = self
            .get::<Invoice>(CF_INVOICES, id)?
            .ok_or_else(|| BillingError::StorageError(format!("invoice '{id}' does not exist")))?;
        invoice.status = status;
        invoice.status_message = message;
        self.put(CF_INVOICES, id, &invoice)?;
        Ok(invoice)
    }

    async fn create_attempt(&self, invoice: &Invoice) -> Result<BillingAttempt> {
        let _guard = self.write_lock.lock().unwrap();
        if let Some(existing) = self.get::<BillingAttempt>(CF_ATTEMPTS, invoice.id)? {
            return Ok(existing);
        }
        let id = self.next_id("attempt_seq")?;
        let attempt = BillingAttempt {
            id,
            invoice_id: invoice.id,
            status: AttemptStatus::InProgress,
            charging_date: chrono::Utc::now().date_naive(),
            status_message: None,
        };
        self.put(CF_ATTEMPTS, invoice.id, &attempt)?;
        Ok(attempt)
    }

    async fn finalize_attempt(
        &self,
        id: u32,
        status: AttemptStatus,
        message: Option<String>,
        charging_date: NaiveDate,
    ) -> Result<BillingAttempt> {
        let _guard = self.write_lock.lock().unwrap();
        let mut attempt = self
            .scan::<BillingAttempt>(CF_ATTEMPTS)?
            .into_iter()
            .find(|attempt| attempt.id == id)
            .ok_or_else(|| BillingError::StorageError(format!("attempt '{id}' does not exist")))?;
        attempt.status = status;
        attempt.status_message = message;
        attempt.charging_date = charging_date;
        self.put(CF_ATTEMPTS, attempt.invoice_id, &attempt)?;
        Ok(attempt)
    }

    async fn fetch_attempt(&self, id: u32) -> Result<Option<BillingAttempt>> {
        Ok(self
            .scan::<BillingAttempt>(CF_ATTEMPTS)?
            .into_iter()
            .find(|attempt| attempt.id == id))
    }

    async fn fetch_attempts_by_month(&self, year: i32, month: u32) -> Result<Vec<BillingAttempt>> {
        let mut matching: Vec<BillingAttempt> = self
            .scan::<BillingAttempt>(CF_ATTEMPTS)?
            .into_iter()
            .filter(|attempt| {
                attempt.charging_date.year() == year && attempt.charging_date.month() == month
            })
            .collect();
        matching.sort_by_key(|attempt| attempt.id);
        Ok(matching)
    }
}
