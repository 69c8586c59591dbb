use crate::domain::invoice::Currency;
use crate::error::{BillingError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One seed row: an invoice amount owed by a (possibly new) customer.
///
/// The `customer` column is the caller's key for the customer, not a store
/// id; the first row seen for a key fixes that customer's billing currency.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct SeedRecord {
    pub customer: u32,
    pub amount: Decimal,
    pub currency: Currency,
}

/// Reads invoice seed records from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over
/// `Result<SeedRecord>`. It handles whitespace trimming and flexible record
/// lengths automatically.
pub struct InvoiceReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> InvoiceReader<R> {
    /// Creates a new `InvoiceReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes seed records.
    ///
    /// Rows with a non-positive amount are rejected; invoices never charge
    /// zero or negative values.
    pub fn records(self) -> impl Iterator<Item = Result<SeedRecord>> {
        self.reader.into_deserialize().map(|result| {
            let record: SeedRecord = result?;
            if record.amount <= Decimal::ZERO {
                return Err(BillingError::ValidationError(format!(
                    "invoice amount must be positive, got {}",
                    record.amount
                )));
            }
            Ok(record)
        })
    }
}
