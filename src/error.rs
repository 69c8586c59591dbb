use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("storage error: {0}")]
    StorageError(String),
    #[error("invoice '{invoice_id}' was charged but could not be marked as paid: {source}")]
    ReconciliationError {
        invoice_id: u32,
        #[source]
        source: Box<BillingError>,
    },
    #[error("validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, BillingError>;
