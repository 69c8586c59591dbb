use super::invoice::Currency;
use serde::{Deserialize, Serialize};

/// A customer whose invoices can be charged.
///
/// Immutable for the purposes of the billing pipeline; the billing currency
/// is fixed at creation and every invoice of the customer must match it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct Customer {
    pub id: u32,
    pub currency: Currency,
}
