//! Application layer containing the billing pipeline orchestration.
//!
//! This module defines the `BillingEngine`, the entry point for a billing
//! run. It fans pending invoices out over a bounded number of concurrent
//! slots; coordination happens only through the stream of invoices and the
//! storage collaborator, never through shared mutable state.

pub mod engine;
