//! Arrears reconciliation for customer accounts.
//!
//! Keeps each customer's months owed and payment status consistent with
//! their payment ledger, both on every payment change and in a monthly
//! sweep over all active customers.

pub mod calculators;
pub mod in_memory;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod store;

// Re-export commonly used items
pub use calculators::round_money;
pub use in_memory::InMemoryLedger;
pub use routes::router;
pub use services::{BillingError, CustomerArrears, PaymentDeleted, PaymentRecorded, SweepSummary};
pub use store::{LedgerStore, LedgerTx};
