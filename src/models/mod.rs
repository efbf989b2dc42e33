//! Database row models shared across the crate

pub mod customer;
pub mod payment;

pub use customer::{Customer, CustomerStatus, PaymentStatus};
pub use payment::{NewPayment, Payment};
