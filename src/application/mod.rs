//! Application services: OTP issuance and verification, notification dispatch,
//! the points ledger and the payment workflow.
//!
//! Services depend only on the ports in [`crate::domain::ports`] and receive their
//! collaborators through [`context::AppContext`].

pub mod context;
pub mod ledger;
pub mod notify;
pub mod otp;
pub mod payments;
