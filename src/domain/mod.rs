//! Domain types and the storage ports the application layer is written against.

pub mod account;
pub mod clock;
pub mod identity;
pub mod otp;
pub mod payment;
pub mod ports;
