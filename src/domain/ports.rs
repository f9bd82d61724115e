use super::account::Account;
use super::identity::IdentityKey;
use super::otp::OtpRecord;
use super::payment::{PaymentFilter, PaymentRequest};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// What an atomic update decided to do with the value under its key.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation<T> {
    Keep,
    Put(T),
    Delete,
}

/// Decides the mutation for one key given its current value.
///
/// A store may invoke it more than once if its transaction has to be restarted,
/// so it must not have side effects beyond what it captures. Returning `Err` aborts
/// the update without writing anything.
pub type Updater<'a, T> = dyn FnMut(Option<&T>) -> Result<Mutation<T>> + Send + 'a;

#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Stores the record, replacing whatever existed for its identity.
    async fn put(&self, record: OtpRecord) -> Result<()>;
    async fn get(&self, key: &IdentityKey) -> Result<Option<OtpRecord>>;
    /// Removes the record. Removing a missing record is not an error.
    async fn delete(&self, key: &IdentityKey) -> Result<()>;
    /// Read-check-write of one identity's record as a single atomic step.
    async fn update(&self, key: &IdentityKey, f: &mut Updater<'_, OtpRecord>) -> Result<()>;
    /// Deletes every record that expired before `now` and returns how many went.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Creates the account, failing if one already exists for the identity.
    async fn insert(&self, account: Account) -> Result<()>;
    async fn get(&self, key: &IdentityKey) -> Result<Option<Account>>;
    async fn update(&self, key: &IdentityKey, f: &mut Updater<'_, Account>) -> Result<()>;
    async fn get_all(&self) -> Result<Vec<Account>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert(&self, request: PaymentRequest) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<PaymentRequest>>;
    async fn update(&self, id: Uuid, f: &mut Updater<'_, PaymentRequest>) -> Result<()>;
    /// Matching requests, newest first.
    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<PaymentRequest>>;
}

pub type OtpStoreRef = Arc<dyn OtpStore>;
pub type AccountStoreRef = Arc<dyn AccountStore>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
