use crate::domain::account::Account;
use crate::domain::identity::IdentityKey;
use crate::domain::otp::OtpRecord;
use crate::domain::payment::{PaymentFilter, PaymentRequest};
use crate::domain::ports::{AccountStore, Mutation, OtpStore, PaymentStore, Updater};
use crate::error::{Result, WalletError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

type Cell<V> = Arc<Mutex<Option<V>>>;

/// A map whose entries are locked individually.
///
/// The outer `RwLock` is only held long enough to find, create or drop a key's
/// cell; every read-check-write then runs under that cell's own mutex, so updates
/// to one key serialize while different keys proceed independently. A cell left
/// empty is removed from the map once no other task holds it, so keys that were
/// were only looked up or have been deleted take no memory.
struct KeyedCells<K, V> {
    cells: RwLock<HashMap<K, Cell<V>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> KeyedCells<K, V> {
    fn new() -> Self {
        Self {
            cells: RwLock::new(HashMap::new()),
        }
    }

    async fn cell(&self, key: &K) -> Cell<V> {
        if let Some(cell) = self.cells.read().await.get(key) {
            return cell.clone();
        }
        let mut cells = self.cells.write().await;
        cells.entry(key.clone()).or_default().clone()
    }

    async fn get(&self, key: &K) -> Option<V> {
        let cell = self.cells.read().await.get(key).cloned()?;
        let slot = cell.lock().await;
        slot.clone()
    }

    async fn update(&self, key: &K, f: &mut Updater<'_, V>) -> Result<()> {
        let cell = self.cell(key).await;
        let mut slot = cell.lock().await;
        let outcome = f(slot.as_ref()).map(|mutation| match mutation {
            Mutation::Keep => {}
            Mutation::Put(value) => *slot = Some(value),
            Mutation::Delete => *slot = None,
        });
        let empty = slot.is_none();
        drop(slot);
        if empty {
            self.evict(key, cell).await;
        }
        outcome
    }

    /// Drops `key`'s cell if it is still `cell`, is empty, and only the map and
    /// the caller hold it. Under the map's write lock no task can obtain a new
    /// handle, so the check cannot race with a concurrent `cell()`.
    async fn evict(&self, key: &K, cell: Cell<V>) {
        let mut cells = self.cells.write().await;
        let unshared = cells.get(key).is_some_and(|c| Arc::ptr_eq(c, &cell))
            && Arc::strong_count(&cell) == 2;
        if unshared && cell.try_lock().is_ok_and(|slot| slot.is_none()) {
            cells.remove(key);
        }
    }

    async fn entries(&self) -> Vec<(K, Cell<V>)> {
        self.cells
            .read()
            .await
            .iter()
            .map(|(k, c)| (k.clone(), c.clone()))
            .collect()
    }

    async fn values(&self) -> Vec<V> {
        let mut values = Vec::new();
        for (_, cell) in self.entries().await {
            if let Some(value) = cell.lock().await.clone() {
                values.push(value);
            }
        }
        values
    }

    /// Empties and drops every cell whose value satisfies `expired`.
    async fn purge(&self, expired: impl Fn(&V) -> bool) -> usize {
        let mut purged = 0;
        for (key, cell) in self.entries().await {
            let mut slot = cell.lock().await;
            if slot.as_ref().is_some_and(&expired) {
                *slot = None;
                purged += 1;
            }
            let empty = slot.is_none();
            drop(slot);
            if empty {
                self.evict(&key, cell).await;
            }
        }
        purged
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.cells.read().await.len()
    }
}

/// A thread-safe in-memory store for OTP records.
///
/// Ideal for testing or single-instance deployments where codes need not survive a restart.
pub struct InMemoryOtpStore {
    records: KeyedCells<IdentityKey, OtpRecord>,
}

impl InMemoryOtpStore {
    /// Creates a new, empty in-memory OTP store.
    pub fn new() -> Self {
        Self {
            records: KeyedCells::new(),
        }
    }
}

impl Default for InMemoryOtpStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn put(&self, record: OtpRecord) -> Result<()> {
        let key = record.identity_key.clone();
        let mut record = Some(record);
        self.records
            .update(&key, &mut |_| Ok(record.take().map_or(Mutation::Keep, Mutation::Put)))
            .await
    }

    async fn get(&self, key: &IdentityKey) -> Result<Option<OtpRecord>> {
        Ok(self.records.get(key).await)
    }

    async fn delete(&self, key: &IdentityKey) -> Result<()> {
        self.records.update(key, &mut |_| Ok(Mutation::Delete)).await
    }

    async fn update(&self, key: &IdentityKey, f: &mut Updater<'_, OtpRecord>) -> Result<()> {
        self.records.update(key, f).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        Ok(self.records.purge(|r| r.is_expired(now)).await)
    }
}

/// A thread-safe in-memory store for wallet accounts.
pub struct InMemoryAccountStore {
    accounts: KeyedCells<IdentityKey, Account>,
}

impl InMemoryAccountStore {
    /// Creates a new, empty in-memory account store.
    pub fn new() -> Self {
        Self {
            accounts: KeyedCells::new(),
        }
    }
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, account: Account) -> Result<()> {
        let key = account.identity_key.clone();
        let mut account = Some(account);
        self.accounts
            .update(&key, &mut |current| match current {
                Some(existing) => Err(WalletError::AccountExists(
                    existing.identity_key.to_string(),
                )),
                None => Ok(account.take().map_or(Mutation::Keep, Mutation::Put)),
            })
            .await
    }

    async fn get(&self, key: &IdentityKey) -> Result<Option<Account>> {
        Ok(self.accounts.get(key).await)
    }

    async fn update(&self, key: &IdentityKey, f: &mut Updater<'_, Account>) -> Result<()> {
        self.accounts.update(key, f).await
    }

    async fn get_all(&self) -> Result<Vec<Account>> {
        Ok(self.accounts.values().await)
    }
}

/// A thread-safe in-memory store for payment requests.
pub struct InMemoryPaymentStore {
    requests: KeyedCells<Uuid, PaymentRequest>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self {
            requests: KeyedCells::new(),
        }
    }
}

impl Default for InMemoryPaymentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, request: PaymentRequest) -> Result<()> {
        let id = request.id;
        let mut request = Some(request);
        self.requests
            .update(&id, &mut |current| match current {
                Some(_) => Err(WalletError::StorageError(format!(
                    "Payment request {} already exists",
                    id
                ))),
                None => Ok(request.take().map_or(Mutation::Keep, Mutation::Put)),
            })
            .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<PaymentRequest>> {
        Ok(self.requests.get(&id).await)
    }

    async fn update(&self, id: Uuid, f: &mut Updater<'_, PaymentRequest>) -> Result<()> {
        self.requests.update(&id, f).await
    }

    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<PaymentRequest>> {
        let mut matching: Vec<PaymentRequest> = self
            .requests
            .values()
            .await
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }
}
