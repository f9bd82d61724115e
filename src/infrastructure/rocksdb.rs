use crate::domain::account::Account;
use crate::domain::identity::IdentityKey;
use crate::domain::otp::OtpRecord;
use crate::domain::payment::{PaymentFilter, PaymentRequest};
use crate::domain::ports::{AccountStore, Mutation, OtpStore, PaymentStore, Updater};
use crate::error::{Result, WalletError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, TransactionDB,
    TransactionDBOptions,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use uuid::Uuid;

/// Column Family for storing OTP records.
pub const CF_OTP_RECORDS: &str = "otp_records";
/// Column Family for storing wallet accounts.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for storing payment requests.
pub const CF_PAYMENTS: &str = "payments";

/// A persistent store implementation using a RocksDB `TransactionDB`.
///
/// Handles OTP records, accounts and payment requests in separate Column Families.
/// Every `update` runs in a pessimistic transaction that locks its key with
/// `get_for_update`, so concurrent updates of one key serialize while other keys
/// are unaffected. A lock that cannot be taken in time surfaces as
/// [`WalletError::Conflict`].
///
/// RocksDB calls block the calling thread on disk I/O and on row locks. They run
/// through [`blocking`], which moves the worker's other tasks elsewhere first on a
/// multi-threaded runtime.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<TransactionDB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<TransactionDB>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_OTP_RECORDS, CF_ACCOUNTS, CF_PAYMENTS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = TransactionDB::open_cf_descriptors(&opts, &TransactionDBOptions::default(), path, cfs)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| WalletError::StorageError(format!("{} column family not found", name)))
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match blocking(|| self.db.get_cf(cf, key))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn read_all<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        blocking(|| {
            let mut values = Vec::new();
            for item in self.db.iterator_cf(cf, IteratorMode::Start) {
                let (_key, value) = item?;
                values.push(serde_json::from_slice(&value)?);
            }
            Ok(values)
        })
    }

    fn transact<T: Serialize + DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
        f: &mut Updater<'_, T>,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        blocking(|| self.transact_in(cf, key, f))
    }

    fn transact_in<T: Serialize + DeserializeOwned>(
        &self,
        cf: &ColumnFamily,
        key: &[u8],
        f: &mut Updater<'_, T>,
    ) -> Result<()> {
        let txn = self.db.transaction();
        let current: Option<T> = match txn.get_for_update_cf(cf, key, true)? {
            Some(bytes) => Some(serde_json::from_slice(&bytes)?),
            None => None,
        };

        match f(current.as_ref()) {
            Ok(Mutation::Keep) => {
                txn.rollback()?;
                return Ok(());
            }
            Ok(Mutation::Put(value)) => txn.put_cf(cf, key, serde_json::to_vec(&value)?)?,
            Ok(Mutation::Delete) => txn.delete_cf(cf, key)?,
            Err(e) => {
                txn.rollback()?;
                return Err(e);
            }
        }

        txn.commit()?;
        Ok(())
    }
}

/// Runs a call that may block the thread. On a multi-threaded runtime the worker
/// hands its queued tasks to other workers first. A current-thread runtime has no
/// other worker, and `block_in_place` would panic there, so the call runs inline.
fn blocking<R>(op: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(op),
        _ => op(),
    }
}

#[async_trait]
impl OtpStore for RocksDBStore {
    async fn put(&self, record: OtpRecord) -> Result<()> {
        let cf = self.cf(CF_OTP_RECORDS)?;
        let value = serde_json::to_vec(&record)?;
        blocking(|| self.db.put_cf(cf, record.identity_key.as_str().as_bytes(), value))?;
        Ok(())
    }

    async fn get(&self, key: &IdentityKey) -> Result<Option<OtpRecord>> {
        self.read(CF_OTP_RECORDS, key.as_str().as_bytes())
    }

    async fn delete(&self, key: &IdentityKey) -> Result<()> {
        let cf = self.cf(CF_OTP_RECORDS)?;
        blocking(|| self.db.delete_cf(cf, key.as_str().as_bytes()))?;
        Ok(())
    }

    async fn update(&self, key: &IdentityKey, f: &mut Updater<'_, OtpRecord>) -> Result<()> {
        self.transact(CF_OTP_RECORDS, key.as_str().as_bytes(), f)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let expired: Vec<IdentityKey> = self
            .read_all::<OtpRecord>(CF_OTP_RECORDS)?
            .into_iter()
            .filter(|r| r.is_expired(now))
            .map(|r| r.identity_key)
            .collect();

        let mut purged = 0;
        for key in expired {
            // Re-check under the key lock; a fresh code may have replaced it meanwhile.
            self.transact::<OtpRecord>(CF_OTP_RECORDS, key.as_str().as_bytes(), &mut |current| {
                Ok(match current {
                    Some(record) if record.is_expired(now) => {
                        purged += 1;
                        Mutation::Delete
                    }
                    _ => Mutation::Keep,
                })
            })?;
        }
        Ok(purged)
    }
}

#[async_trait]
impl AccountStore for RocksDBStore {
    async fn insert(&self, account: Account) -> Result<()> {
        let key = account.identity_key.clone();
        let mut account = Some(account);
        self.transact(CF_ACCOUNTS, key.as_str().as_bytes(), &mut |current| {
            match current {
                Some(existing) => Err(WalletError::AccountExists(
                    existing.identity_key.to_string(),
                )),
                None => Ok(account.take().map_or(Mutation::Keep, Mutation::Put)),
            }
        })
    }

    async fn get(&self, key: &IdentityKey) -> Result<Option<Account>> {
        self.read(CF_ACCOUNTS, key.as_str().as_bytes())
    }

    async fn update(&self, key: &IdentityKey, f: &mut Updater<'_, Account>) -> Result<()> {
        self.transact(CF_ACCOUNTS, key.as_str().as_bytes(), f)
    }

    async fn get_all(&self) -> Result<Vec<Account>> {
        self.read_all(CF_ACCOUNTS)
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, request: PaymentRequest) -> Result<()> {
        let id = request.id;
        let mut request = Some(request);
        self.transact(CF_PAYMENTS, id.as_bytes(), &mut |current| match current {
            Some(_) => Err(WalletError::StorageError(format!(
                "Payment request {} already exists",
                id
            ))),
            None => Ok(request.take().map_or(Mutation::Keep, Mutation::Put)),
        })
    }

    async fn get(&self, id: Uuid) -> Result<Option<PaymentRequest>> {
        self.read(CF_PAYMENTS, id.as_bytes())
    }

    async fn update(&self, id: Uuid, f: &mut Updater<'_, PaymentRequest>) -> Result<()> {
        self.transact(CF_PAYMENTS, id.as_bytes(), f)
    }

    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<PaymentRequest>> {
        let mut matching: Vec<PaymentRequest> = self
            .read_all::<PaymentRequest>(CF_PAYMENTS)?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Amount;
    use crate::domain::otp::OtpCode;
    use chrono::Duration;
    use tempfile::tempdir;

    fn key(raw: &str) -> IdentityKey {
        IdentityKey::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_OTP_RECORDS).is_some());
        assert!(store.db.cf_handle(CF_ACCOUNTS).is_some());
        assert!(store.db.cf_handle(CF_PAYMENTS).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_otp_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let now = Utc::now();

        let stale = OtpRecord::new(key("9876543210"), OtpCode::mock(), now - Duration::minutes(10), Duration::minutes(5));
        let fresh = OtpRecord::new(key("a@example.com"), OtpCode::mock(), now, Duration::minutes(5));
        OtpStore::put(&store, stale).await.unwrap();
        OtpStore::put(&store, fresh.clone()).await.unwrap();

        assert_eq!(OtpStore::purge_expired(&store, now).await.unwrap(), 1);
        assert!(OtpStore::get(&store, &key("9876543210")).await.unwrap().is_none());
        assert_eq!(OtpStore::get(&store, &key("a@example.com")).await.unwrap(), Some(fresh));

        OtpStore::delete(&store, &key("a@example.com")).await.unwrap();
        OtpStore::delete(&store, &key("a@example.com")).await.unwrap();
        assert!(OtpStore::get(&store, &key("a@example.com")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_account_update() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let account = Account::new(key("9876543210"), Utc::now());

        AccountStore::insert(&store, account.clone()).await.unwrap();
        assert!(matches!(
            AccountStore::insert(&store, account).await,
            Err(WalletError::AccountExists(_))
        ));

        AccountStore::update(&store, &key("9876543210"), &mut |current| {
            let mut account = current.cloned().unwrap();
            account.credit(Amount::new(25).unwrap(), Utc::now())?;
            Ok(Mutation::Put(account))
        })
        .await
        .unwrap();

        let stored = AccountStore::get(&store, &key("9876543210")).await.unwrap().unwrap();
        assert_eq!(stored.balance().value(), 25);
        assert_eq!(AccountStore::get_all(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rocksdb_payment_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let request = PaymentRequest::add_money(key("9876543210"), Amount::new(10).unwrap(), Utc::now());

        PaymentStore::insert(&store, request.clone()).await.unwrap();
        let retrieved = PaymentStore::get(&store, request.id).await.unwrap().unwrap();
        assert_eq!(retrieved, request);

        let listed = PaymentStore::list(&store, &PaymentFilter::default()).await.unwrap();
        assert_eq!(listed, vec![request]);
        assert!(PaymentStore::get(&store, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_rocksdb_concurrent_updates_on_multi_thread_runtime() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        AccountStore::insert(&store, Account::new(key("9876543210"), Utc::now()))
            .await
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    for _ in 0..10 {
                        AccountStore::update(&store, &key("9876543210"), &mut |current| {
                            let mut account = current.cloned().unwrap();
                            account.credit(Amount::new(1).unwrap(), Utc::now())?;
                            Ok(Mutation::Put(account))
                        })
                        .await
                        .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = AccountStore::get(&store, &key("9876543210")).await.unwrap().unwrap();
        assert_eq!(stored.balance().value(), 80);
    }
}
