use crate::domain::account::{Account, Amount, Points};
use crate::domain::clock::Clock;
use crate::domain::identity::IdentityKey;
use crate::domain::ports::{AccountStoreRef, Mutation};
use crate::error::{Result, WalletError};
use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// The only writer of account balances.
///
/// Every balance change is one atomic read-modify-write of a single account, retried
/// on transient write conflicts. Operations on different accounts never wait on each
/// other.
pub struct Ledger {
    accounts: AccountStoreRef,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl Ledger {
    pub fn new(accounts: AccountStoreRef, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            accounts,
            clock,
            retry,
        }
    }

    /// Creates an empty account for `key`.
    pub async fn open_account(&self, key: &IdentityKey) -> Result<Account> {
        let account = Account::new(key.clone(), self.clock.now());
        self.accounts.insert(account.clone()).await?;
        tracing::info!(identity = %key, "account opened");
        Ok(account)
    }

    pub async fn account(&self, key: &IdentityKey) -> Result<Account> {
        self.accounts
            .get(key)
            .await?
            .ok_or_else(|| WalletError::AccountNotFound(key.to_string()))
    }

    pub async fn balance(&self, key: &IdentityKey) -> Result<Points> {
        Ok(self.account(key).await?.balance())
    }

    /// Adds `amount` to the balance and returns the new balance.
    pub async fn credit(&self, key: &IdentityKey, amount: Amount) -> Result<Points> {
        let balance = self
            .apply("ledger.credit", key, |account, now| account.credit(amount, now))
            .await?;
        tracing::info!(identity = %key, amount = amount.value(), balance = balance.value(), "ledger credit");
        Ok(balance)
    }

    /// Removes `amount` from the balance, failing with `InsufficientFunds` and leaving
    /// the account untouched if the balance is too small.
    pub async fn debit(&self, key: &IdentityKey, amount: Amount) -> Result<Points> {
        let balance = self
            .apply("ledger.debit", key, |account, now| account.debit(amount, now))
            .await?;
        tracing::info!(identity = %key, amount = amount.value(), balance = balance.value(), "ledger debit");
        Ok(balance)
    }

    /// Charges the entry fee (if any) and records the enrollment in one transaction.
    pub async fn enroll(
        &self,
        key: &IdentityKey,
        tournament_id: &str,
        entry_fee: Option<Amount>,
    ) -> Result<Points> {
        let tournament_id = tournament_id.trim();
        if tournament_id.is_empty() {
            return Err(WalletError::ValidationError(
                "Tournament id is required".to_string(),
            ));
        }
        let balance = self
            .apply("ledger.enroll", key, |account, now| {
                account.enroll(tournament_id, entry_fee, now)
            })
            .await?;
        tracing::info!(
            identity = %key,
            tournament_id,
            entry_fee = entry_fee.map_or(0, |fee| fee.value()),
            balance = balance.value(),
            "tournament enrollment"
        );
        Ok(balance)
    }

    async fn apply<F>(&self, operation: &str, key: &IdentityKey, change: F) -> Result<Points>
    where
        F: Fn(&mut Account, DateTime<Utc>) -> Result<()> + Sync,
    {
        let change = &change;
        self.retry
            .run(operation, || async move {
                let now = self.clock.now();
                let mut balance = Points::ZERO;
                self.accounts
                    .update(key, &mut |current| {
                        let mut account = current
                            .cloned()
                            .ok_or_else(|| WalletError::AccountNotFound(key.to_string()))?;
                        change(&mut account, now)?;
                        balance = account.balance();
                        Ok(Mutation::Put(account))
                    })
                    .await?;
                Ok(balance)
            })
            .await
    }
}
