use super::identity::IdentityKey;
use crate::error::{Result, WalletError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A non-negative quantity of wallet points.
///
/// Balances are whole points; there is no fractional unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Points(pub u64);

impl Points {
    pub const ZERO: Self = Self(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A strictly positive amount moved by a ledger operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Amount(u64);

impl Amount {
    pub fn new(value: u64) -> Result<Self> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(WalletError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for Amount {
    type Error = WalletError;

    fn try_from(value: u64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Points {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

/// A player's wallet.
///
/// The balance is only changed through [`Account::credit`] and [`Account::debit`],
/// and those are only reachable from inside the crate, where the ledger wraps them
/// in a per-account atomic store update.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub identity_key: IdentityKey,
    balance: Points,
    /// Tournaments this account has paid the entry fee for.
    pub enrolled_ids: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(identity_key: IdentityKey, now: DateTime<Utc>) -> Self {
        Self {
            identity_key,
            balance: Points::ZERO,
            enrolled_ids: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn balance(&self) -> Points {
        self.balance
    }

    pub fn is_enrolled(&self, tournament_id: &str) -> bool {
        self.enrolled_ids.contains(tournament_id)
    }

    /// Adds funds to the balance.
    pub(crate) fn credit(&mut self, amount: Amount, now: DateTime<Utc>) -> Result<()> {
        self.balance.0 = self.balance.0.checked_add(amount.value()).ok_or_else(|| {
            WalletError::ValidationError("Credit would overflow the balance".to_string())
        })?;
        self.updated_at = now;
        Ok(())
    }

    /// Removes funds from the balance if sufficient.
    pub(crate) fn debit(&mut self, amount: Amount, now: DateTime<Utc>) -> Result<()> {
        if self.balance.0 >= amount.value() {
            self.balance.0 -= amount.value();
            self.updated_at = now;
            Ok(())
        } else {
            Err(WalletError::InsufficientFunds {
                balance: self.balance.0,
                requested: amount.value(),
            })
        }
    }

    /// Pays the entry fee and records the enrollment together.
    pub(crate) fn enroll(
        &mut self,
        tournament_id: &str,
        entry_fee: Option<Amount>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.is_enrolled(tournament_id) {
            return Err(WalletError::AlreadyEnrolled(tournament_id.to_string()));
        }
        if let Some(fee) = entry_fee {
            self.debit(fee, now)?;
        }
        self.enrolled_ids.insert(tournament_id.to_string());
        self.updated_at = now;
        Ok(())
    }
}
