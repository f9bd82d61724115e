use super::account::Amount;
use super::identity::IdentityKey;
use crate::error::{Result, WalletError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    AddMoney,
    Withdrawal,
    TournamentWinning,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => f.write_str("pending"),
            PaymentStatus::Approved => f.write_str("approved"),
            PaymentStatus::Rejected => f.write_str("rejected"),
        }
    }
}

/// Withdrawal fee percentage, validated to lie in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct CommissionRate(Decimal);

impl CommissionRate {
    pub fn new(percent: Decimal) -> Result<Self> {
        if percent >= Decimal::ZERO && percent <= Decimal::ONE_HUNDRED {
            Ok(Self(percent))
        } else {
            Err(WalletError::ConfigError(format!(
                "commission_rate must be between 0 and 100, got {}",
                percent
            )))
        }
    }

    pub fn percent(&self) -> Decimal {
        self.0
    }

    /// Splits a withdrawal into `(commission_amount, final_amount)`.
    ///
    /// The commission is rounded half-up to two decimal places.
    pub fn split(&self, amount: Amount) -> (Decimal, Decimal) {
        let gross = Decimal::from(amount.value());
        let commission = (gross * self.0 / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        (commission, gross - commission)
    }
}

impl Default for CommissionRate {
    fn default() -> Self {
        Self(Decimal::ZERO)
    }
}

impl TryFrom<Decimal> for CommissionRate {
    type Error = WalletError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CommissionRate> for Decimal {
    fn from(rate: CommissionRate) -> Self {
        rate.0
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentRequest {
    pub id: Uuid,
    pub identity_key: IdentityKey,
    pub amount: Amount,
    pub r#type: PaymentType,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
}

impl PaymentRequest {
    pub fn add_money(identity_key: IdentityKey, amount: Amount, now: DateTime<Utc>) -> Self {
        Self::pending(identity_key, amount, PaymentType::AddMoney, now)
    }

    pub fn withdrawal(
        identity_key: IdentityKey,
        amount: Amount,
        rate: CommissionRate,
        now: DateTime<Utc>,
    ) -> Self {
        let (commission, net) = rate.split(amount);
        let mut request = Self::pending(identity_key, amount, PaymentType::Withdrawal, now);
        request.commission_amount = Some(commission);
        request.final_amount = Some(net);
        request
    }

    /// Winnings are paid out immediately, so the request is born approved.
    pub fn tournament_winning(
        identity_key: IdentityKey,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Self {
        let mut request = Self::pending(identity_key, amount, PaymentType::TournamentWinning, now);
        request.status = PaymentStatus::Approved;
        request.approved_at = Some(now);
        request
    }

    fn pending(
        identity_key: IdentityKey,
        amount: Amount,
        r#type: PaymentType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity_key,
            amount,
            r#type,
            status: PaymentStatus::Pending,
            commission_amount: None,
            final_amount: None,
            created_at: now,
            approved_at: None,
            rejected_at: None,
        }
    }

    /// Moves a pending request into a terminal status.
    pub fn transition(&mut self, to: PaymentStatus, now: DateTime<Utc>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(WalletError::InvalidTransition {
                id: self.id,
                status: self.status.to_string(),
            });
        }
        match to {
            PaymentStatus::Approved => self.approved_at = Some(now),
            PaymentStatus::Rejected => self.rejected_at = Some(now),
            PaymentStatus::Pending => {}
        }
        self.status = to;
        Ok(())
    }

    /// Undoes a claimed transition when its ledger effect could not be applied.
    pub(crate) fn revert_to_pending(&mut self) {
        self.status = PaymentStatus::Pending;
        self.approved_at = None;
        self.rejected_at = None;
    }
}

/// Admin query over payment requests. Unset fields match everything.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub r#type: Option<PaymentType>,
    pub identity_key: Option<IdentityKey>,
}

impl PaymentFilter {
    pub fn matches(&self, request: &PaymentRequest) -> bool {
        self.status.is_none_or(|s| s == request.status)
            && self.r#type.is_none_or(|t| t == request.r#type)
            && self
                .identity_key
                .as_ref()
                .is_none_or(|k| *k == request.identity_key)
    }
}
