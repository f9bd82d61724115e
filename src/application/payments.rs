use super::ledger::Ledger;
use crate::domain::account::Amount;
use crate::domain::clock::Clock;
use crate::domain::identity::IdentityKey;
use crate::domain::payment::{
    CommissionRate, PaymentFilter, PaymentRequest, PaymentStatus, PaymentType,
};
use crate::domain::ports::{Mutation, PaymentStoreRef};
use crate::error::{Result, WalletError};
use crate::retry::RetryPolicy;
use std::sync::Arc;
use uuid::Uuid;

/// Add-money and withdrawal requests and their admin review.
///
/// Withdrawals reserve funds at submission; top-ups credit only on approval.
/// Approve and reject first claim the `pending` request atomically and only then
/// touch the ledger, so two admins acting on the same request cannot both apply it.
pub struct PaymentWorkflow {
    ledger: Arc<Ledger>,
    payments: PaymentStoreRef,
    clock: Arc<dyn Clock>,
    commission_rate: CommissionRate,
    retry: RetryPolicy,
}

impl PaymentWorkflow {
    pub fn new(
        ledger: Arc<Ledger>,
        payments: PaymentStoreRef,
        clock: Arc<dyn Clock>,
        commission_rate: CommissionRate,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            ledger,
            payments,
            clock,
            commission_rate,
            retry,
        }
    }

    pub async fn submit_add_money(&self, key: &IdentityKey, amount: Amount) -> Result<PaymentRequest> {
        self.ledger.account(key).await?;
        let request = PaymentRequest::add_money(key.clone(), amount, self.clock.now());
        self.insert(request.clone()).await?;
        tracing::info!(id = %request.id, identity = %key, amount = amount.value(), "add-money request submitted");
        Ok(request)
    }

    /// Reserves `amount` on the ledger, then records the pending withdrawal.
    ///
    /// If the request cannot be recorded the reservation is credited back.
    pub async fn submit_withdrawal(&self, key: &IdentityKey, amount: Amount) -> Result<PaymentRequest> {
        let request =
            PaymentRequest::withdrawal(key.clone(), amount, self.commission_rate, self.clock.now());

        self.ledger.debit(key, amount).await?;

        if let Err(e) = self.insert(request.clone()).await {
            tracing::warn!(identity = %key, error = %e, "withdrawal not recorded, releasing reservation");
            if let Err(refund_err) = self.ledger.credit(key, amount).await {
                tracing::error!(
                    identity = %key,
                    amount = amount.value(),
                    error = %refund_err,
                    "failed to release withdrawal reservation"
                );
            }
            return Err(e);
        }

        tracing::info!(id = %request.id, identity = %key, amount = amount.value(), "withdrawal request submitted");
        Ok(request)
    }

    /// Credits tournament winnings and records them as an approved request.
    pub async fn record_winning(&self, key: &IdentityKey, amount: Amount) -> Result<PaymentRequest> {
        let request = PaymentRequest::tournament_winning(key.clone(), amount, self.clock.now());

        self.ledger.credit(key, amount).await?;

        if let Err(e) = self.insert(request.clone()).await {
            tracing::warn!(identity = %key, error = %e, "winning not recorded, reversing credit");
            if let Err(reverse_err) = self.ledger.debit(key, amount).await {
                tracing::error!(
                    identity = %key,
                    amount = amount.value(),
                    error = %reverse_err,
                    "failed to reverse unrecorded winning"
                );
            }
            return Err(e);
        }

        tracing::info!(id = %request.id, identity = %key, amount = amount.value(), "tournament winning credited");
        Ok(request)
    }

    /// Approves a pending request. Top-ups are credited now; withdrawals were
    /// already deducted at submission.
    pub async fn approve(&self, id: Uuid) -> Result<PaymentRequest> {
        let request = self.claim(id, PaymentStatus::Approved).await?;
        if request.r#type == PaymentType::AddMoney {
            self.settle(&request, self.ledger.credit(&request.identity_key, request.amount).await)
                .await?;
        }
        tracing::info!(id = %id, kind = ?request.r#type, "payment request approved");
        Ok(request)
    }

    /// Rejects a pending request. Withdrawals get their reservation refunded.
    pub async fn reject(&self, id: Uuid) -> Result<PaymentRequest> {
        let request = self.claim(id, PaymentStatus::Rejected).await?;
        if request.r#type == PaymentType::Withdrawal {
            self.settle(&request, self.ledger.credit(&request.identity_key, request.amount).await)
                .await?;
        }
        tracing::info!(id = %id, kind = ?request.r#type, "payment request rejected");
        Ok(request)
    }

    pub async fn get(&self, id: Uuid) -> Result<PaymentRequest> {
        self.payments
            .get(id)
            .await?
            .ok_or(WalletError::PaymentNotFound(id))
    }

    pub async fn list(&self, filter: &PaymentFilter) -> Result<Vec<PaymentRequest>> {
        self.payments.list(filter).await
    }

    async fn insert(&self, request: PaymentRequest) -> Result<()> {
        let request = &request;
        self.retry
            .run("payments.insert", || async move {
                self.payments.insert(request.clone()).await
            })
            .await
    }

    /// Atomically moves a pending request to `to` and returns the updated request.
    async fn claim(&self, id: Uuid, to: PaymentStatus) -> Result<PaymentRequest> {
        self.retry
            .run("payments.claim", || async move {
                let now = self.clock.now();
                let mut claimed = None;
                self.payments
                    .update(id, &mut |current| {
                        let mut request = current.cloned().ok_or(WalletError::PaymentNotFound(id))?;
                        request.transition(to, now)?;
                        claimed = Some(request.clone());
                        Ok(Mutation::Put(request))
                    })
                    .await?;
                claimed.ok_or(WalletError::PaymentNotFound(id))
            })
            .await
    }

    /// Returns a claimed request to `pending` if its ledger effect failed.
    async fn settle<T>(&self, request: &PaymentRequest, ledger_result: Result<T>) -> Result<()> {
        let Err(e) = ledger_result else {
            return Ok(());
        };
        tracing::warn!(id = %request.id, error = %e, "ledger effect failed, returning request to pending");

        let claimed = request.status;
        let revert = self
            .payments
            .update(request.id, &mut |current| {
                Ok(match current {
                    Some(stored) if stored.status == claimed => {
                        let mut stored = stored.clone();
                        stored.revert_to_pending();
                        Mutation::Put(stored)
                    }
                    _ => Mutation::Keep,
                })
            })
            .await;
        if let Err(revert_err) = revert {
            tracing::error!(id = %request.id, error = %revert_err, "failed to return request to pending");
        }
        Err(e)
    }
}
