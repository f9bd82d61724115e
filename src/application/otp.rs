//! One-time-credential issuance and verification.
//!
//! Each identity has at most one live [`OtpRecord`]. The issuer replaces it and
//! hands the code to the [`Dispatcher`]; the verifier resolves a submitted code
//! against it in a single atomic store update, so concurrent verifications of the
//! same identity can neither double-count attempts nor both succeed.

use super::notify::{DeliveryReceipt, Dispatcher};
use crate::domain::clock::Clock;
use crate::domain::identity::IdentityKey;
use crate::domain::otp::{OTP_MAX_ATTEMPTS, OTP_TTL_SECS, OtpCode, OtpRecord, VerifyOutcome};
use crate::domain::ports::{Mutation, OtpStoreRef};
use crate::error::Result;
use crate::retry::RetryPolicy;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpPolicy {
    pub ttl: Duration,
    pub max_attempts: u32,
    pub mock_mode: bool,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(OTP_TTL_SECS as i64),
            max_attempts: OTP_MAX_ATTEMPTS,
            mock_mode: false,
        }
    }
}

pub struct OtpIssuer {
    store: OtpStoreRef,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    policy: OtpPolicy,
}

impl OtpIssuer {
    pub fn new(
        store: OtpStoreRef,
        dispatcher: Arc<Dispatcher>,
        clock: Arc<dyn Clock>,
        policy: OtpPolicy,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
            policy,
        }
    }

    /// Validates `identity`, then issues and delivers a fresh code for it.
    pub async fn issue(&self, identity: &str) -> Result<DeliveryReceipt> {
        let key = IdentityKey::parse(identity)?;
        self.issue_for(&key).await
    }

    pub async fn issue_for(&self, key: &IdentityKey) -> Result<DeliveryReceipt> {
        let code = if self.policy.mock_mode {
            OtpCode::mock()
        } else {
            OtpCode::generate()
        };
        let record = OtpRecord::new(key.clone(), code.clone(), self.clock.now(), self.policy.ttl);
        let issuance_id = record.issuance_id;
        let expires_at = record.expires_at;

        self.store.put(record).await?;

        match self.dispatcher.dispatch(key, &code).await {
            Ok(receipt) => {
                tracing::info!(identity = %key, provider = %receipt.provider, "otp issued");
                self.schedule_cleanup(key.clone(), issuance_id, expires_at);
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!(identity = %key, error = %e, "otp delivery failed, revoking record");
                if let Err(revoke_err) = self.revoke(key, issuance_id).await {
                    tracing::error!(identity = %key, error = %revoke_err, "failed to revoke undelivered otp");
                }
                Err(e)
            }
        }
    }

    /// Deletes the record only if it still belongs to `issuance_id`.
    async fn revoke(&self, key: &IdentityKey, issuance_id: Uuid) -> Result<()> {
        self.store
            .update(key, &mut |current| {
                Ok(match current {
                    Some(record) if record.issuance_id == issuance_id => Mutation::Delete,
                    _ => Mutation::Keep,
                })
            })
            .await
    }

    fn schedule_cleanup(&self, key: IdentityKey, issuance_id: Uuid, expires_at: DateTime<Utc>) {
        let store = self.store.clone();
        let clock = self.clock.clone();
        let delay = (expires_at - clock.now()).to_std().unwrap_or_default();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let now = clock.now();
            let result = store
                .update(&key, &mut |current| {
                    Ok(match current {
                        Some(record) if record.issuance_id == issuance_id && record.is_expired(now) => {
                            Mutation::Delete
                        }
                        _ => Mutation::Keep,
                    })
                })
                .await;
            if let Err(e) = result {
                tracing::debug!(identity = %key, error = %e, "deferred otp cleanup failed");
            }
        });
    }
}

pub struct OtpVerifier {
    store: OtpStoreRef,
    clock: Arc<dyn Clock>,
    policy: OtpPolicy,
    retry: RetryPolicy,
}

impl OtpVerifier {
    pub fn new(store: OtpStoreRef, clock: Arc<dyn Clock>, policy: OtpPolicy, retry: RetryPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
            retry,
        }
    }

    /// Validates the inputs and checks `code` against the identity's live record.
    pub async fn verify(&self, identity: &str, code: &str) -> Result<()> {
        let key = IdentityKey::parse(identity)?;
        let code = OtpCode::parse(code)?;
        self.verify_code(&key, &code).await?.into_result()
    }

    /// Resolves one verification attempt.
    ///
    /// Storage conflicts are retried, which is safe because a conflicted update wrote
    /// nothing; the attempt counter moves at most once per call.
    pub async fn verify_code(&self, key: &IdentityKey, code: &OtpCode) -> Result<VerifyOutcome> {
        let max_attempts = self.policy.max_attempts;
        let outcome = self
            .retry
            .run("otp.verify", || async move {
                let now = self.clock.now();
                let mut outcome = VerifyOutcome::NotFound;
                self.store
                    .update(key, &mut |current| {
                        let (mutation, result) = resolve(current, code, now, max_attempts);
                        outcome = result;
                        Ok(mutation)
                    })
                    .await?;
                Ok(outcome)
            })
            .await?;

        match outcome {
            VerifyOutcome::Verified => tracing::info!(identity = %key, "otp verified"),
            VerifyOutcome::LockedOut => tracing::warn!(identity = %key, "otp locked out"),
            other => tracing::info!(identity = %key, outcome = ?other, "otp rejected"),
        }
        Ok(outcome)
    }

    /// Deletes every record whose validity window has closed.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let purged = self.store.purge_expired(self.clock.now()).await?;
        if purged > 0 {
            tracing::debug!(purged, "expired otp records swept");
        }
        Ok(purged)
    }

    /// Runs [`Self::sweep_expired`] every `interval` until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, interval: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep_expired().await {
                    tracing::warn!(error = %e, "otp sweep failed");
                }
            }
        })
    }
}

/// The verification state machine for one record.
fn resolve(
    current: Option<&OtpRecord>,
    code: &OtpCode,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> (Mutation<OtpRecord>, VerifyOutcome) {
    let Some(record) = current else {
        return (Mutation::Keep, VerifyOutcome::NotFound);
    };
    if record.is_expired(now) {
        return (Mutation::Delete, VerifyOutcome::Expired);
    }
    if record.attempts >= max_attempts {
        return (Mutation::Delete, VerifyOutcome::LockedOut);
    }
    if record.code.matches(code) {
        return (Mutation::Delete, VerifyOutcome::Verified);
    }

    let attempts = record.attempts + 1;
    if attempts >= max_attempts {
        (Mutation::Delete, VerifyOutcome::LockedOut)
    } else {
        let mut next = record.clone();
        next.attempts = attempts;
        (
            Mutation::Put(next),
            VerifyOutcome::Mismatch {
                remaining_attempts: max_attempts - attempts,
            },
        )
    }
}
