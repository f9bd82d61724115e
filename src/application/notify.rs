//! Delivery of one-time codes through an ordered list of provider channels.

use crate::domain::identity::{IdentityKey, IdentityKind};
use crate::domain::otp::OtpCode;
use crate::error::{Result, WalletError};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A provider API key or token. Never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Compares `presented` against this credential without short-circuiting on
    /// the first differing byte. A blank credential matches nothing.
    pub fn matches(&self, presented: &str) -> bool {
        let (a, b) = (self.0.as_bytes(), presented.as_bytes());
        !self.is_empty()
            && a.len() == b.len()
            && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Why a single delivery attempt failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The provider refused the credential. Only this kind moves on to the next channel.
    #[error("credential rejected by provider")]
    Unauthorized,
    #[error("provider did not confirm delivery: {0}")]
    Rejected(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait NotificationProvider: Send + Sync {
    fn name(&self) -> &str;
    fn supports(&self, kind: IdentityKind) -> bool;
    async fn deliver(
        &self,
        credential: &Credential,
        recipient: &IdentityKey,
        code: &OtpCode,
    ) -> std::result::Result<(), DeliveryError>;
}

/// One (provider, credential) pair in priority order.
#[derive(Clone)]
pub struct Channel {
    pub provider: Arc<dyn NotificationProvider>,
    pub credential: Credential,
}

impl Channel {
    pub fn new(provider: Arc<dyn NotificationProvider>, credential: Credential) -> Self {
        Self {
            provider,
            credential,
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("provider", &self.provider.name())
            .field("credential", &self.credential)
            .finish()
    }
}

/// Which channel carried a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub provider: String,
    pub position: usize,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    channels: Vec<Channel>,
}

impl Dispatcher {
    /// Builds a dispatcher over `channels`, dropping those with a blank credential.
    pub fn new(channels: Vec<Channel>) -> Self {
        let channels = channels
            .into_iter()
            .filter(|c| !c.credential.is_empty())
            .collect();
        Self { channels }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Sends `code` to `recipient` through the first channel that accepts it.
    ///
    /// A channel whose credential is refused hands over to the next one. Any other
    /// failure stops the walk, since the provider may already have sent the message.
    pub async fn dispatch(&self, recipient: &IdentityKey, code: &OtpCode) -> Result<DeliveryReceipt> {
        let kind = recipient.kind();
        let candidates: Vec<&Channel> = self
            .channels
            .iter()
            .filter(|c| c.provider.supports(kind))
            .collect();

        if candidates.is_empty() {
            return Err(WalletError::ConfigError(format!(
                "no notification provider credential configured for {:?} identities",
                kind
            )));
        }

        let total = candidates.len();
        for (position, channel) in candidates.into_iter().enumerate() {
            let provider = channel.provider.name();
            match channel.provider.deliver(&channel.credential, recipient, code).await {
                Ok(()) => {
                    tracing::info!(provider, position, "otp delivered");
                    return Ok(DeliveryReceipt {
                        provider: provider.to_string(),
                        position,
                    });
                }
                Err(DeliveryError::Unauthorized) => {
                    tracing::warn!(
                        provider,
                        position,
                        remaining = total - position - 1,
                        "provider rejected credential, trying next channel"
                    );
                }
                Err(e) => {
                    tracing::error!(provider, position, error = %e, "otp delivery failed");
                    return Err(WalletError::ProviderError(format!("{}: {}", provider, e)));
                }
            }
        }

        Err(WalletError::ProviderError(
            "all configured provider credentials were rejected".to_string(),
        ))
    }
}
