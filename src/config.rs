//! Startup configuration, parsed once from a single JSON document.
//!
//! Unknown keys are rejected and every semantic check runs before the server
//! starts, so a bad file fails fast with a [`WalletError::ConfigError`].

use crate::application::notify::Credential;
use crate::domain::otp::{OTP_MAX_ATTEMPTS, OTP_TTL_SECS};
use crate::domain::payment::CommissionRate;
use crate::error::{Result, WalletError};
use crate::retry::{RetryPolicy, RetrySettings};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub otp: OtpSettings,
    /// Delivery channels in priority order.
    #[serde(default)]
    pub providers: Vec<ProviderSettings>,
    #[serde(default)]
    pub payments: PaymentSettings,
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub admin: AdminSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct OtpSettings {
    pub ttl_secs: u64,
    pub max_attempts: u32,
    /// Issue the fixed mock code and log it instead of sending. Never enable in production.
    pub mock_mode: bool,
    pub sweep_interval_secs: u64,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            ttl_secs: OTP_TTL_SECS,
            max_attempts: OTP_MAX_ATTEMPTS,
            mock_mode: false,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    SmsGateway,
    EmailApi,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    pub name: String,
    pub kind: ProviderKind,
    pub endpoint: String,
    /// Blank credentials are accepted here and skipped at dispatch time.
    #[serde(default = "blank_credential")]
    pub credential: Credential,
    /// From-address, required for e-mail providers.
    #[serde(default)]
    pub sender: Option<String>,
}

fn blank_credential() -> Credential {
    Credential::new("")
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct PaymentSettings {
    /// Percentage withheld from withdrawals.
    pub commission_rate: CommissionRate,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct LedgerSettings {
    pub retry: RetrySettings,
}

/// Bearer token guarding the back-office routes. Left blank, those routes refuse
/// every request.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AdminSettings {
    #[serde(default = "blank_credential")]
    pub token: Credential,
}

impl Default for AdminSettings {
    fn default() -> Self {
        Self {
            token: blank_credential(),
        }
    }
}

impl AppConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| WalletError::ConfigError(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            WalletError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.otp.ttl_secs == 0 {
            return Err(WalletError::ConfigError(
                "otp.ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.otp.max_attempts == 0 {
            return Err(WalletError::ConfigError(
                "otp.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.ledger.retry.max_attempts == 0 {
            return Err(WalletError::ConfigError(
                "ledger.retry.max_attempts must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for provider in &self.providers {
            if !names.insert(provider.name.as_str()) {
                return Err(WalletError::ConfigError(format!(
                    "duplicate provider name '{}'",
                    provider.name
                )));
            }
            if !(provider.endpoint.starts_with("https://") || provider.endpoint.starts_with("http://")) {
                return Err(WalletError::ConfigError(format!(
                    "provider '{}' endpoint must be an http(s) URL",
                    provider.name
                )));
            }
            if provider.kind == ProviderKind::EmailApi
                && provider.sender.as_deref().is_none_or(|s| s.trim().is_empty())
            {
                return Err(WalletError::ConfigError(format!(
                    "provider '{}' needs a sender address",
                    provider.name
                )));
            }
        }
        Ok(())
    }

    pub fn otp_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.otp.ttl_secs as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.otp.sweep_interval_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.ledger.retry)
    }
}
