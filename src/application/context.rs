//! Wiring of stores, providers and services, done once at startup.
//!
//! An [`AppContext`] is built from a validated [`AppConfig`] and then shared by
//! reference with every entry point. Nothing in the crate keeps global state.

use super::ledger::Ledger;
use super::notify::{Channel, Credential, Dispatcher, NotificationProvider};
use super::otp::{OtpIssuer, OtpPolicy, OtpVerifier};
use super::payments::PaymentWorkflow;
use crate::config::{AppConfig, ProviderKind};
use crate::domain::clock::Clock;
use crate::domain::ports::{AccountStoreRef, OtpStoreRef, PaymentStoreRef};
use crate::error::{Result, WalletError};
use crate::infrastructure::in_memory::{InMemoryAccountStore, InMemoryOtpStore, InMemoryPaymentStore};
use crate::infrastructure::providers::{EmailApiProvider, LogProvider, SmsGatewayProvider};
use std::sync::Arc;
use std::time::Duration;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// The three stores backing the services.
#[derive(Clone)]
pub struct Stores {
    pub otp: OtpStoreRef,
    pub accounts: AccountStoreRef,
    pub payments: PaymentStoreRef,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            otp: Arc::new(InMemoryOtpStore::new()),
            accounts: Arc::new(InMemoryAccountStore::new()),
            payments: Arc::new(InMemoryPaymentStore::new()),
        }
    }

    /// Opens (or creates) a RocksDB database at `path` serving all three stores.
    #[cfg(feature = "storage-rocksdb")]
    pub fn rocksdb<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let store = crate::infrastructure::rocksdb::RocksDBStore::open(path)?;
        Ok(Self {
            otp: Arc::new(store.clone()),
            accounts: Arc::new(store.clone()),
            payments: Arc::new(store),
        })
    }
}

pub struct AppContext {
    pub config: AppConfig,
    pub issuer: OtpIssuer,
    pub verifier: Arc<OtpVerifier>,
    pub ledger: Arc<Ledger>,
    pub payments: PaymentWorkflow,
}

impl AppContext {
    /// Builds the context with HTTP providers taken from `config`.
    pub fn new(config: AppConfig, stores: Stores, clock: Arc<dyn Clock>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .map_err(|e| WalletError::ConfigError(format!("cannot build http client: {}", e)))?;
        let dispatcher = build_dispatcher(&config, client);
        Ok(Self::with_dispatcher(config, stores, dispatcher, clock))
    }

    pub fn with_dispatcher(
        config: AppConfig,
        stores: Stores,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let policy = OtpPolicy {
            ttl: config.otp_ttl(),
            max_attempts: config.otp.max_attempts,
            mock_mode: config.otp.mock_mode,
        };
        let retry = config.retry_policy();

        let issuer = OtpIssuer::new(stores.otp.clone(), Arc::new(dispatcher), clock.clone(), policy);
        let verifier = Arc::new(OtpVerifier::new(stores.otp, clock.clone(), policy, retry));
        let ledger = Arc::new(Ledger::new(stores.accounts, clock.clone(), retry));
        let payments = PaymentWorkflow::new(
            ledger.clone(),
            stores.payments,
            clock,
            config.payments.commission_rate,
            retry,
        );

        Self {
            config,
            issuer,
            verifier,
            ledger,
            payments,
        }
    }
}

/// Turns the configured providers into dispatch channels, in configured order.
///
/// Mock mode replaces every provider with one that only logs the code.
pub fn build_dispatcher(config: &AppConfig, client: reqwest::Client) -> Dispatcher {
    if config.otp.mock_mode {
        tracing::warn!("otp mock mode enabled, codes are logged and not delivered");
        return Dispatcher::new(vec![Channel::new(
            Arc::new(LogProvider),
            Credential::new("mock"),
        )]);
    }

    let channels = config
        .providers
        .iter()
        .map(|settings| {
            if settings.credential.is_empty() {
                tracing::warn!(provider = %settings.name, "provider has no credential and will be skipped");
            }
            let provider: Arc<dyn NotificationProvider> = match settings.kind {
                ProviderKind::SmsGateway => Arc::new(SmsGatewayProvider::new(
                    settings.name.clone(),
                    client.clone(),
                    settings.endpoint.clone(),
                )),
                ProviderKind::EmailApi => Arc::new(EmailApiProvider::new(
                    settings.name.clone(),
                    client.clone(),
                    settings.endpoint.clone(),
                    settings.sender.clone().unwrap_or_default(),
                )
                .with_validity(Duration::from_secs(config.otp.ttl_secs))),
            };
            Channel::new(provider, settings.credential.clone())
        })
        .collect();
    Dispatcher::new(channels)
}
